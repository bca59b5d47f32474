use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// Outbound email channel. Only called from background tasks.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
        token: &str,
    ) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let sender = cfg.sender.parse().context("parse SMTP_SENDER")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("build smtp transport")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .timeout(Some(Duration::from_secs(5)))
            .build();
        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
        _token: &str,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient.parse().context("invalid recipient address")?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                plain_body.to_string(),
                html_body.to_string(),
            ))
            .context("build email")?;

        self.transport.send(message).await.context("smtp send")?;
        debug!(subject, "email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured. Logs the subject only.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Notifier for LogMailer {
    async fn send(
        &self,
        _recipient: &str,
        subject: &str,
        _plain_body: &str,
        _html_body: &str,
        _token: &str,
    ) -> anyhow::Result<()> {
        info!(subject, "smtp not configured; email not delivered");
        Ok(())
    }
}

pub struct ActivationEmail {
    pub subject: String,
    pub plain_body: String,
    pub html_body: String,
}

impl ActivationEmail {
    pub fn new(name: &str, token: &str) -> Self {
        let plain_body = format!(
            "Dear {name},\n\n\
             Thanks for signing up. Your account has been created.\n\n\
             To activate it, send a PUT /v1/users/activated request with the following JSON body:\n\n\
             {{\"token\": \"{token}\"}}\n\n\
             This token is valid for a limited time and can only be used once.\n"
        );
        let html_body = format!(
            "<p>Dear {name},</p>\
             <p>Thanks for signing up. Your account has been created.</p>\
             <p>To activate it, send a <code>PUT /v1/users/activated</code> request with the following JSON body:</p>\
             <pre><code>{{\"token\": \"{token}\"}}</code></pre>\
             <p>This token is valid for a limited time and can only be used once.</p>"
        );
        Self {
            subject: "Welcome! Activate your account".to_string(),
            plain_body,
            html_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_email_carries_token_in_both_bodies() {
        let email = ActivationEmail::new("Ada", "tok123");
        assert!(email.plain_body.starts_with("Dear Ada,"));
        assert!(email.plain_body.contains(r#"{"token": "tok123"}"#));
        assert!(email.html_body.contains(r#"{"token": "tok123"}"#));
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        LogMailer
            .send("ada@example.com", "s", "p", "h", "t")
            .await
            .unwrap();
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let cfg = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "u".into(),
            password: "p".into(),
            sender: "not an address".into(),
        };
        assert!(SmtpMailer::new(&cfg).is_err());
    }
}
