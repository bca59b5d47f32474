use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub activation_ttl_hours: i64,
    pub authentication_ttl_hours: i64,
}

/// Longest lifetime accepted for either token scope.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

fn hours(h: i64) -> Duration {
    let secs = u64::try_from(h).unwrap_or(0).saturating_mul(3600);
    Duration::from_secs(secs)
}

impl TokenConfig {
    pub fn activation_ttl(&self) -> Duration {
        hours(self.activation_ttl_hours)
    }

    pub fn authentication_ttl(&self) -> Duration {
        hours(self.authentication_ttl_hours)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (key, value) in [
            ("ACTIVATION_TOKEN_TTL_HOURS", self.activation_ttl_hours),
            ("AUTH_TOKEN_TTL_HOURS", self.authentication_ttl_hours),
        ] {
            if !(1..=MAX_TOKEN_TTL_HOURS).contains(&value) {
                anyhow::bail!("{key} must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {value}");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string. Without it the service keeps accounts in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_secs: u64,
    pub tokens: TokenConfig,
    pub smtp: Option<SmtpConfig>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let tokens = TokenConfig {
            activation_ttl_hours: env_or("ACTIVATION_TOKEN_TTL_HOURS", 72),
            authentication_ttl_hours: env_or("AUTH_TOKEN_TTL_HOURS", 24),
        };
        tokens.validate()?;

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME")?,
                password: std::env::var("SMTP_PASSWORD")?,
                sender: std::env::var("SMTP_SENDER")?,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            db_timeout_secs: env_or("DB_TIMEOUT_SECS", 3),
            tokens,
            smtp,
        })
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    #[cfg(test)]
    pub fn local() -> Self {
        Self {
            database_url: None,
            db_max_connections: 1,
            db_timeout_secs: 3,
            tokens: TokenConfig {
                activation_ttl_hours: 72,
                authentication_ttl_hours: 24,
            },
            smtp: None,
        }
    }
}
