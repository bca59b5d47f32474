use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::memory::MemoryStore;
use crate::auth::repo::{PgTokenStore, PgUserStore, TokenStore, UserStore};
use crate::config::AppConfig;
use crate::db;
use crate::mailer::{LogMailer, Notifier, SmtpMailer};
use crate::tasks::BackgroundTasks;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub notifier: Arc<dyn Notifier>,
    pub tasks: BackgroundTasks,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let notifier = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp mailer enabled");
                Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Notifier>
            }
            None => {
                warn!("SMTP_HOST not set; activation emails will only be logged");
                Arc::new(LogMailer) as Arc<dyn Notifier>
            }
        };

        let state = match &config.database_url {
            Some(url) => {
                let pool = db::connect(&config, url).await?;
                let users = Arc::new(PgUserStore::new(pool.clone(), config.db_timeout()));
                let tokens = Arc::new(PgTokenStore::new(pool, config.db_timeout()));
                Self::from_parts(users, tokens, notifier, config.clone())
            }
            None => {
                warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
                let store = MemoryStore::new();
                Self::from_parts(
                    Arc::new(store.clone()),
                    Arc::new(store),
                    notifier,
                    config.clone(),
                )
            }
        };
        Ok(state)
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            tokens,
            notifier,
            tasks: BackgroundTasks::new(),
            config,
        }
    }

    /// State backed by a fresh in-memory store. The store handle is returned
    /// so tests can inspect tables directly.
    #[cfg(test)]
    pub fn fake(notifier: Arc<dyn Notifier>) -> (Self, MemoryStore) {
        let store = MemoryStore::new();
        let state = Self::from_parts(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            notifier,
            Arc::new(AppConfig::local()),
        );
        (state, store)
    }
}
