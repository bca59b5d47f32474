use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig, url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout())
        .connect(url)
        .await
        .context("connect to database")?;

    // Run migrations if present
    match sqlx::migrate!("./migrations").run(&db).await {
        Ok(()) => info!("database migrations applied"),
        Err(e) => warn!(error = %e, "migration failed; continuing"),
    }
    Ok(db)
}
