mod postgres_repository;


use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub use postgres_repository::{create_postgres_repository, PostgresRepository};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects the shared pool, retrying while the database comes up, then
/// applies pending migrations.
///
/// # Errors
/// Returns an error once `retry_count` attempts have failed, or if a
/// migration fails. Both are fatal at startup.
pub async fn init_database_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let attempts = config.retry_count.max(1);
    let mut attempt = 0;

    let pool = loop {
        attempt += 1;

        let result = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => break pool,
            Err(err) if attempt < attempts => {
                tracing::warn!(attempt, attempts, "Database not ready: {}", err);
                tokio::time::sleep(config.retry_delay).await;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to connect to database after {attempt} attempts")
                });
            }
        }
    };

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(attempt, "Database connected and migrated");

    Ok(pool)
}
