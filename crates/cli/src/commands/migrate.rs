//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! tb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded at
//! compile time.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

/// Errors from running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database URL from `STOREFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns error if the URL is missing, the database is unreachable or a
/// migration fails.
pub async fn storefront() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete");
    Ok(())
}
