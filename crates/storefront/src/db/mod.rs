//! Database operations for the storefront `PostgreSQL`.
//!
//! # Schema: `booth`
//!
//! ## Tables
//!
//! - `event`, `ticket_type`, `merchandise` - Catalog with `available` / `sold` counters
//! - `cart` - Session carts (items as JSONB)
//! - `order` - Checkout snapshots plus payment state
//! - `attendee` - Ticket holders
//! - `email_log` - One row per email delivery attempt
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p ticket-booth-cli -- migrate
//! ```
//!
//! Repositories hold a pool reference for standalone reads and writes.
//! Operations that must be atomic take a `&mut PgConnection` so callers can
//! run several of them inside one transaction.

pub mod attendees;
pub mod carts;
pub mod catalog;
pub mod email_logs;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use attendees::AttendeeRepository;
pub use carts::CartRepository;
pub use catalog::CatalogRepository;
pub use email_logs::{EmailLog, EmailLogRepository, NewEmailLog};
pub use orders::{OrderRepository, SalesSummary};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique ticket code, referenced row).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to [`RepositoryError::Conflict`].
    pub(crate) fn from_constraint(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
