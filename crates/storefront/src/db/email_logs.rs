//! Email delivery log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use ticket_booth_core::{EmailLogId, EmailStatus};

use super::RepositoryError;

/// One recorded delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct EmailLog {
    pub id: EmailLogId,
    pub order_reference: Option<String>,
    pub email_type: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub status: EmailStatus,
    pub provider_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A delivery attempt to record.
#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub order_reference: Option<String>,
    pub email_type: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub status: EmailStatus,
    pub provider_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct EmailLogRow {
    id: i32,
    order_reference: Option<String>,
    email_type: String,
    recipients: Vec<String>,
    subject: String,
    status: EmailStatus,
    provider_id: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EmailLogRow> for EmailLog {
    fn from(row: EmailLogRow) -> Self {
        Self {
            id: EmailLogId::new(row.id),
            order_reference: row.order_reference,
            email_type: row.email_type,
            recipients: row.recipients,
            subject: row.subject,
            status: row.status,
            provider_id: row.provider_id,
            error: row.error,
            created_at: row.created_at,
        }
    }
}

/// Repository for the email log.
pub struct EmailLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmailLogRepository<'a> {
    /// Create a new email log repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, log: &NewEmailLog) -> Result<EmailLogId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO booth.email_log \
             (order_reference, email_type, recipients, subject, status, provider_id, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&log.order_reference)
        .bind(&log.email_type)
        .bind(&log.recipients)
        .bind(&log.subject)
        .bind(log.status)
        .bind(&log.provider_id)
        .bind(&log.error)
        .fetch_one(self.pool)
        .await?;
        Ok(EmailLogId::new(id))
    }

    /// Most recent attempts first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<EmailLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmailLogRow>(
            "SELECT id, order_reference, email_type, recipients, subject, status, provider_id, \
             error, created_at FROM booth.email_log ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
