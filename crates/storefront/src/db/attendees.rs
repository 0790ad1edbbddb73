//! Attendee repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use ticket_booth_core::attendee::TicketCode;
use ticket_booth_core::{
    Attendee, AttendeeChanges, AttendeeId, Email, EventId, NewAttendee, OrderId, TicketTypeId,
};

use super::RepositoryError;

const ATTENDEE_COLUMNS: &str = "id, order_id, ticket_type_id, first_name, last_name, email, \
     phone, ticket_code, is_checked_in, checked_in_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct AttendeeRow {
    id: i32,
    order_id: i32,
    ticket_type_id: i32,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    ticket_code: String,
    is_checked_in: bool,
    checked_in_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AttendeeRow> for Attendee {
    type Error = RepositoryError;

    fn try_from(row: AttendeeRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: AttendeeId::new(row.id),
            order_id: OrderId::new(row.order_id),
            ticket_type_id: TicketTypeId::new(row.ticket_type_id),
            first_name: row.first_name,
            last_name: row.last_name,
            email,
            phone: row.phone,
            ticket_code: TicketCode::from_stored(row.ticket_code),
            is_checked_in: row.is_checked_in,
            checked_in_at: row.checked_in_at,
            created_at: row.created_at,
        })
    }
}

fn into_attendees(rows: Vec<AttendeeRow>) -> Result<Vec<Attendee>, RepositoryError> {
    rows.into_iter().map(Attendee::try_from).collect()
}

/// Repository for attendee database operations.
pub struct AttendeeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttendeeRepository<'a> {
    /// Create a new attendee repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AttendeeId) -> Result<Option<Attendee>, RepositoryError> {
        let row = sqlx::query_as::<_, AttendeeRow>(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM booth.attendee WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        row.map(Attendee::try_from).transpose()
    }

    /// Attendees registered on an order, in registration order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(&self, order_id: OrderId) -> Result<Vec<Attendee>, RepositoryError> {
        let rows = sqlx::query_as::<_, AttendeeRow>(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM booth.attendee WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.as_i32())
        .fetch_all(self.pool)
        .await?;
        into_attendees(rows)
    }

    /// All attendees, optionally only those holding tickets for one event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, event_id: Option<EventId>) -> Result<Vec<Attendee>, RepositoryError> {
        let rows = sqlx::query_as::<_, AttendeeRow>(
            "SELECT a.id, a.order_id, a.ticket_type_id, a.first_name, a.last_name, a.email, \
             a.phone, a.ticket_code, a.is_checked_in, a.checked_in_at, a.created_at \
             FROM booth.attendee a \
             JOIN booth.ticket_type t ON t.id = a.ticket_type_id \
             WHERE ($1::int IS NULL OR t.event_id = $1) \
             ORDER BY a.last_name, a.first_name, a.id",
        )
        .bind(event_id.map(|id| id.as_i32()))
        .fetch_all(self.pool)
        .await?;
        into_attendees(rows)
    }

    /// Replace an attendee's contact details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attendee does not exist.
    pub async fn update_contact(
        &self,
        id: AttendeeId,
        changes: &AttendeeChanges,
    ) -> Result<Attendee, RepositoryError> {
        let row = sqlx::query_as::<_, AttendeeRow>(&format!(
            "UPDATE booth.attendee SET first_name = $2, last_name = $3, email = $4, phone = $5 \
             WHERE id = $1 RETURNING {ATTENDEE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(changes.email.as_str())
        .bind(&changes.phone)
        .fetch_optional(self.pool)
        .await?;
        row.map(Attendee::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attendee does not exist.
    pub async fn delete(&self, id: AttendeeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM booth.attendee WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Number of attendees already registered on `order_id` for a ticket type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_for_ticket_type(
        conn: &mut PgConnection,
        order_id: OrderId,
        ticket_type_id: TicketTypeId,
    ) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM booth.attendee WHERE order_id = $1 AND ticket_type_id = $2",
        )
        .bind(order_id.as_i32())
        .bind(ticket_type_id.as_i32())
        .fetch_one(&mut *conn)
        .await?;
        u32::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("attendee count {count}")))
    }

    /// Insert an attendee. Returns `None` when the ticket code is already
    /// taken so callers can retry with a new code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(
        conn: &mut PgConnection,
        attendee: &NewAttendee,
    ) -> Result<Option<Attendee>, RepositoryError> {
        let row = sqlx::query_as::<_, AttendeeRow>(&format!(
            "INSERT INTO booth.attendee \
             (order_id, ticket_type_id, first_name, last_name, email, phone, ticket_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (ticket_code) DO NOTHING RETURNING {ATTENDEE_COLUMNS}"
        ))
        .bind(attendee.order_id.as_i32())
        .bind(attendee.ticket_type_id.as_i32())
        .bind(&attendee.first_name)
        .bind(&attendee.last_name)
        .bind(attendee.email.as_str())
        .bind(&attendee.phone)
        .bind(attendee.ticket_code.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "ticket type does not exist"))?;
        row.map(Attendee::try_from).transpose()
    }

    /// Load an attendee and lock its row until the transaction ends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(
        conn: &mut PgConnection,
        id: AttendeeId,
    ) -> Result<Option<Attendee>, RepositoryError> {
        let row = sqlx::query_as::<_, AttendeeRow>(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM booth.attendee WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Attendee::try_from).transpose()
    }

    /// Persist check-in state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attendee row is gone.
    pub async fn save_check_in(
        conn: &mut PgConnection,
        attendee: &Attendee,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE booth.attendee SET is_checked_in = $2, checked_in_at = $3 WHERE id = $1",
        )
        .bind(attendee.id.as_i32())
        .bind(attendee.is_checked_in)
        .bind(attendee.checked_in_at)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
