//! Order repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use ticket_booth_core::{
    CartId, CartItem, Email, NewOrder, Order, OrderId, PaymentMethod, PaymentStatus,
};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

const ORDER_COLUMNS: &str = "id, reference, cart_id, customer_email, customer_phone, items, \
     subtotal, total, payment_method, payment_email, payment_phone, payment_status, \
     payment_confirmation, payment_verified, verified_at, created_at, completed_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    reference: Uuid,
    cart_id: i32,
    customer_email: String,
    customer_phone: String,
    items: Json<Vec<CartItem>>,
    subtotal: Decimal,
    total: Decimal,
    payment_method: PaymentMethod,
    payment_email: Option<String>,
    payment_phone: Option<String>,
    payment_status: PaymentStatus,
    payment_confirmation: Option<String>,
    payment_verified: bool,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

fn parse_email(value: &str) -> Result<Email, RepositoryError> {
    Email::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            reference: row.reference,
            cart_id: CartId::new(row.cart_id),
            customer_email: parse_email(&row.customer_email)?,
            customer_phone: row.customer_phone,
            items: row.items.0,
            subtotal: row.subtotal,
            total: row.total,
            payment_method: row.payment_method,
            payment_email: row.payment_email.as_deref().map(parse_email).transpose()?,
            payment_phone: row.payment_phone,
            payment_status: row.payment_status,
            payment_confirmation: row.payment_confirmation,
            payment_verified: row.payment_verified,
            verified_at: row.verified_at,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct SalesSummary {
    pub pending_orders: i64,
    pub completed_orders: i64,
    pub verified_orders: i64,
    pub completed_revenue: Decimal,
    pub tickets_sold: i64,
    pub merchandise_sold: i64,
    pub attendees: i64,
    pub checked_in: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM booth.\"order\" WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// Look up an order by its public reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reference(&self, reference: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM booth.\"order\" WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// Orders, newest first, optionally filtered by payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM booth.\"order\" \
             WHERE ($1::payment_status IS NULL OR payment_status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    /// Dashboard totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_summary(&self) -> Result<SalesSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, SalesSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM booth."order" WHERE payment_status = 'pending') AS pending_orders,
                (SELECT COUNT(*) FROM booth."order" WHERE payment_status = 'completed') AS completed_orders,
                (SELECT COUNT(*) FROM booth."order" WHERE payment_verified) AS verified_orders,
                (SELECT COALESCE(SUM(total), 0) FROM booth."order"
                    WHERE payment_status = 'completed') AS completed_revenue,
                (SELECT COALESCE(SUM(sold), 0)::bigint FROM booth.ticket_type) AS tickets_sold,
                (SELECT COALESCE(SUM(sold), 0)::bigint FROM booth.merchandise) AS merchandise_sold,
                (SELECT COUNT(*) FROM booth.attendee) AS attendees,
                (SELECT COUNT(*) FROM booth.attendee WHERE is_checked_in) AS checked_in
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Insert an order created by checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the cart already has an order.
    pub async fn insert(conn: &mut PgConnection, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO booth.\"order\" (reference, cart_id, customer_email, customer_phone, \
             items, subtotal, total, payment_method, payment_email, payment_phone, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.reference)
        .bind(order.cart_id.as_i32())
        .bind(order.customer_email.as_str())
        .bind(&order.customer_phone)
        .bind(Json(&order.items))
        .bind(order.subtotal)
        .bind(order.total)
        .bind(order.payment_method)
        .bind(order.payment_email.as_ref().map(Email::as_str))
        .bind(&order.payment_phone)
        .bind(order.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "cart has already been checked out"))?;
        Order::try_from(row)
    }

    /// Load an order and lock its row until the transaction ends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM booth.\"order\" WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// Look up an order's ID by reference, locking the row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_by_reference(
        conn: &mut PgConnection,
        reference: Uuid,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM booth.\"order\" WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// Persist payment state (status, confirmation, verification).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order row is gone.
    pub async fn save_payment(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE booth.\"order\" SET payment_status = $2, payment_confirmation = $3, \
             completed_at = $4, payment_verified = $5, verified_at = $6 WHERE id = $1",
        )
        .bind(order.id.as_i32())
        .bind(order.payment_status)
        .bind(&order.payment_confirmation)
        .bind(order.completed_at)
        .bind(order.payment_verified)
        .bind(order.verified_at)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
