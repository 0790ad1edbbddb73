//! Cart repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use ticket_booth_core::{Cart, CartId, CartItem, CartStatus, NewCart};

use super::RepositoryError;

const CART_COLUMNS: &str = "id, session_id, user_id, items, status, subtotal, total, \
     created_at, updated_at, expires_at";

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    session_id: String,
    user_id: Option<String>,
    items: Json<Vec<CartItem>>,
    status: CartStatus,
    subtotal: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            session_id: row.session_id,
            user_id: row.user_id,
            items: row.items.0,
            status: row.status,
            subtotal: row.subtotal,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a cart by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM booth.cart WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// The most recent active, unexpired cart owned by `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM booth.cart \
             WHERE session_id = $1 AND status = 'active' AND expires_at > $2 \
             ORDER BY updated_at DESC LIMIT 1"
        ))
        .bind(session_id)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Insert an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, cart: &NewCart) -> Result<Cart, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "INSERT INTO booth.cart (session_id, user_id, expires_at) \
             VALUES ($1, $2, $3) RETURNING {CART_COLUMNS}"
        ))
        .bind(&cart.session_id)
        .bind(&cart.user_id)
        .bind(cart.expires_at)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Load a cart and lock its row until the transaction ends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(
        conn: &mut PgConnection,
        id: CartId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM booth.cart WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Persist the mutable fields of a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart row is gone.
    pub async fn save(conn: &mut PgConnection, cart: &Cart) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE booth.cart SET items = $2, status = $3, subtotal = $4, total = $5, \
             updated_at = $6, expires_at = $7 WHERE id = $1",
        )
        .bind(cart.id.as_i32())
        .bind(Json(&cart.items))
        .bind(cart.status)
        .bind(cart.subtotal)
        .bind(cart.total)
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
