//! Session middleware configuration and the cart-session extractor.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. Each session
//! carries a random cart token; carts are stored with that token and are only
//! reachable from the session that created them.

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::error::AppError;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "tb_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by the storefront migrations.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The caller's cart token, created on first use.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CartSession(token): CartSession) -> impl IntoResponse {
///     format!("cart token {token}")
/// }
/// ```
pub struct CartSession(pub String);

impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        if let Some(token) = session
            .get::<String>(session_keys::CART_TOKEN)
            .await
            .map_err(|e| AppError::Internal(format!("session read failed: {e}")))?
        {
            return Ok(Self(token));
        }

        let token = Uuid::new_v4().to_string();
        session
            .insert(session_keys::CART_TOKEN, &token)
            .await
            .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
        Ok(Self(token))
    }
}
