//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID (reuse or generate `x-request-id`)
//! 4. Session layer (tower-sessions with `PostgreSQL` store), public API only
//! 5. Rate limiting (governor), public API only
//!
//! Admin handlers authenticate with the [`RequireAdmin`] extractor.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::RequireAdmin;
pub use rate_limit::{api_rate_limiter, email_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use session::{CartSession, create_session_layer};
