//! Storefront-local models.
//!
//! Domain models live in `ticket_booth_core`; this module only holds what the
//! HTTP layer keeps in the session.

pub mod session;

pub use session::keys as session_keys;
