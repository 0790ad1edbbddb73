//! Core types for Ticket Booth.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, format_money, line_total};
pub use status::*;
