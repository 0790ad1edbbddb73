//! Business logic services for the storefront.
//!
//! - `catalog` - Cached reads of the active catalog
//! - `commerce` - Cart, checkout, order completion and attendee workflows
//! - `email` - Transactional email API client
//! - `notifications` - Order notices sent after commit, with delivery logging

pub mod catalog;
pub mod commerce;
pub mod email;
pub mod notifications;

pub use catalog::CatalogService;
pub use commerce::{AddItemRequest, CommerceError, CommerceService};
pub use email::{EmailClient, EmailError};
