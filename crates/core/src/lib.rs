//! Ticket Booth Core - Domain types and business rules.
//!
//! This crate provides the types and rules shared by all Ticket Booth components:
//! - `storefront` - Public ticketing/merchandise API and the admin back-office API
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains types and pure functions only - no I/O, no database
//! access, no HTTP clients. Repositories load a [`Cart`] or [`Order`], the rules
//! in this crate mutate it, and the repositories persist the result inside a
//! single transaction.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money helpers and status enums
//! - [`catalog`] - Events, ticket types, merchandise and the purchasable view of them
//! - [`cart`] - Session carts and their mutations
//! - [`order`] - Checkout and the order state machine
//! - [`attendee`] - Ticket holders and ticket codes
//! - [`validation`] - Admin input validation
//! - [`notification`] - Outgoing email composition

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod attendee;
pub mod cart;
pub mod catalog;
pub mod notification;
pub mod order;
pub mod types;
pub mod validation;

pub use attendee::{Attendee, AttendeeError, AttendeeInput, NewAttendee, TicketCode};
pub use cart::{Cart, CartError, CartItem, MAX_LINE_QUANTITY, NewCart, VariantSelections};
pub use catalog::{
    CatalogError, CatalogItem, Event, EventWithTicketTypes, ItemRef, Merchandise, TicketType,
    VariantOption,
};
pub use notification::{EmailRequest, EmailType, NotificationError, OutgoingEmail};
pub use order::{
    CheckoutDetails, CheckoutError, CheckoutInput, InventoryAdjustment, NewOrder, Order,
    OrderError, checkout,
};
pub use types::*;
pub use validation::{
    AttendeeChanges, AttendeeUpdate, EventInput, MerchandiseInput, TicketTypeInput,
    ValidationError,
};
