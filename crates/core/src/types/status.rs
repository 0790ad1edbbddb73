//! Status enums for carts, orders, catalog items and email deliveries.
//!
//! Each enum maps to a Postgres enum type of the same snake_case name when the
//! `postgres` feature is enabled.

use serde::{Deserialize, Serialize};

/// Lifecycle of a cart: `active → converted`, one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "cart_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    Converted,
}

/// Payment state of an order: `pending → completed`, one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// Off-platform payment methods. Payment is made outside the store and the
/// buyer reports the transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// PayPal "Friends & Family".
    Paypal,
    /// Zelle transfer.
    Zelle,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paypal => write!(f, "PayPal"),
            Self::Zelle => write!(f, "Zelle"),
        }
    }
}

/// Kind of catalog item a cart line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "item_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Ticket,
    Merchandise,
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ticket => write!(f, "ticket"),
            Self::Merchandise => write!(f, "merchandise"),
        }
    }
}

/// Outcome of a single email delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "email_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Sent,
    Failed,
}
