//! Admin input validation.
//!
//! Each input type mirrors a create/update form of the back office. `validate`
//! trims text, turns blank optional fields into `None` and checks ranges,
//! returning the normalized input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::catalog::VariantOption;
use crate::types::{Email, EmailError, EventId};

/// Errors raised by admin input validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{0} cannot be negative")]
    Negative(&'static str),

    #[error("ends_at must not be before starts_at")]
    EndsBeforeStart,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_owned())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn non_negative_price(price: Decimal) -> Result<Decimal, ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::Negative("price"));
    }
    Ok(price)
}

fn non_negative_stock(available: i32) -> Result<i32, ValidationError> {
    if available < 0 {
        return Err(ValidationError::Negative("available"));
    }
    Ok(available)
}

const fn default_active() -> bool {
    true
}

/// Create/update form for an event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl EventInput {
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] for a blank name or
    /// [`ValidationError::EndsBeforeStart`].
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = required("name", &self.name)?;
        if self.ends_at.is_some_and(|ends| ends < self.starts_at) {
            return Err(ValidationError::EndsBeforeStart);
        }
        Ok(Self {
            name,
            description: optional(self.description),
            venue: optional(self.venue),
            ..self
        })
    }
}

/// Create/update form for a ticket type. The event's existence is checked by
/// the database foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TicketTypeInput {
    pub event_id: EventId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub available: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl TicketTypeInput {
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] or [`ValidationError::Negative`].
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required("name", &self.name)?,
            description: optional(self.description),
            price: non_negative_price(self.price)?,
            available: non_negative_stock(self.available)?,
            ..self
        })
    }
}

/// Create/update form for a merchandise item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MerchandiseInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub available: i32,
    #[serde(default)]
    pub variant_options: Vec<VariantOption>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl MerchandiseInput {
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`], [`ValidationError::Negative`] or
    /// [`ValidationError::Invalid`] for malformed variant options.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = required("name", &self.name)?;
        let price = non_negative_price(self.price)?;
        let available = non_negative_stock(self.available)?;

        let mut variant_options = Vec::with_capacity(self.variant_options.len());
        for option in self.variant_options {
            let option_name = required("variant option name", &option.name)?;
            if variant_options
                .iter()
                .any(|existing: &VariantOption| existing.name == option_name)
            {
                return Err(ValidationError::Invalid {
                    field: "variant_options",
                    reason: format!("duplicate option {option_name}"),
                });
            }
            let mut values: Vec<String> = Vec::with_capacity(option.values.len());
            for value in option.values {
                let value = value.trim().to_owned();
                if !value.is_empty() && !values.contains(&value) {
                    values.push(value);
                }
            }
            if values.is_empty() {
                return Err(ValidationError::Invalid {
                    field: "variant_options",
                    reason: format!("{option_name} needs at least one value"),
                });
            }
            variant_options.push(VariantOption {
                name: option_name,
                values,
            });
        }

        Ok(Self {
            name,
            description: optional(self.description),
            price,
            available,
            variant_options,
            is_active: self.is_active,
        })
    }
}

/// Admin edit of an attendee's contact details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttendeeUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Validated [`AttendeeUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeChanges {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
}

impl AttendeeUpdate {
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] or [`ValidationError::InvalidEmail`].
    pub fn validate(self) -> Result<AttendeeChanges, ValidationError> {
        Ok(AttendeeChanges {
            first_name: required("first_name", &self.first_name)?,
            last_name: required("last_name", &self.last_name)?,
            email: Email::parse(&self.email)?,
            phone: optional(self.phone),
        })
    }
}
