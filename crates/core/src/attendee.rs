//! Ticket holders.
//!
//! Each ticket unit bought in an order can be assigned to one named attendee.
//! Registration never touches inventory; only order completion does.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::types::{AttendeeId, Email, EmailError, OrderId, TicketTypeId};

/// Characters used in ticket codes. `0/O` and `1/I` are left out.
const TICKET_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const TICKET_CODE_PREFIX: &str = "TB";
const TICKET_CODE_GROUP_LEN: usize = 4;

/// Errors raised by attendee operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttendeeError {
    /// The order did not buy this ticket type.
    #[error("ticket type {0} is not part of this order")]
    TicketTypeNotInOrder(TicketTypeId),

    /// Every purchased ticket of this type already has an attendee.
    #[error("all {purchased} tickets of this type already have attendees")]
    NoTicketsRemaining {
        /// Tickets of this type in the order.
        purchased: u32,
    },

    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The attendee email is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Check-in was already recorded.
    #[error("attendee is already checked in")]
    AlreadyCheckedIn,

    /// Undo requested for an attendee who is not checked in.
    #[error("attendee is not checked in")]
    NotCheckedIn,
}

/// Human-readable ticket code, e.g. `TB-7KQ2-MXH9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    /// Generate a random code. Uniqueness is enforced by the database; callers
    /// retry on collision.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let first = code_group(rng);
        let second = code_group(rng);
        Self(format!("{TICKET_CODE_PREFIX}-{first}-{second}"))
    }

    /// Wrap a code loaded from storage.
    #[must_use]
    pub const fn from_stored(code: String) -> Self {
        Self(code)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn code_group<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut group = String::with_capacity(TICKET_CODE_GROUP_LEN);
    for _ in 0..TICKET_CODE_GROUP_LEN {
        if let Some(b) = TICKET_CODE_ALPHABET.choose(rng) {
            group.push(char::from(*b));
        }
    }
    group
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered ticket holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: AttendeeId,
    pub order_id: OrderId,
    pub ticket_type_id: TicketTypeId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub ticket_code: TicketCode,
    pub is_checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Attendee {
    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Record arrival at the venue.
    ///
    /// # Errors
    ///
    /// Returns [`AttendeeError::AlreadyCheckedIn`] on a second check-in.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<(), AttendeeError> {
        if self.is_checked_in {
            return Err(AttendeeError::AlreadyCheckedIn);
        }
        self.is_checked_in = true;
        self.checked_in_at = Some(now);
        Ok(())
    }

    /// Revert a check-in made by mistake.
    ///
    /// # Errors
    ///
    /// Returns [`AttendeeError::NotCheckedIn`].
    pub fn undo_check_in(&mut self) -> Result<(), AttendeeError> {
        if !self.is_checked_in {
            return Err(AttendeeError::NotCheckedIn);
        }
        self.is_checked_in = false;
        self.checked_in_at = None;
        Ok(())
    }
}

/// Attendee details as submitted on the registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendeeInput {
    pub ticket_type_id: TicketTypeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A validated attendee ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendee {
    pub order_id: OrderId,
    pub ticket_type_id: TicketTypeId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub ticket_code: TicketCode,
}

impl AttendeeInput {
    /// Validate the form for `order`, given how many attendees are already
    /// registered for the same ticket type.
    ///
    /// # Errors
    ///
    /// Returns [`AttendeeError::TicketTypeNotInOrder`],
    /// [`AttendeeError::NoTicketsRemaining`] or a field error.
    pub fn validate<R: Rng + ?Sized>(
        self,
        order: &Order,
        already_registered: u32,
        rng: &mut R,
    ) -> Result<NewAttendee, AttendeeError> {
        ensure_ticket_available(order, self.ticket_type_id, already_registered)?;

        let first_name =
            required(&self.first_name).ok_or(AttendeeError::MissingField("first_name"))?;
        let last_name =
            required(&self.last_name).ok_or(AttendeeError::MissingField("last_name"))?;
        let email = Email::parse(&self.email)?;
        let phone = self.phone.as_deref().and_then(required);

        Ok(NewAttendee {
            order_id: order.id,
            ticket_type_id: self.ticket_type_id,
            first_name,
            last_name,
            email,
            phone,
            ticket_code: TicketCode::generate(rng),
        })
    }
}

fn required(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Check that `order` still has an unassigned ticket of `ticket_type_id`.
///
/// # Errors
///
/// Returns [`AttendeeError::TicketTypeNotInOrder`] if the order has no such
/// ticket, or [`AttendeeError::NoTicketsRemaining`] once every unit is assigned.
pub fn ensure_ticket_available(
    order: &Order,
    ticket_type_id: TicketTypeId,
    already_registered: u32,
) -> Result<(), AttendeeError> {
    let purchased = order.tickets_purchased(ticket_type_id);
    if purchased == 0 {
        return Err(AttendeeError::TicketTypeNotInOrder(ticket_type_id));
    }
    if already_registered >= purchased {
        return Err(AttendeeError::NoTicketsRemaining { purchased });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::cart::tests::empty_cart;
    use crate::catalog::tests::{shirt, ticket};
    use crate::order::tests::placed_order;
    use crate::order::{CheckoutInput, checkout};
    use crate::types::PaymentMethod;

    fn order_with_two_tickets() -> Order {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(5, 40, 10), 2, None, now).unwrap();
        let mut size = crate::cart::VariantSelections::new();
        size.insert("Size".to_string(), "S".to_string());
        size.insert("Color".to_string(), "White".to_string());
        cart.add_item(&shirt(5, 20, 10), 1, Some(size), now).unwrap();
        let details = CheckoutInput {
            customer_email: "buyer@example.com".to_string(),
            customer_phone: "555-0100".to_string(),
            payment_method: PaymentMethod::Zelle,
            payment_email: None,
            payment_phone: Some("555-0100".to_string()),
        }
        .validate()
        .unwrap();
        placed_order(checkout(&mut cart, details, now).unwrap())
    }

    fn input(ticket_type_id: i32) -> AttendeeInput {
        AttendeeInput {
            ticket_type_id: TicketTypeId::new(ticket_type_id),
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: "Ada@Example.com".to_string(),
            phone: Some(String::new()),
        }
    }

    #[test]
    fn test_ticket_code_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = TicketCode::generate(&mut rng);
            let parts: Vec<&str> = code.as_str().split('-').collect();
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], "TB");
            for group in &parts[1..] {
                assert_eq!(group.len(), 4);
                assert!(group.bytes().all(|b| TICKET_CODE_ALPHABET.contains(&b)));
            }
        }
    }

    #[test]
    fn test_ticket_codes_vary() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = TicketCode::generate(&mut rng);
        let b = TicketCode::generate(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_attendee() {
        let order = order_with_two_tickets();
        let mut rng = StdRng::seed_from_u64(1);

        let new = input(5).validate(&order, 0, &mut rng).unwrap();
        assert_eq!(new.order_id, order.id);
        assert_eq!(new.first_name, "Ada");
        assert_eq!(new.email.as_str(), "ada@example.com");
        assert_eq!(new.phone, None);

        let blank = AttendeeInput {
            last_name: "  ".to_string(),
            ..input(5)
        };
        assert_eq!(
            blank.validate(&order, 0, &mut rng),
            Err(AttendeeError::MissingField("last_name"))
        );
    }

    #[test]
    fn test_attendees_limited_by_purchased_quantity() {
        let order = order_with_two_tickets();
        let mut rng = StdRng::seed_from_u64(1);

        assert!(input(5).validate(&order, 1, &mut rng).is_ok());
        assert_eq!(
            input(5).validate(&order, 2, &mut rng),
            Err(AttendeeError::NoTicketsRemaining { purchased: 2 })
        );
        // Merchandise id 5 is not a ticket.
        assert_eq!(
            input(6).validate(&order, 0, &mut rng),
            Err(AttendeeError::TicketTypeNotInOrder(TicketTypeId::new(6)))
        );
    }

    #[test]
    fn test_check_in_and_undo() {
        let order = order_with_two_tickets();
        let mut rng = StdRng::seed_from_u64(3);
        let new = input(5).validate(&order, 0, &mut rng).unwrap();
        let now = Utc::now();
        let mut attendee = Attendee {
            id: AttendeeId::new(1),
            order_id: new.order_id,
            ticket_type_id: new.ticket_type_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            ticket_code: new.ticket_code,
            is_checked_in: false,
            checked_in_at: None,
            created_at: now,
        };
        assert_eq!(attendee.full_name(), "Ada Lovelace");

        assert_eq!(attendee.undo_check_in(), Err(AttendeeError::NotCheckedIn));
        attendee.check_in(now).unwrap();
        assert_eq!(attendee.checked_in_at, Some(now));
        assert_eq!(attendee.check_in(now), Err(AttendeeError::AlreadyCheckedIn));
        attendee.undo_check_in().unwrap();
        assert!(!attendee.is_checked_in);
        assert_eq!(attendee.checked_in_at, None);
    }
}
