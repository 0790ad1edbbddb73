//! Checkout and the order state machine.
//!
//! Checkout turns an active, non-empty [`Cart`] into a [`NewOrder`] snapshot and
//! flips the cart to `converted`. The order then moves `pending → completed`
//! once the buyer reports an off-platform payment reference; completion yields
//! the inventory adjustments to apply in the same transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::{Cart, CartError, CartItem};
use crate::catalog::ItemRef;
use crate::types::{CartId, Email, EmailError, ItemType, OrderId, PaymentMethod, PaymentStatus, TicketTypeId};

/// Longest accepted payment confirmation reference.
pub const MAX_CONFIRMATION_LENGTH: usize = 200;

/// Errors raised by checkout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    /// Checkout requires at least one line.
    #[error("cart is empty")]
    EmptyCart,

    /// The cart cannot be checked out.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// An email field is malformed.
    #[error("invalid {field}: {source}")]
    InvalidEmail {
        /// Form field name.
        field: &'static str,
        /// Parse failure.
        #[source]
        source: EmailError,
    },

    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Errors raised by order state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// Completion was already recorded; inventory must not be decremented twice.
    #[error("order has already been completed")]
    AlreadyCompleted,

    /// Payment cannot be verified before the buyer submits a confirmation.
    #[error("order has no payment confirmation yet")]
    NotCompleted,

    /// Payment was already verified.
    #[error("payment has already been verified")]
    AlreadyVerified,

    /// The confirmation reference is blank or too long.
    #[error("payment confirmation must be 1-{MAX_CONFIRMATION_LENGTH} characters")]
    InvalidConfirmation,
}

/// Raw checkout form as submitted by the buyer.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub customer_email: String,
    pub customer_phone: String,
    pub payment_method: PaymentMethod,
    pub payment_email: Option<String>,
    pub payment_phone: Option<String>,
}

/// Validated checkout details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub customer_email: Email,
    pub customer_phone: String,
    pub payment_method: PaymentMethod,
    pub payment_email: Option<Email>,
    pub payment_phone: Option<String>,
}

impl CheckoutInput {
    /// Validate the form.
    ///
    /// PayPal needs the payer's email; Zelle needs an email or a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidEmail`] or [`CheckoutError::MissingField`].
    pub fn validate(self) -> Result<CheckoutDetails, CheckoutError> {
        let customer_email =
            Email::parse(&self.customer_email).map_err(|source| CheckoutError::InvalidEmail {
                field: "customer_email",
                source,
            })?;
        let customer_phone = non_blank(Some(self.customer_phone))
            .ok_or(CheckoutError::MissingField("customer_phone"))?;
        let payment_email = Email::parse_optional(self.payment_email.as_deref()).map_err(
            |source| CheckoutError::InvalidEmail {
                field: "payment_email",
                source,
            },
        )?;
        let payment_phone = non_blank(self.payment_phone);

        match self.payment_method {
            PaymentMethod::Paypal if payment_email.is_none() => {
                return Err(CheckoutError::MissingField("payment_email"));
            }
            PaymentMethod::Zelle if payment_email.is_none() && payment_phone.is_none() => {
                return Err(CheckoutError::MissingField("payment_email or payment_phone"));
            }
            _ => {}
        }

        Ok(CheckoutDetails {
            customer_email,
            customer_phone,
            payment_method: self.payment_method,
            payment_email,
            payment_phone,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// An order ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub reference: Uuid,
    pub cart_id: CartId,
    pub customer_email: Email,
    pub customer_phone: String,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_email: Option<Email>,
    pub payment_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Convert `cart` into an order snapshot and mark the cart `converted`.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] for a cart without lines, or
/// [`CheckoutError::Cart`] if the cart is already converted or expired. The
/// cart is unchanged on error.
pub fn checkout(
    cart: &mut Cart,
    details: CheckoutDetails,
    now: DateTime<Utc>,
) -> Result<NewOrder, CheckoutError> {
    cart.ensure_mutable(now)?;
    if cart.items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    cart.recompute_totals();
    let order = NewOrder {
        reference: Uuid::new_v4(),
        cart_id: cart.id,
        customer_email: details.customer_email,
        customer_phone: details.customer_phone,
        items: cart.items.clone(),
        subtotal: cart.subtotal,
        total: cart.total,
        payment_method: details.payment_method,
        payment_email: details.payment_email,
        payment_phone: details.payment_phone,
        created_at: now,
    };
    cart.mark_converted(now);

    Ok(order)
}

/// Units of one catalog item to move from `available` to `sold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub item: ItemRef,
    pub quantity: u32,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub reference: Uuid,
    pub cart_id: CartId,
    pub customer_email: Email,
    pub customer_phone: String,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_email: Option<Email>,
    pub payment_phone: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_confirmation: Option<String>,
    pub payment_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Record the buyer's payment confirmation and mark the order completed.
    ///
    /// Returns the inventory adjustments the caller must apply atomically with
    /// the status change.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::AlreadyCompleted`] on a second call and
    /// [`OrderError::InvalidConfirmation`] for a blank or oversized reference.
    pub fn complete(
        &mut self,
        payment_confirmation: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<InventoryAdjustment>, OrderError> {
        if self.payment_status == PaymentStatus::Completed {
            return Err(OrderError::AlreadyCompleted);
        }
        let confirmation = payment_confirmation.trim();
        if confirmation.is_empty() || confirmation.chars().count() > MAX_CONFIRMATION_LENGTH {
            return Err(OrderError::InvalidConfirmation);
        }

        self.payment_status = PaymentStatus::Completed;
        self.payment_confirmation = Some(confirmation.to_owned());
        self.completed_at = Some(now);
        Ok(self.inventory_adjustments())
    }

    /// Mark the payment as manually verified by staff.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotCompleted`] before completion and
    /// [`OrderError::AlreadyVerified`] on a second call.
    pub fn verify_payment(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.payment_status != PaymentStatus::Completed {
            return Err(OrderError::NotCompleted);
        }
        if self.payment_verified {
            return Err(OrderError::AlreadyVerified);
        }
        self.payment_verified = true;
        self.verified_at = Some(now);
        Ok(())
    }

    /// Per-item quantities across all lines, one entry per catalog item.
    ///
    /// Lines for the same merchandise with different variant selections draw
    /// from the same counters and are summed.
    #[must_use]
    pub fn inventory_adjustments(&self) -> Vec<InventoryAdjustment> {
        let mut totals: BTreeMap<ItemRef, u32> = BTreeMap::new();
        for line in &self.items {
            let entry = totals.entry(line.item_ref()).or_insert(0);
            *entry = entry.saturating_add(line.quantity);
        }
        totals
            .into_iter()
            .map(|(item, quantity)| InventoryAdjustment { item, quantity })
            .collect()
    }

    /// Number of tickets of `ticket_type_id` bought in this order.
    #[must_use]
    pub fn tickets_purchased(&self, ticket_type_id: TicketTypeId) -> u32 {
        self.items
            .iter()
            .filter(|line| {
                line.item_type == ItemType::Ticket && line.item_id == ticket_type_id.as_i32()
            })
            .map(|line| line.quantity)
            .sum()
    }

    /// Total number of ticket units in this order.
    #[must_use]
    pub fn ticket_count(&self) -> u32 {
        self.items
            .iter()
            .filter(|line| line.item_type == ItemType::Ticket)
            .map(|line| line.quantity)
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::cart::VariantSelections;
    use crate::cart::tests::empty_cart;
    use crate::catalog::CatalogItem;
    use crate::catalog::tests::{shirt, ticket};
    use crate::types::CartStatus;

    fn paypal_details() -> CheckoutDetails {
        CheckoutInput {
            customer_email: "buyer@example.com".to_string(),
            customer_phone: "555-0100".to_string(),
            payment_method: PaymentMethod::Paypal,
            payment_email: Some("payer@example.com".to_string()),
            payment_phone: None,
        }
        .validate()
        .unwrap()
    }

    pub(crate) fn placed_order(new: NewOrder) -> Order {
        Order {
            id: OrderId::new(10),
            reference: new.reference,
            cart_id: new.cart_id,
            customer_email: new.customer_email,
            customer_phone: new.customer_phone,
            items: new.items,
            subtotal: new.subtotal,
            total: new.total,
            payment_method: new.payment_method,
            payment_email: new.payment_email,
            payment_phone: new.payment_phone,
            payment_status: PaymentStatus::Pending,
            payment_confirmation: None,
            payment_verified: false,
            verified_at: None,
            created_at: new.created_at,
            completed_at: None,
        }
    }

    fn size(value: &str) -> Option<VariantSelections> {
        let mut map = VariantSelections::new();
        map.insert("Size".to_string(), value.to_string());
        map.insert("Color".to_string(), "Black".to_string());
        Some(map)
    }

    #[test]
    fn test_checkout_empty_cart_fails() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        assert_eq!(
            checkout(&mut cart, paypal_details(), now),
            Err(CheckoutError::EmptyCart)
        );
        assert_eq!(cart.status, CartStatus::Active);
    }

    #[test]
    fn test_checkout_snapshots_items_and_converts_cart() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(1, 50, 10), 2, None, now).unwrap();
        cart.add_item(&shirt(3, 25, 10), 1, size("M"), now).unwrap();
        let items_before = cart.items.clone();

        let order = checkout(&mut cart, paypal_details(), now).unwrap();

        assert_eq!(order.items, items_before);
        assert_eq!(order.cart_id, cart.id);
        assert_eq!(order.subtotal, Decimal::new(125, 0));
        assert_eq!(order.total, Decimal::new(125, 0));
        assert_eq!(cart.status, CartStatus::Converted);

        assert_eq!(
            checkout(&mut cart, paypal_details(), now),
            Err(CheckoutError::Cart(CartError::NotActive))
        );
    }

    #[test]
    fn test_checkout_input_validation() {
        let base = CheckoutInput {
            customer_email: "buyer@example.com".to_string(),
            customer_phone: "555-0100".to_string(),
            payment_method: PaymentMethod::Zelle,
            payment_email: None,
            payment_phone: Some("555-0199".to_string()),
        };
        assert!(base.clone().validate().is_ok());

        let no_contact = CheckoutInput {
            payment_phone: Some("  ".to_string()),
            ..base.clone()
        };
        assert_eq!(
            no_contact.validate(),
            Err(CheckoutError::MissingField("payment_email or payment_phone"))
        );

        let paypal_without_email = CheckoutInput {
            payment_method: PaymentMethod::Paypal,
            ..base.clone()
        };
        assert_eq!(
            paypal_without_email.validate(),
            Err(CheckoutError::MissingField("payment_email"))
        );

        let bad_email = CheckoutInput {
            customer_email: "nope".to_string(),
            ..base.clone()
        };
        assert!(matches!(
            bad_email.validate(),
            Err(CheckoutError::InvalidEmail {
                field: "customer_email",
                ..
            })
        ));

        let no_phone = CheckoutInput {
            customer_phone: String::new(),
            ..base
        };
        assert_eq!(
            no_phone.validate(),
            Err(CheckoutError::MissingField("customer_phone"))
        );
    }

    #[test]
    fn test_complete_twice_is_rejected_and_inventory_moves_once() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let mut stock: HashMap<ItemRef, CatalogItem> = HashMap::new();
        let ga = ticket(1, 50, 10);
        cart.add_item(&ga, 3, None, now).unwrap();
        stock.insert(ga.item, ga);

        let mut order = placed_order(checkout(&mut cart, paypal_details(), now).unwrap());

        let apply = |stock: &mut HashMap<ItemRef, CatalogItem>, adj: &[InventoryAdjustment]| {
            for a in adj {
                stock.get_mut(&a.item).unwrap().record_sale(a.quantity).unwrap();
            }
        };

        let adjustments = order.complete("PP-TXN-123", now).unwrap();
        apply(&mut stock, &adjustments);
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.payment_confirmation.as_deref(), Some("PP-TXN-123"));

        assert_eq!(
            order.complete("PP-TXN-123", now),
            Err(OrderError::AlreadyCompleted)
        );

        let ga = stock.get(&ItemRef::ticket(1)).unwrap();
        assert_eq!((ga.available, ga.sold), (7, 3));
    }

    #[test]
    fn test_complete_rejects_blank_confirmation() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(1, 50, 10), 1, None, now).unwrap();
        let mut order = placed_order(checkout(&mut cart, paypal_details(), now).unwrap());

        assert_eq!(order.complete("   ", now), Err(OrderError::InvalidConfirmation));
        assert_eq!(
            order.complete(&"x".repeat(MAX_CONFIRMATION_LENGTH + 1), now),
            Err(OrderError::InvalidConfirmation)
        );
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_adjustments_sum_variants_of_same_item() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let tee = shirt(3, 25, 10);
        cart.add_item(&tee, 1, size("M"), now).unwrap();
        cart.add_item(&tee, 2, size("L"), now).unwrap();
        cart.add_item(&ticket(3, 50, 10), 4, None, now).unwrap();
        let order = placed_order(checkout(&mut cart, paypal_details(), now).unwrap());

        let adjustments = order.inventory_adjustments();
        assert_eq!(
            adjustments,
            vec![
                InventoryAdjustment {
                    item: ItemRef::ticket(3),
                    quantity: 4
                },
                InventoryAdjustment {
                    item: ItemRef::merchandise(3),
                    quantity: 3
                },
            ]
        );
        assert_eq!(order.tickets_purchased(TicketTypeId::new(3)), 4);
        assert_eq!(order.tickets_purchased(TicketTypeId::new(4)), 0);
        assert_eq!(order.ticket_count(), 4);
    }

    #[test]
    fn test_verify_payment_transitions() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(1, 50, 10), 1, None, now).unwrap();
        let mut order = placed_order(checkout(&mut cart, paypal_details(), now).unwrap());

        assert_eq!(order.verify_payment(now), Err(OrderError::NotCompleted));
        order.complete("ZELLE-9", now).unwrap();
        order.verify_payment(now).unwrap();
        assert!(order.payment_verified);
        assert_eq!(order.verified_at, Some(now));
        assert_eq!(order.verify_payment(now), Err(OrderError::AlreadyVerified));
    }
}
