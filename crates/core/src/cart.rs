//! Session carts.
//!
//! A cart belongs to one browser session until checkout. Every mutation goes
//! through a method on [`Cart`] so the derived `subtotal` / `total` always equal
//! `Σ price × quantity` over the remaining lines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogError, CatalogItem, ItemRef};
use crate::types::{CartId, CartStatus, ItemType, line_total};

/// Option name → chosen value, e.g. `{"Size": "M"}`.
///
/// Ordered so two selections with the same pairs compare equal regardless of
/// the order the client sent them in.
pub type VariantSelections = BTreeMap<String, String>;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Errors raised by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// The cart has already been checked out.
    #[error("cart has already been checked out")]
    NotActive,

    /// The cart's session expired.
    #[error("cart has expired")]
    Expired,

    /// No line exists at the given position.
    #[error("no cart item at index {index} (cart has {len} items)")]
    ItemIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of lines in the cart.
        len: usize,
    },

    /// Quantity is zero or too large.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The catalog item cannot be sold as requested.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One line of a cart (and, after checkout, of an order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_id: i32,
    pub item_type: ItemType,
    pub quantity: u32,
    /// Unit price captured when the line was first added.
    pub price: Decimal,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_selections: Option<VariantSelections>,
}

impl CartItem {
    /// Catalog row this line refers to.
    #[must_use]
    pub const fn item_ref(&self) -> ItemRef {
        ItemRef {
            item_type: self.item_type,
            item_id: self.item_id,
        }
    }

    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.price, self.quantity)
    }

    /// Whether `other` is the same line for merge-on-add purposes.
    ///
    /// An empty selection map is the same as no selections.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.item_ref() == other.item_ref() && self.selections() == other.selections()
    }

    fn selections(&self) -> Option<&VariantSelections> {
        self.variant_selections.as_ref().filter(|s| !s.is_empty())
    }
}

/// Data needed to insert a new, empty cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCart {
    pub session_id: String,
    pub user_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// A session cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    #[serde(skip_serializing, default)]
    pub session_id: String,
    pub user_id: Option<String>,
    pub items: Vec<CartItem>,
    pub status: CartStatus,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Cart {
    /// Whether the cart can still be used at `now`.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == CartStatus::Active && self.expires_at > now
    }

    /// Fail unless the cart is active and not expired.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotActive`] for converted carts and
    /// [`CartError::Expired`] once `expires_at` has passed.
    pub fn ensure_mutable(&self, now: DateTime<Utc>) -> Result<(), CartError> {
        if self.status != CartStatus::Active {
            return Err(CartError::NotActive);
        }
        if self.expires_at <= now {
            return Err(CartError::Expired);
        }
        Ok(())
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Add `quantity` units of `catalog` to the cart.
    ///
    /// Merges into an existing line with the same item and selections, otherwise
    /// appends a new line. Availability is checked against the resulting line
    /// quantity. Returns the index of the affected line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity or a line
    /// quantity above [`MAX_LINE_QUANTITY`], a
    /// [`CartError::Catalog`] error if the item is inactive, the selections are
    /// invalid or stock is insufficient, or the errors of [`Cart::ensure_mutable`].
    pub fn add_item(
        &mut self,
        catalog: &CatalogItem,
        quantity: u32,
        variant_selections: Option<VariantSelections>,
        now: DateTime<Utc>,
    ) -> Result<usize, CartError> {
        self.ensure_mutable(now)?;
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity(i64::from(quantity)));
        }
        catalog.validate_selections(variant_selections.as_ref())?;

        let line = CartItem {
            item_id: catalog.item.item_id,
            item_type: catalog.item.item_type,
            quantity,
            price: catalog.price,
            name: catalog.name.clone(),
            variant_selections: variant_selections.filter(|s| !s.is_empty()),
        };

        let index = match self.items.iter().position(|existing| existing.same_line(&line)) {
            Some(index) => {
                let existing = self
                    .items
                    .get_mut(index)
                    .ok_or(CartError::ItemIndexOutOfRange { index, len: 0 })?;
                let merged = existing.quantity + quantity;
                if merged > MAX_LINE_QUANTITY {
                    return Err(CartError::InvalidQuantity(i64::from(merged)));
                }
                catalog.ensure_purchasable(merged)?;
                existing.quantity = merged;
                index
            }
            None => {
                catalog.ensure_purchasable(quantity)?;
                self.items.push(line);
                self.items.len() - 1
            }
        };

        self.touch(now);
        Ok(index)
    }

    /// Set the quantity of the line at `index`; zero or less removes the line.
    ///
    /// Does not re-check availability.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemIndexOutOfRange`], [`CartError::InvalidQuantity`]
    /// for quantities above [`MAX_LINE_QUANTITY`], or the errors of
    /// [`Cart::ensure_mutable`].
    pub fn update_item_quantity(
        &mut self,
        index: usize,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        self.ensure_mutable(now)?;
        if quantity <= 0 {
            return self.remove_item(index, now);
        }

        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(CartError::InvalidQuantity(quantity))?;
        let len = self.items.len();
        let line = self
            .items
            .get_mut(index)
            .ok_or(CartError::ItemIndexOutOfRange { index, len })?;
        line.quantity = quantity;

        self.touch(now);
        Ok(())
    }

    /// Remove the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemIndexOutOfRange`] or the errors of
    /// [`Cart::ensure_mutable`].
    pub fn remove_item(&mut self, index: usize, now: DateTime<Utc>) -> Result<(), CartError> {
        self.ensure_mutable(now)?;
        if index >= self.items.len() {
            return Err(CartError::ItemIndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.items.remove(index);
        self.touch(now);
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Cart::ensure_mutable`].
    pub fn clear(&mut self, now: DateTime<Utc>) -> Result<(), CartError> {
        self.ensure_mutable(now)?;
        self.items.clear();
        self.touch(now);
        Ok(())
    }

    /// Recompute `subtotal` and `total` from the lines.
    ///
    /// There is no tax, fee or discount model, so both are the flat sum.
    pub fn recompute_totals(&mut self) {
        let subtotal: Decimal = self.items.iter().map(CartItem::line_total).sum();
        self.subtotal = subtotal;
        self.total = subtotal;
    }

    /// Push the expiry out to `expires_at`.
    pub fn renew(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = expires_at;
    }

    /// Flip the cart to `converted`. Called by checkout only.
    pub(crate) fn mark_converted(&mut self, now: DateTime<Utc>) {
        self.status = CartStatus::Converted;
        self.updated_at = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.recompute_totals();
        self.updated_at = now;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Duration;

    use super::*;
    use crate::catalog::tests::{shirt, ticket};

    pub(crate) fn empty_cart(now: DateTime<Utc>) -> Cart {
        Cart {
            id: CartId::new(1),
            session_id: "session-abc".to_string(),
            user_id: None,
            items: Vec::new(),
            status: CartStatus::Active,
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    fn size(value: &str, color: &str) -> Option<VariantSelections> {
        Some(
            [("Size", value), ("Color", color)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn assert_totals_match_lines(cart: &Cart) {
        let expected: Decimal = cart
            .items
            .iter()
            .map(|i| i.price * Decimal::from(i.quantity))
            .sum();
        assert_eq!(cart.subtotal, expected);
        assert_eq!(cart.total, expected);
    }

    #[test]
    fn test_fifty_dollar_ticket_twice_then_zero() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let ga = ticket(1, 50, 100);

        cart.add_item(&ga, 2, None, now).unwrap();
        assert_eq!(cart.subtotal, Decimal::new(10000, 2));
        assert_eq!(cart.total, Decimal::new(10000, 2));

        cart.update_item_quantity(0, 0, now).unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total, Decimal::ZERO);
    }

    #[test]
    fn test_repeated_adds_merge_into_one_line() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let ga = ticket(1, 50, 100);

        for qty in [1, 3, 2, 4] {
            assert_eq!(cart.add_item(&ga, qty, None, now).unwrap(), 0);
        }

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 10);
        assert_totals_match_lines(&cart);
    }

    #[test]
    fn test_merge_identity_includes_type_and_selections() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let ga = ticket(7, 50, 100);
        let tee = shirt(7, 25, 100);

        cart.add_item(&ga, 1, None, now).unwrap();
        cart.add_item(&tee, 1, size("M", "Black"), now).unwrap();
        cart.add_item(&tee, 2, size("L", "Black"), now).unwrap();
        cart.add_item(&tee, 1, size("M", "Black"), now).unwrap();

        assert_eq!(cart.items.len(), 3);
        assert_eq!(cart.items[1].quantity, 2);
        assert_eq!(cart.items[2].quantity, 2);
        assert_eq!(cart.item_count(), 5);
        assert_totals_match_lines(&cart);
    }

    #[test]
    fn test_empty_selections_match_none() {
        let a = CartItem {
            item_id: 1,
            item_type: ItemType::Ticket,
            quantity: 1,
            price: Decimal::ONE,
            name: "GA".to_string(),
            variant_selections: None,
        };
        let b = CartItem {
            variant_selections: Some(VariantSelections::new()),
            ..a.clone()
        };
        assert!(a.same_line(&b));
    }

    #[test]
    fn test_add_checks_merged_quantity_against_stock() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let vip = ticket(2, 150, 3);

        cart.add_item(&vip, 2, None, now).unwrap();
        let err = cart.add_item(&vip, 2, None, now).unwrap_err();
        assert!(matches!(
            err,
            CartError::Catalog(CatalogError::InsufficientInventory { requested: 4, .. })
        ));
        assert_eq!(cart.items[0].quantity, 2);
        assert_totals_match_lines(&cart);
    }

    #[test]
    fn test_add_rejects_zero_and_inactive() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let mut ga = ticket(1, 50, 10);

        assert_eq!(
            cart.add_item(&ga, 0, None, now),
            Err(CartError::InvalidQuantity(0))
        );

        ga.is_active = false;
        assert!(matches!(
            cart.add_item(&ga, 1, None, now),
            Err(CartError::Catalog(CatalogError::Inactive { .. }))
        ));
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_line_quantity_is_capped() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let ga = ticket(1, 50, i32::MAX);

        assert_eq!(
            cart.add_item(&ga, MAX_LINE_QUANTITY + 1, None, now),
            Err(CartError::InvalidQuantity(i64::from(MAX_LINE_QUANTITY) + 1))
        );

        cart.add_item(&ga, MAX_LINE_QUANTITY - 1, None, now).unwrap();
        assert_eq!(
            cart.add_item(&ga, 2, None, now),
            Err(CartError::InvalidQuantity(i64::from(MAX_LINE_QUANTITY) + 1))
        );
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY - 1);

        assert_eq!(
            cart.update_item_quantity(0, 4_000_000_000, now),
            Err(CartError::InvalidQuantity(4_000_000_000))
        );
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY - 1);
        assert_eq!(cart.subtotal, Decimal::new(50, 0) * Decimal::from(MAX_LINE_QUANTITY - 1));

        cart.update_item_quantity(0, i64::from(MAX_LINE_QUANTITY), now)
            .unwrap();
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
        assert_totals_match_lines(&cart);
    }

    #[test]
    fn test_update_does_not_revalidate_stock() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        let ga = ticket(1, 50, 2);

        cart.add_item(&ga, 1, None, now).unwrap();
        cart.update_item_quantity(0, 25, now).unwrap();
        assert_eq!(cart.items[0].quantity, 25);
        assert_eq!(cart.total, Decimal::new(1250, 0));
    }

    #[test]
    fn test_update_negative_removes_and_bad_index_fails() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(1, 10, 10), 1, None, now).unwrap();
        cart.add_item(&ticket(2, 20, 10), 1, None, now).unwrap();

        cart.update_item_quantity(0, -3, now).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].item_id, 2);
        assert_totals_match_lines(&cart);

        assert_eq!(
            cart.update_item_quantity(5, 1, now),
            Err(CartError::ItemIndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(
            cart.remove_item(1, now),
            Err(CartError::ItemIndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_remove_and_clear_recompute_totals() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(1, 10, 10), 2, None, now).unwrap();
        cart.add_item(&ticket(2, 35, 10), 1, None, now).unwrap();
        assert_eq!(cart.total, Decimal::new(55, 0));

        cart.remove_item(0, now).unwrap();
        assert_eq!(cart.total, Decimal::new(35, 0));

        cart.clear(now).unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_converted_and_expired_carts_are_frozen() {
        let now = Utc::now();
        let ga = ticket(1, 50, 10);

        let mut converted = empty_cart(now);
        converted.mark_converted(now);
        assert_eq!(converted.add_item(&ga, 1, None, now), Err(CartError::NotActive));
        assert_eq!(converted.clear(now), Err(CartError::NotActive));

        let mut expired = empty_cart(now);
        expired.expires_at = now - Duration::minutes(1);
        assert!(!expired.is_usable(now));
        assert_eq!(expired.add_item(&ga, 1, None, now), Err(CartError::Expired));
    }

    #[test]
    fn test_mutations_refresh_updated_at() {
        let created = Utc::now();
        let later = created + Duration::minutes(5);
        let mut cart = empty_cart(created);
        cart.add_item(&ticket(1, 10, 10), 1, None, later).unwrap();
        assert_eq!(cart.updated_at, later);
    }
}
