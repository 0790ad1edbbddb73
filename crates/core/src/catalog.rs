//! Catalog: events, ticket types and merchandise.
//!
//! Ticket types and merchandise both carry `available` / `sold` counters and are
//! sold through the same cart, so the cart and order rules work on
//! [`CatalogItem`], a purchasable view over either kind.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::VariantSelections;
use crate::types::{EventId, ItemType, MerchandiseId, TicketTypeId};

/// Errors raised when an item cannot be sold as requested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The item has been deactivated by an admin.
    #[error("{name} is not currently available")]
    Inactive {
        /// Item display name.
        name: String,
    },

    /// Not enough inventory for the requested quantity.
    #[error("only {available} of {name} left (requested {requested})")]
    InsufficientInventory {
        /// Item display name.
        name: String,
        /// Units requested.
        requested: u32,
        /// Units currently available.
        available: i32,
    },

    /// Variant selections do not match the item's options.
    #[error("invalid selection for {name}: {reason}")]
    InvalidVariantSelection {
        /// Item display name.
        name: String,
        /// What is wrong with the selection.
        reason: String,
    },
}

/// Reference to a catalog row of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    /// Ticket type or merchandise.
    pub item_type: ItemType,
    /// Row ID in the table for `item_type`.
    pub item_id: i32,
}

impl ItemRef {
    /// Reference a ticket type row.
    #[must_use]
    pub const fn ticket(item_id: i32) -> Self {
        Self {
            item_type: ItemType::Ticket,
            item_id,
        }
    }

    /// Reference a merchandise row.
    #[must_use]
    pub const fn merchandise(item_id: i32) -> Self {
        Self {
            item_type: ItemType::Merchandise,
            item_id,
        }
    }
}

/// An event that tickets are sold for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A kind of ticket for an event (e.g. "General Admission").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: TicketTypeId,
    pub event_id: EventId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    /// Units still for sale.
    pub available: i32,
    /// Units sold through completed orders.
    pub sold: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A selectable option on a merchandise item, e.g. `Size: S, M, L`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub name: String,
    pub values: Vec<String>,
}

/// A merchandise item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchandise {
    pub id: MerchandiseId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub available: i32,
    pub sold: i32,
    #[serde(default)]
    pub variant_options: Vec<VariantOption>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An event together with the ticket types on sale for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWithTicketTypes {
    #[serde(flatten)]
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
}

/// Purchasable view of a ticket type or merchandise item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item: ItemRef,
    pub name: String,
    pub price: Decimal,
    pub available: i32,
    pub sold: i32,
    pub is_active: bool,
    #[serde(default)]
    pub variant_options: Vec<VariantOption>,
}

impl From<&TicketType> for CatalogItem {
    fn from(ticket: &TicketType) -> Self {
        Self {
            item: ticket.id.as_item(),
            name: ticket.name.clone(),
            price: ticket.price,
            available: ticket.available,
            sold: ticket.sold,
            is_active: ticket.is_active,
            variant_options: Vec::new(),
        }
    }
}

impl From<&Merchandise> for CatalogItem {
    fn from(merch: &Merchandise) -> Self {
        Self {
            item: merch.id.as_item(),
            name: merch.name.clone(),
            price: merch.price,
            available: merch.available,
            sold: merch.sold,
            is_active: merch.is_active,
            variant_options: merch.variant_options.clone(),
        }
    }
}

impl CatalogItem {
    /// Check the item is active and has at least `quantity` units available.
    ///
    /// This is a point-in-time check; order completion re-checks inside its
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Inactive`] or [`CatalogError::InsufficientInventory`].
    pub fn ensure_purchasable(&self, quantity: u32) -> Result<(), CatalogError> {
        if !self.is_active {
            return Err(CatalogError::Inactive {
                name: self.name.clone(),
            });
        }
        if i64::from(self.available) < i64::from(quantity) {
            return Err(CatalogError::InsufficientInventory {
                name: self.name.clone(),
                requested: quantity,
                available: self.available,
            });
        }
        Ok(())
    }

    /// Check that `selections` are valid for this item.
    ///
    /// Tickets take no selections. Merchandise with options needs a known value
    /// for every option and nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidVariantSelection`] describing the mismatch.
    pub fn validate_selections(
        &self,
        selections: Option<&VariantSelections>,
    ) -> Result<(), CatalogError> {
        let empty = VariantSelections::new();
        let selections = selections.unwrap_or(&empty);
        let invalid = |reason: String| CatalogError::InvalidVariantSelection {
            name: self.name.clone(),
            reason,
        };

        for option in &self.variant_options {
            let chosen = selections
                .get(&option.name)
                .ok_or_else(|| invalid(format!("{} must be selected", option.name)))?;
            if !option.values.iter().any(|value| value == chosen) {
                return Err(invalid(format!("{chosen} is not a valid {}", option.name)));
            }
        }

        if let Some(unknown) = selections
            .keys()
            .find(|key| !self.variant_options.iter().any(|opt| &opt.name == *key))
        {
            return Err(invalid(format!("unknown option {unknown}")));
        }

        Ok(())
    }

    /// Move `quantity` units from `available` to `sold`.
    ///
    /// `available + sold` is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InsufficientInventory`] if fewer than `quantity`
    /// units are available; the counters are left untouched.
    pub fn record_sale(&mut self, quantity: u32) -> Result<(), CatalogError> {
        let qty = i32::try_from(quantity).map_err(|_| CatalogError::InsufficientInventory {
            name: self.name.clone(),
            requested: quantity,
            available: self.available,
        })?;
        if self.available < qty {
            return Err(CatalogError::InsufficientInventory {
                name: self.name.clone(),
                requested: quantity,
                available: self.available,
            });
        }
        self.available -= qty;
        self.sold += qty;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ticket(id: i32, price: i64, available: i32) -> CatalogItem {
        CatalogItem {
            item: ItemRef::ticket(id),
            name: format!("Ticket {id}"),
            price: Decimal::new(price, 0),
            available,
            sold: 0,
            is_active: true,
            variant_options: Vec::new(),
        }
    }

    pub(crate) fn shirt(id: i32, price: i64, available: i32) -> CatalogItem {
        CatalogItem {
            item: ItemRef::merchandise(id),
            name: "Festival Shirt".to_string(),
            price: Decimal::new(price, 0),
            available,
            sold: 0,
            is_active: true,
            variant_options: vec![
                VariantOption {
                    name: "Size".to_string(),
                    values: vec!["S".to_string(), "M".to_string(), "L".to_string()],
                },
                VariantOption {
                    name: "Color".to_string(),
                    values: vec!["Black".to_string(), "White".to_string()],
                },
            ],
        }
    }

    fn selections(pairs: &[(&str, &str)]) -> VariantSelections {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_ensure_purchasable() {
        let mut item = ticket(1, 50, 3);
        assert!(item.ensure_purchasable(3).is_ok());
        assert!(matches!(
            item.ensure_purchasable(4),
            Err(CatalogError::InsufficientInventory {
                requested: 4,
                available: 3,
                ..
            })
        ));

        item.is_active = false;
        assert!(matches!(
            item.ensure_purchasable(1),
            Err(CatalogError::Inactive { .. })
        ));
    }

    #[test]
    fn test_ticket_rejects_selections() {
        let item = ticket(1, 50, 3);
        assert!(item.validate_selections(None).is_ok());
        assert!(item.validate_selections(Some(&VariantSelections::new())).is_ok());
        assert!(
            item.validate_selections(Some(&selections(&[("Size", "M")])))
                .is_err()
        );
    }

    #[test]
    fn test_merchandise_requires_every_option() {
        let item = shirt(2, 25, 10);
        assert!(
            item.validate_selections(Some(&selections(&[("Size", "M"), ("Color", "Black")])))
                .is_ok()
        );
        assert!(item.validate_selections(None).is_err());
        assert!(
            item.validate_selections(Some(&selections(&[("Size", "M")])))
                .is_err()
        );
        assert!(
            item.validate_selections(Some(&selections(&[("Size", "XXL"), ("Color", "Black")])))
                .is_err()
        );
        assert!(
            item.validate_selections(Some(&selections(&[
                ("Size", "M"),
                ("Color", "Black"),
                ("Fit", "Slim"),
            ])))
            .is_err()
        );
    }

    #[test]
    fn test_record_sale_conserves_total_stock() {
        let mut item = ticket(1, 50, 10);
        item.sold = 5;
        item.record_sale(4).unwrap();
        assert_eq!(item.available, 6);
        assert_eq!(item.sold, 9);
        assert_eq!(item.available + item.sold, 15);

        let err = item.record_sale(7).unwrap_err();
        assert!(matches!(err, CatalogError::InsufficientInventory { .. }));
        assert_eq!((item.available, item.sold), (6, 9));
    }
}
