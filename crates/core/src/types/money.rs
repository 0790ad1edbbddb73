//! Money helpers using decimal arithmetic.
//!
//! Prices and totals are plain [`Decimal`] amounts in the store currency.
//! Arithmetic is exact; rounding to cents happens only when formatting.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

/// Price of `quantity` units at `price` each.
#[must_use]
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price * Decimal::from(quantity)
}

/// Format an amount for display, e.g. `$100.00`.
#[must_use]
pub fn format_money(amount: Decimal, currency: CurrencyCode) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}{:.2}", currency.symbol(), rounded.abs())
    } else {
        format!("{}{:.2}", currency.symbol(), rounded.abs())
    }
}
