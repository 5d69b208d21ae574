//! Cart and order totals.

use serde::Serialize;

use crate::config::Pricing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub total: i64,
    pub currency: String,
}

/// Unit price times quantity, saturating instead of overflowing.
#[must_use]
pub fn line_total(unit_price: i64, quantity: i32) -> i64 {
    unit_price.saturating_mul(i64::from(quantity))
}

/// Apply shipping rules to a subtotal. Empty carts ship free.
#[must_use]
pub fn quote(subtotal: i64, pricing: &Pricing) -> Quote {
    let shipping_fee = if subtotal == 0 || subtotal >= pricing.free_shipping_threshold {
        0
    } else {
        pricing.shipping_flat_fee
    };
    Quote { subtotal, shipping_fee, total: subtotal.saturating_add(shipping_fee), currency: pricing.currency.clone() }
}
