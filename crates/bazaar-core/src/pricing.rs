//! # Pricing
//!
//! Derived money values: a product's final price, a line's total, and the
//! cart totals. Nothing computed here is ever stored on a cart; it is
//! recomputed from the live product rows on every read and again at
//! checkout.
//!
//! ```text
//! final_price = base_price × (1 − discount)
//! line_total  = final_price × quantity
//! subtotal    = Σ line_total
//! tax         = subtotal × tax_rate
//! total       = subtotal + shipping + tax
//! ```
//!
//! Every step is exact; no intermediate value is rounded to the cent.
//! Arithmetic that would leave `Money`'s range fails with
//! `ValidationError::TooLarge` instead of wrapping.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::TaxRate;
use crate::{DEFAULT_SHIPPING_CENTS, DEFAULT_TAX_RATE_BPS};

/// Price after applying a percentage discount given in basis points.
#[inline]
pub fn final_price(base_price: Money, discount_bps: u32) -> Money {
    base_price.apply_percentage_discount(discount_bps)
}

/// `price × quantity`, or `TooLarge` when it does not fit.
pub fn line_total(price: Money, quantity: i64) -> Result<Money, ValidationError> {
    price
        .checked_mul_quantity(quantity)
        .ok_or_else(|| too_large("line_total"))
}

/// Tax rate and shipping charge applied on top of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub tax_rate: TaxRate,
    pub shipping: Money,
}

impl PricingPolicy {
    pub const fn new(tax_rate: TaxRate, shipping: Money) -> Self {
        PricingPolicy { tax_rate, shipping }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            tax_rate: TaxRate::from_bps(DEFAULT_TAX_RATE_BPS),
            shipping: Money::from_cents(DEFAULT_SHIPPING_CENTS),
        }
    }
}

/// Totals of a materialized cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of line quantities (not the number of lines).
    pub total_items: i64,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl CartTotals {
    /// Computes totals from `(final_price, quantity)` pairs.
    ///
    /// An empty cart has every total at zero, shipping included.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use bazaar_core::pricing::{CartTotals, PricingPolicy};
    ///
    /// let lines = [(Money::from_cents(9_000), 2), (Money::from_cents(5_000), 1)];
    /// let totals = CartTotals::compute(lines, &PricingPolicy::default()).unwrap();
    ///
    /// assert_eq!(totals.subtotal, Money::from_cents(23_000));
    /// assert_eq!(totals.tax, Money::from_cents(2_300));
    /// assert_eq!(totals.total, Money::from_cents(25_300));
    /// assert_eq!(totals.total_items, 3);
    /// ```
    pub fn compute<I>(lines: I, policy: &PricingPolicy) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (Money, i64)>,
    {
        let mut total_items: i64 = 0;
        let mut subtotal = Money::zero();
        for (price, quantity) in lines {
            total_items = total_items
                .checked_add(quantity)
                .ok_or_else(|| too_large("total_items"))?;
            subtotal = subtotal
                .checked_add(line_total(price, quantity)?)
                .ok_or_else(|| too_large("subtotal"))?;
        }

        if total_items == 0 {
            return Ok(CartTotals::default());
        }

        let tax = subtotal
            .calculate_tax(policy.tax_rate)
            .ok_or_else(|| too_large("tax"))?;
        let total = subtotal
            .checked_add(policy.shipping)
            .and_then(|t| t.checked_add(tax))
            .ok_or_else(|| too_large("total"))?;

        Ok(CartTotals {
            total_items,
            subtotal,
            shipping: policy.shipping,
            tax,
            total,
        })
    }
}

/// Order total charged at checkout: the subtotal of the re-priced lines.
///
/// Tax and shipping are presented on the cart but are not part of the
/// persisted order total.
pub fn order_total<I>(lines: I) -> Result<Money, ValidationError>
where
    I: IntoIterator<Item = (Money, i64)>,
{
    lines.into_iter().try_fold(Money::zero(), |acc, (price, qty)| {
        acc.checked_add(line_total(price, qty)?)
            .ok_or_else(|| too_large("order_total"))
    })
}

fn too_large(field: &str) -> ValidationError {
    ValidationError::TooLarge {
        field: field.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
