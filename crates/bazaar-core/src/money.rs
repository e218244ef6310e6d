//! # Money Module
//!
//! The `Money` type: every price, line total, subtotal, tax and order total
//! in the storefront is an exact decimal amount in dollars.
//!
//! ## Why Exact Decimals?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A cart line of 3 × $19.99 at 15% off                                   │
//! │                                                                         │
//! │  f64:      19.99 * (1 - 15/100) * 3 = 50.974499999999995               │
//! │  per-cent: round(19.99 * 0.85) = 16.99,  16.99 * 3 = 50.97  (off 0.0045)│
//! │  Decimal:  19.99 * 0.85 = 16.9915,  16.9915 * 3 = 50.9745   (exact)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in the pricing path rounds. Rounding to the cent happens only
//! when an amount is displayed.
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! let price = Money::from_cents(1999).apply_percentage_discount(1500);
//! let line = price.checked_mul_quantity(3).unwrap();
//! assert_eq!(line, "50.9745".parse().unwrap());
//! assert_eq!(line.to_string(), "$50.97");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use crate::types::TaxRate;

const BPS_PER_UNIT: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// An exact monetary amount in dollars.
///
/// ## Where Money Flows
/// ```text
/// products.base_price_cents ──► final_price() ──► LineView.line_total
///                                      │                    │
///                                      │                    ▼
///                                      │        CartTotals.subtotal ─► tax ─► total
///                                      ▼
///                    order_items.unit_price (frozen at checkout, TEXT)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps an amount in dollars.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from whole cents.
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// Returns the exact amount in dollars.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is negative.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// The amount rounded half up to the cent, for display.
    pub fn round_to_cent(&self) -> Money {
        let mut rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        Money(rounded)
    }

    /// Calculates tax at `rate` without rounding. `None` when the result
    /// does not fit.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use bazaar_core::types::TaxRate;
    ///
    /// // Scenario: $230.00 subtotal at 10%
    /// let tax = Money::from_cents(23_000).calculate_tax(TaxRate::from_bps(1_000));
    /// assert_eq!(tax, Some(Money::from_cents(2_300)));
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        self.scale_bps(rate.bps())
    }

    /// Multiplies money by a quantity. `None` when the result does not fit.
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(Decimal::from(qty)).map(Money)
    }

    /// Adds two amounts. `None` when the result does not fit.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let discounted = Money::from_cents(1999).apply_percentage_discount(1500);
    /// assert_eq!(discounted, "16.9915".parse().unwrap());
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        let kept = BPS_PER_UNIT - i64::from(discount_bps.min(BPS_PER_UNIT as u32));
        // A price times a factor in [0, 1] always fits
        self.scale_bps(kept as u32).unwrap_or(*self)
    }

    fn scale_bps(&self, bps: u32) -> Option<Money> {
        self.0
            .checked_mul(Decimal::from(bps))
            .and_then(|scaled| scaled.checked_div(Decimal::from(BPS_PER_UNIT)))
            .map(|amount| Money(amount.normalize()))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows "$12.34" / "-$0.50", rounded half up to the cent. Locale-aware
/// formatting belongs to the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.round_to_cent().0;
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        write!(f, "{}${}", sign, rounded.abs())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Lets line totals be folded with `.sum()`.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// SQLite has no decimal type: amounts are stored as TEXT ("50.9745") so
// they read back exactly as written.
#[cfg(feature = "sqlx")]
impl sqlx::Type<sqlx::Sqlite> for Money {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx")]
impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Money {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let text = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(text.parse()?)
    }
}

#[cfg(feature = "sqlx")]
impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode(self.0.to_string(), buf)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
