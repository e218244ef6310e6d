//! # Domain Types
//!
//! Core domain types used throughout the storefront.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  User ──1:N──► Address (is_default: exactly one per user)              │
//! │   │                                                                     │
//! │   ├──1:N──► CartLine ──► (product, color, size), quantity, NO price    │
//! │   │                                                                     │
//! │   └──1:N──► Order ──1:N──► OrderLine (unit_price frozen at checkout)   │
//! │                                                                         │
//! │  Product ──1:N──► ProductImage (is_primary: exactly one per product)   │
//! │     │                                                                   │
//! │     ├──1:N──► ProductColor ─┐                                          │
//! │     └──1:N──► ProductSize ──┴──► InventoryCell (product, color, size)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Rows are keyed by SQLite integer ids. Ids only grow, so "most recently
//! created" means "highest id" wherever the engine needs an ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::pricing::{self, CartTotals};
use crate::status::{OrderStatus, PaymentStatus};

pub type UserId = i64;
pub type ProductId = i64;
pub type ColorId = i64;
pub type SizeId = i64;
pub type AddressId = i64;
pub type ImageId = i64;
pub type CartLineId = i64;
pub type OrderId = i64;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so the storefront's 10% sales tax is 1000 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Users & Addresses
// =============================================================================

/// A customer account. Credentials live outside this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A shipping address. Exactly one address per user carries `is_default`
/// whenever the user has any.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The editable part of an address. All seven fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A sellable product.
///
/// Prices are never copied into carts. Anything that needs "what does this
/// cost now" reads `base_price_cents` and `discount_bps` from this row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    /// List price in cents.
    pub base_price_cents: i64,
    /// Discount in basis points (1500 = 15% off).
    pub discount_bps: u32,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as Money.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// Price after discount, as charged today.
    pub fn final_price(&self) -> Money {
        pricing::final_price(self.base_price(), self.discount_bps)
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub base_price_cents: i64,
    pub discount_bps: u32,
    pub featured: bool,
}

/// A color variant dimension of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductColor {
    pub id: ColorId,
    pub product_id: ProductId,
    pub color_name: String,
    pub color_hex: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A size variant dimension of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductSize {
    pub id: SizeId,
    pub product_id: ProductId,
    pub size_name: String,
    pub created_at: DateTime<Utc>,
}

/// A product image. Exactly one image per product should carry
/// `is_primary`; see `PromotionMode::BestEffort` for where that can lapse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    pub image_url: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Identifies one inventory cell: a (product, color, size) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryKey {
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
}

impl InventoryKey {
    pub const fn new(product_id: ProductId, color_id: ColorId, size_id: SizeId) -> Self {
        InventoryKey {
            product_id,
            color_id,
            size_id,
        }
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "product {} / color {} / size {}",
            self.product_id, self.color_id, self.size_id
        )
    }
}

/// Stock on hand for one (product, color, size). Never negative.
///
/// A missing cell and a cell with `quantity = 0` mean the same thing to
/// every reader: nothing available.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryCell {
    pub id: i64,
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryCell {
    #[inline]
    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(self.product_id, self.color_id, self.size_id)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A line in a user's cart. Deliberately carries no price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    #[inline]
    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(self.product_id, self.color_id, self.size_id)
    }
}

/// One cart line as shown to the shopper, priced from the live product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub color_id: ColorId,
    pub color_name: String,
    pub color_hex: Option<String>,
    pub size_id: SizeId,
    pub size_name: String,
    /// Primary image, when the product has one.
    pub image_url: Option<String>,
    pub quantity: i64,
    pub base_price: Money,
    pub discount_bps: u32,
    pub final_price: Money,
    pub line_total: Money,
    /// Units in the matching inventory cell (0 when the cell is missing).
    pub in_stock: i64,
    /// Whether the cell currently covers the requested quantity.
    pub is_available: bool,
}

/// A fully priced cart: lines newest first plus derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedCart {
    pub lines: Vec<LineView>,
    pub totals: CartTotals,
}

impl MaterializedCart {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Orders
// =============================================================================

/// An immutable order header. Only the two status fields change after
/// checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: OrderId,
    /// Customer-facing reference (ORD-YYYYMMDD-XXXXXXXX).
    pub reference: String,
    pub user_id: UserId,
    pub address_id: AddressId,
    /// Exact sum of the frozen line totals.
    pub total: Money,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in an order.
/// Uses snapshot pattern: the unit price is frozen at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
    pub quantity: i64,
    /// Final price per unit at the moment of checkout.
    pub unit_price: Money,
}

impl OrderLine {
    /// `None` only for amounts no checkout could have produced.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul_quantity(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// What checkout hands back once the order is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub reference: String,
    pub total: Money,
    pub line_count: usize,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(base: i64, discount_bps: u32) -> Product {
        let now = Utc::now();
        Product {
            id: 1,
            name: "Linen Shirt".to_string(),
            description: None,
            category_id: None,
            base_price_cents: base,
            discount_bps,
            featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_default_tax_rate_is_ten_percent() {
        assert_eq!(TaxRate::default().bps(), 1_000);
        assert!((TaxRate::default().percentage() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_product_final_price() {
        assert_eq!(product(10_000, 1_000).final_price(), Money::from_cents(9_000));
        assert_eq!(product(5_000, 0).final_price(), Money::from_cents(5_000));
        assert_eq!(product(1_999, 1_500).final_price(), "16.9915".parse().unwrap());
    }

    #[test]
    fn test_order_line_total() {
        let line = OrderLine {
            id: 1,
            order_id: 1,
            product_id: 1,
            color_id: 1,
            size_id: 1,
            quantity: 2,
            unit_price: "16.9915".parse().unwrap(),
        };
        assert_eq!(line.line_total(), Some("33.983".parse().unwrap()));
    }

    #[test]
    fn test_inventory_key_display() {
        let key = InventoryKey::new(7, 2, 3);
        assert_eq!(key.to_string(), "product 7 / color 2 / size 3");
    }
}
