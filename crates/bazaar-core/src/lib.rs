//! # bazaar-core: Pure Business Logic for the Bazaar storefront
//!
//! Every rule of the consistency engine that can be decided without the
//! database lives here as a pure function.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Request layer (HTTP, out of tree)               │   │
//! │  │     addresses ─► cart ─► checkout ─► order status updates       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  money  │ │ pricing │ │singleton │ │ status  │ │validate│  │   │
//! │  │   │  Money  │ │CartTotal│ │FlagChange│ │OrderStat│ │ fields │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  │     scoped transactions, ledger, cart aggregator, checkout      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain rows (Address, ProductImage, InventoryCell, Order, ...)
//! - [`money`] - Exact decimal Money type
//! - [`pricing`] - Final price, line totals and cart totals
//! - [`singleton`] - Default/primary flag decisions
//! - [`status`] - Order and payment status machines
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::money::Money;
//! use bazaar_core::pricing::final_price;
//!
//! // $100.00 with 10% off
//! let price = final_price(Money::from_cents(10_000), 1_000);
//! assert_eq!(price, Money::from_cents(9_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod singleton;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{CartTotals, PricingPolicy};
pub use singleton::{FlagChange, PromotionMode};
pub use status::{OrderStatus, PaymentStatus, StatusUpdate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Sales tax applied to cart subtotals unless configured otherwise (10%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1_000;

/// Flat shipping charge in cents unless configured otherwise.
pub const DEFAULT_SHIPPING_CENTS: i64 = 0;

/// Maximum quantity of a single cart line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest list price accepted for a product, in cents ($10,000,000).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Maximum length accepted for a payment method token ("card", "cod", ...).
pub const MAX_PAYMENT_METHOD_LEN: usize = 50;
