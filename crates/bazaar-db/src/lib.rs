//! # bazaar-db: Ledger Store for the Bazaar storefront
//!
//! SQLite persistence for the consistency engine, using sqlx. Everything
//! that must stay true across concurrent requests is enforced here, inside
//! scoped write transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Bazaar Data Flow                               │
//! │                                                                         │
//! │  Request handler (checkout, add to cart, set default address)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bazaar-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐    │   │
//! │  │   │  Database   │   │  Repositories    │   │  Migrations  │    │   │
//! │  │   │  (pool.rs)  │   │                  │   │  (embedded)  │    │   │
//! │  │   │             │   │ AddressRepo      │   │              │    │   │
//! │  │   │ SqlitePool  │◄──│ ImageRepo        │   │ 001_initial  │    │   │
//! │  │   │ DbConfig    │   │ InventoryLedger  │   │              │    │   │
//! │  │   └─────────────┘   │ CartRepo         │   └──────────────┘    │   │
//! │  │         ▲           │ OrderRepo        │                       │   │
//! │  │         │           └────────┬─────────┘                       │   │
//! │  │         │                    ▼                                 │   │
//! │  │         └──────────── WriteScope (tx.rs)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on, single writer)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-based configuration
//! - [`migrations`] - Embedded database migrations
//! - [`tx`] - Serialized write scopes and deadlines
//! - [`error`] - Database error types and the caller-facing taxonomy
//! - [`repository`] - Address, image, inventory, cart, order and catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bazaar.db")).await?;
//!
//! let cart = db.carts().materialize(user_id).await?;
//! let receipt = db.orders().checkout(user_id, address_id, "card").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::ConfigError;
pub use error::{DbError, DbResult, ErrorKind};
pub use pool::{Database, DbConfig};
pub use tx::WriteScope;

// Repository re-exports for convenience
pub use repository::{
    AddressRepository, CartRepository, CatalogRepository, ImageRepository, InventoryLedger,
    OrderRepository,
};
