//! # Repository Module
//!
//! Repositories for the storefront's persistent state.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Repositories by component                          │
//! │                                                                         │
//! │  Singleton Invariant Maintainer                                        │
//! │  ├── candidate  (shared flag machinery)                                │
//! │  ├── address    (one default per user, strict promotion)               │
//! │  └── image      (one primary per product, best-effort promotion)       │
//! │                                                                         │
//! │  Inventory Ledger          inventory                                   │
//! │  Cart Aggregator           cart                                        │
//! │  Cart-to-Order Converter   order                                       │
//! │                                                                         │
//! │  Supporting rows           catalog (users, products, colors, sizes)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-statement writes open a [`WriteScope`](crate::tx::WriteScope) and
//! run every statement on its connection. Plain reads go to the pool.

pub mod address;
pub mod candidate;
pub mod cart;
pub mod catalog;
pub mod image;
pub mod inventory;
pub mod order;

pub use address::AddressRepository;
pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use image::ImageRepository;
pub use inventory::InventoryLedger;
pub use order::OrderRepository;
