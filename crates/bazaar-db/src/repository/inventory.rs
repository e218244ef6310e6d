//! # Inventory Ledger
//!
//! Stock on hand per (product, color, size). Quantities never go negative:
//! a reservation that asks for more than the cell holds fails and changes
//! nothing.
//!
//! ## Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve(conn, key, qty)          (conn belongs to an open WriteScope)  │
//! │     SELECT quantity               → missing cell counts as 0           │
//! │     quantity < qty?               → InsufficientStock                  │
//! │     UPDATE ... SET quantity = quantity - qty                            │
//! │            WHERE ... AND quantity >= qty                                │
//! │                                                                         │
//! │  The scope holds the writer lock, so nothing can move the cell between │
//! │  the read and the write; the guarded UPDATE and the CHECK constraint   │
//! │  back that up at the statement level.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::validation::{validate_reservation_quantity, validate_stock_level};
use bazaar_core::{CoreError, InventoryCell, InventoryKey, ProductId};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::catalog::ensure_variant;
use crate::error::{DbError, DbResult};
use crate::tx::WriteScope;

/// The inventory ledger.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Units available for `key`. A missing cell reads as 0.
    pub async fn check_available(&self, key: InventoryKey) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        available(&mut conn, key).await
    }

    /// Reserves `quantity` units on `conn`, which must belong to an open
    /// write scope. Returns the quantity left in the cell.
    ///
    /// Checkout calls this once per cart line; a failure on any line leaves
    /// the whole scope to be rolled back.
    pub async fn reserve(conn: &mut SqliteConnection, key: InventoryKey, quantity: i64) -> DbResult<i64> {
        validate_reservation_quantity(quantity)?;

        let on_hand = available(conn, key).await?;
        if on_hand < quantity {
            return Err(insufficient(key, on_hand, quantity));
        }

        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE product_inventory
            SET quantity = quantity - ?4, updated_at = ?5
            WHERE product_id = ?1 AND color_id = ?2 AND size_id = ?3 AND quantity >= ?4
            RETURNING quantity
            "#,
        )
        .bind(key.product_id)
        .bind(key.color_id)
        .bind(key.size_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        match remaining {
            Some(left) => {
                debug!(%key, quantity, left, "Stock reserved");
                Ok(left)
            }
            None => {
                warn!(%key, quantity, "Guarded decrement matched no row");
                Err(insufficient(key, available(conn, key).await?, quantity))
            }
        }
    }

    /// Reserves stock in a scope of its own.
    pub async fn reserve_inventory(&self, key: InventoryKey, quantity: i64) -> DbResult<i64> {
        let mut scope = WriteScope::begin(&self.pool, "inventory.reserve").await?;
        let left = Self::reserve(scope.conn(), key, quantity).await?;
        scope.commit().await?;
        Ok(left)
    }

    /// Returns `quantity` units to the cell (an order line given back).
    ///
    /// Unlike [`adjust`](Self::adjust), this never creates a cell.
    pub async fn release(&self, key: InventoryKey, quantity: i64) -> DbResult<i64> {
        validate_reservation_quantity(quantity)?;

        let mut scope = WriteScope::begin(&self.pool, "inventory.release").await?;

        let left: i64 = sqlx::query_scalar(
            r#"
            UPDATE product_inventory
            SET quantity = quantity + ?4, updated_at = ?5
            WHERE product_id = ?1 AND color_id = ?2 AND size_id = ?3
            RETURNING quantity
            "#,
        )
        .bind(key.product_id)
        .bind(key.color_id)
        .bind(key.size_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(scope.conn())
        .await?
        .ok_or_else(|| DbError::not_found("Inventory", key))?;

        scope.commit().await?;

        debug!(%key, quantity, left, "Stock released");
        Ok(left)
    }

    /// Sets the absolute stock level for `key` (restock or correction).
    ///
    /// Creates the cell on first use. The color and size must belong to the
    /// product.
    pub async fn adjust(&self, key: InventoryKey, quantity: i64) -> DbResult<InventoryCell> {
        validate_stock_level(quantity)?;

        let mut scope = WriteScope::begin(&self.pool, "inventory.adjust").await?;

        ensure_variant(scope.conn(), key).await?;

        let cell = sqlx::query_as::<_, InventoryCell>(
            r#"
            INSERT INTO product_inventory (product_id, color_id, size_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (product_id, color_id, size_id)
            DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
            RETURNING id, product_id, color_id, size_id, quantity, updated_at
            "#,
        )
        .bind(key.product_id)
        .bind(key.color_id)
        .bind(key.size_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(scope.conn())
        .await?;

        scope.commit().await?;

        info!(%key, quantity, "Stock level set");
        Ok(cell)
    }

    /// All cells of a product.
    pub async fn cells_for(&self, product_id: ProductId) -> DbResult<Vec<InventoryCell>> {
        let cells = sqlx::query_as::<_, InventoryCell>(
            r#"
            SELECT id, product_id, color_id, size_id, quantity, updated_at
            FROM product_inventory
            WHERE product_id = ?1
            ORDER BY color_id, size_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cells)
    }
}

async fn available(conn: &mut SqliteConnection, key: InventoryKey) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT quantity FROM product_inventory
        WHERE product_id = ?1 AND color_id = ?2 AND size_id = ?3
        "#,
    )
    .bind(key.product_id)
    .bind(key.color_id)
    .bind(key.size_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

fn insufficient(key: InventoryKey, available: i64, requested: i64) -> DbError {
    DbError::Domain(CoreError::InsufficientStock {
        product_id: key.product_id,
        color_id: key.color_id,
        size_id: key.size_id,
        available,
        requested,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, ErrorKind};
    use bazaar_core::NewProduct;

    async fn setup() -> (Database, InventoryKey) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .catalog()
            .create_product(&NewProduct {
                name: "Runner".to_string(),
                base_price_cents: 8_000,
                ..Default::default()
            })
            .await
            .unwrap();
        let red = db.catalog().add_color(product.id, "Red", Some("#CC0000")).await.unwrap();
        let m = db.catalog().add_size(product.id, "M").await.unwrap();
        (db, InventoryKey::new(product.id, red.id, m.id))
    }

    #[tokio::test]
    async fn test_missing_cell_reads_zero() {
        let (db, key) = setup().await;
        assert_eq!(db.inventory().check_available(key).await.unwrap(), 0);

        let err = db.inventory().reserve_inventory(key, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[tokio::test]
    async fn test_reserve_exact_then_refuse() {
        let (db, key) = setup().await;
        db.inventory().adjust(key, 3).await.unwrap();

        assert_eq!(db.inventory().reserve_inventory(key, 3).await.unwrap(), 0);
        assert_eq!(db.inventory().check_available(key).await.unwrap(), 0);

        let err = db.inventory().reserve_inventory(key, 1).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 0);
                assert_eq!(requested, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.inventory().check_available(key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_reservation_changes_nothing() {
        let (db, key) = setup().await;
        db.inventory().adjust(key, 2).await.unwrap();

        assert!(db.inventory().reserve_inventory(key, 5).await.is_err());
        assert_eq!(db.inventory().check_available(key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bulk_reservation_is_limited_by_stock_only() {
        let (db, key) = setup().await;
        db.inventory().adjust(key, 5_000).await.unwrap();

        assert_eq!(db.inventory().reserve_inventory(key, 1_500).await.unwrap(), 3_500);

        let err = db.inventory().reserve_inventory(key, 4_000).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        assert_eq!(db.inventory().release(key, 1_500).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_release_and_adjust() {
        let (db, key) = setup().await;

        let err = db.inventory().release(key, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        db.inventory().adjust(key, 5).await.unwrap();
        db.inventory().reserve_inventory(key, 2).await.unwrap();
        assert_eq!(db.inventory().release(key, 2).await.unwrap(), 5);

        let cell = db.inventory().adjust(key, 0).await.unwrap();
        assert_eq!(cell.quantity, 0);
        assert_eq!(cell.key(), key);
        assert_eq!(db.inventory().cells_for(key.product_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_validates() {
        let (db, key) = setup().await;

        let err = db.inventory().adjust(key, -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let bad_size = InventoryKey::new(key.product_id, key.color_id, key.size_id + 100);
        let err = db.inventory().adjust(bad_size, 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db.inventory().reserve_inventory(key, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
