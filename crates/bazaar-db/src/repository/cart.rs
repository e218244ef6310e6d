//! # Cart Repository
//!
//! Cart lines and the cart aggregator.
//!
//! ## Pricing Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart row:     (user, product, color, size, quantity)    ← no price    │
//! │                         │                                               │
//! │  materialize:           ▼ joined with the product row as it is NOW     │
//! │                final_price = base × (1 − discount)                     │
//! │                line_total  = final_price × quantity                    │
//! │                         │                                               │
//! │                         ▼ CartTotals::compute(lines, policy)           │
//! │                subtotal, tax (10%), shipping (0), total                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A price change on a product shows up in every cart on its next read.

use bazaar_core::pricing::{final_price, line_total};
use bazaar_core::validation::validate_quantity;
use bazaar_core::{
    CartLine, CartLineId, CartTotals, CoreError, InventoryKey, LineView, MaterializedCart, Money,
    PricingPolicy, UserId, ValidationError,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::catalog::ensure_variant;
use crate::error::{DbError, DbResult};
use crate::tx::WriteScope;

/// A cart line joined with everything needed to show and price it.
#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    line_id: i64,
    product_id: i64,
    product_name: String,
    color_id: i64,
    color_name: String,
    color_hex: Option<String>,
    size_id: i64,
    size_name: String,
    image_url: Option<String>,
    quantity: i64,
    base_price_cents: i64,
    discount_bps: u32,
    in_stock: i64,
}

impl TryFrom<LineRow> for LineView {
    type Error = ValidationError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let base_price = Money::from_cents(row.base_price_cents);
        let unit = final_price(base_price, row.discount_bps);

        Ok(LineView {
            line_id: row.line_id,
            product_id: row.product_id,
            product_name: row.product_name,
            color_id: row.color_id,
            color_name: row.color_name,
            color_hex: row.color_hex,
            size_id: row.size_id,
            size_name: row.size_name,
            image_url: row.image_url,
            quantity: row.quantity,
            base_price,
            discount_bps: row.discount_bps,
            final_price: unit,
            line_total: line_total(unit, row.quantity)?,
            in_stock: row.in_stock,
            is_available: row.in_stock >= row.quantity,
        })
    }
}

/// Repository for carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
    pricing: PricingPolicy,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool, pricing: PricingPolicy) -> Self {
        CartRepository { pool, pricing }
    }

    /// Builds the priced view of a user's cart, newest line first.
    ///
    /// Lines whose stock ran out are still returned, flagged unavailable.
    pub async fn materialize(&self, user_id: UserId) -> DbResult<MaterializedCart> {
        let rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT
                c.id AS line_id,
                c.product_id,
                p.name AS product_name,
                c.color_id,
                pc.color_name,
                pc.color_hex,
                c.size_id,
                ps.size_name,
                (
                    SELECT pi.image_url FROM product_images pi
                    WHERE pi.product_id = c.product_id AND pi.is_primary = 1
                ) AS image_url,
                c.quantity,
                p.base_price_cents,
                p.discount_bps,
                COALESCE(inv.quantity, 0) AS in_stock
            FROM cart c
            JOIN products p ON p.id = c.product_id
            JOIN product_colors pc ON pc.id = c.color_id
            JOIN product_sizes ps ON ps.id = c.size_id
            LEFT JOIN product_inventory inv
                ON inv.product_id = c.product_id
                AND inv.color_id = c.color_id
                AND inv.size_id = c.size_id
            WHERE c.user_id = ?1
            ORDER BY c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(LineView::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let totals = CartTotals::compute(
            lines.iter().map(|l| (l.final_price, l.quantity)),
            &self.pricing,
        )?;

        debug!(user_id, lines = lines.len(), total = %totals.total, "Cart materialized");
        Ok(MaterializedCart { lines, totals })
    }

    /// Puts a variant in the cart. If the user already has a line for it,
    /// that line's quantity is replaced.
    pub async fn add_item(&self, user_id: UserId, key: InventoryKey, quantity: i64) -> DbResult<CartLine> {
        validate_quantity(quantity)?;

        let mut scope = WriteScope::begin(&self.pool, "cart.add_item").await?;

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)")
            .bind(user_id)
            .fetch_one(scope.conn())
            .await?;
        if !user_exists {
            return Err(DbError::not_found("User", user_id));
        }

        ensure_variant(scope.conn(), key).await?;
        ensure_in_stock(scope.conn(), key, quantity).await?;

        let now = Utc::now();
        let line = sqlx::query_as::<_, CartLine>(
            r#"
            INSERT INTO cart (user_id, product_id, color_id, size_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT (user_id, product_id, color_id, size_id)
            DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
            RETURNING id, user_id, product_id, color_id, size_id, quantity, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(key.product_id)
        .bind(key.color_id)
        .bind(key.size_id)
        .bind(quantity)
        .bind(now)
        .fetch_one(scope.conn())
        .await?;

        scope.commit().await?;

        debug!(user_id, line_id = line.id, %key, quantity, "Cart line saved");
        Ok(line)
    }

    /// Changes the quantity of one of the user's lines.
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: i64,
    ) -> DbResult<CartLine> {
        validate_quantity(quantity)?;

        let mut scope = WriteScope::begin(&self.pool, "cart.update_quantity").await?;

        let line = fetch_owned(scope.conn(), user_id, line_id).await?;
        ensure_in_stock(scope.conn(), line.key(), quantity).await?;

        let line = sqlx::query_as::<_, CartLine>(
            r#"
            UPDATE cart SET quantity = ?3, updated_at = ?4
            WHERE id = ?1 AND user_id = ?2
            RETURNING id, user_id, product_id, color_id, size_id, quantity, created_at, updated_at
            "#,
        )
        .bind(line.id)
        .bind(user_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(scope.conn())
        .await?;

        scope.commit().await?;
        Ok(line)
    }

    /// Removes one of the user's lines.
    pub async fn remove_line(&self, user_id: UserId, line_id: CartLineId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart WHERE id = ?1 AND user_id = ?2")
            .bind(line_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartLine", line_id));
        }

        Ok(())
    }

    /// Empties the user's cart. Returns how many lines were removed.
    pub async fn clear(&self, user_id: UserId) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of lines in the user's cart.
    pub async fn line_count(&self, user_id: UserId) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The user's raw lines, oldest first.
    pub async fn lines(&self, user_id: UserId) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, user_id, product_id, color_id, size_id, quantity, created_at, updated_at
            FROM cart
            WHERE user_id = ?1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

async fn fetch_owned(conn: &mut SqliteConnection, user_id: UserId, line_id: CartLineId) -> DbResult<CartLine> {
    sqlx::query_as::<_, CartLine>(
        r#"
        SELECT id, user_id, product_id, color_id, size_id, quantity, created_at, updated_at
        FROM cart
        WHERE id = ?1 AND user_id = ?2
        "#,
    )
    .bind(line_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("CartLine", line_id))
}

/// Refuses a cart quantity the matching inventory cell cannot cover right
/// now. Nothing is reserved; checkout re-checks.
async fn ensure_in_stock(conn: &mut SqliteConnection, key: InventoryKey, quantity: i64) -> DbResult<()> {
    let available: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(
            (SELECT quantity FROM product_inventory
             WHERE product_id = ?1 AND color_id = ?2 AND size_id = ?3),
            0
        )
        "#,
    )
    .bind(key.product_id)
    .bind(key.color_id)
    .bind(key.size_id)
    .fetch_one(&mut *conn)
    .await?;

    if available < quantity {
        return Err(DbError::Domain(CoreError::InsufficientStock {
            product_id: key.product_id,
            color_id: key.color_id,
            size_id: key.size_id,
            available,
            requested: quantity,
        }));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, ErrorKind};
    use bazaar_core::NewProduct;

    struct Fixture {
        db: Database,
        user: UserId,
        shirt: InventoryKey,
        hat: InventoryKey,
    }

    async fn variant(db: &Database, name: &str, base: i64, discount_bps: u32, stock: i64) -> InventoryKey {
        let product = db
            .catalog()
            .create_product(&NewProduct {
                name: name.to_string(),
                base_price_cents: base,
                discount_bps,
                ..Default::default()
            })
            .await
            .unwrap();
        let color = db.catalog().add_color(product.id, "Black", Some("#000000")).await.unwrap();
        let size = db.catalog().add_size(product.id, "M").await.unwrap();
        let key = InventoryKey::new(product.id, color.id, size.id);
        db.inventory().adjust(key, stock).await.unwrap();
        key
    }

    async fn setup() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.catalog().create_user("Ana", "ana@example.com").await.unwrap().id;
        let shirt = variant(&db, "Shirt", 10_000, 1_000, 10).await;
        let hat = variant(&db, "Hat", 5_000, 0, 10).await;
        Fixture { db, user, shirt, hat }
    }

    #[tokio::test]
    async fn test_totals_from_live_prices() {
        let f = setup().await;
        f.db.carts().add_item(f.user, f.shirt, 2).await.unwrap();
        f.db.carts().add_item(f.user, f.hat, 1).await.unwrap();

        let cart = f.db.carts().materialize(f.user).await.unwrap();

        assert_eq!(cart.totals.total_items, 3);
        assert_eq!(cart.totals.subtotal, Money::from_cents(23_000));
        assert_eq!(cart.totals.tax, Money::from_cents(2_300));
        assert!(cart.totals.shipping.is_zero());
        assert_eq!(cart.totals.total, Money::from_cents(25_300));

        // Newest line first
        assert_eq!(cart.lines[0].product_name, "Hat");
        assert_eq!(cart.lines[1].final_price, Money::from_cents(9_000));
        assert_eq!(cart.lines[1].line_total, Money::from_cents(18_000));
    }

    #[tokio::test]
    async fn test_totals_keep_fractional_cents() {
        let f = setup().await;
        // $19.99 at 15% off, qty 3
        let tee = variant(&f.db, "Tee", 1_999, 1_500, 10).await;
        f.db.carts().add_item(f.user, tee, 3).await.unwrap();

        let cart = f.db.carts().materialize(f.user).await.unwrap();
        let exact = |s: &str| s.parse::<Money>().unwrap();

        assert_eq!(cart.lines[0].final_price, exact("16.9915"));
        assert_eq!(cart.totals.subtotal, exact("50.9745"));
        assert_eq!(cart.totals.tax, exact("5.09745"));
        assert_eq!(cart.totals.total, exact("56.07195"));
    }

    #[tokio::test]
    async fn test_materialize_twice_is_identical() {
        let f = setup().await;
        f.db.carts().add_item(f.user, f.shirt, 2).await.unwrap();
        f.db.carts().add_item(f.user, f.hat, 1).await.unwrap();
        f.db.images().create(f.shirt.product_id, "https://cdn.test/shirt.jpg", false).await.unwrap();

        let first = f.db.carts().materialize(f.user).await.unwrap();
        let second = f.db.carts().materialize(f.user).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.totals, second.totals);
        assert_eq!(first.lines, second.lines);
    }

    #[tokio::test]
    async fn test_price_change_shows_on_next_read() {
        let f = setup().await;
        f.db.carts().add_item(f.user, f.shirt, 2).await.unwrap();
        f.db.carts().add_item(f.user, f.hat, 1).await.unwrap();

        f.db.catalog().update_pricing(f.shirt.product_id, 10_000, 2_000).await.unwrap();

        let cart = f.db.carts().materialize(f.user).await.unwrap();
        assert_eq!(cart.totals.subtotal, Money::from_cents(21_000));
        assert_eq!(cart.totals.tax, Money::from_cents(2_100));
        assert_eq!(cart.totals.total, Money::from_cents(23_100));
    }

    #[tokio::test]
    async fn test_empty_cart_totals_are_zero() {
        let f = setup().await;
        let cart = f.db.carts().materialize(f.user).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.totals, CartTotals::default());
    }

    #[tokio::test]
    async fn test_sold_out_line_is_flagged() {
        let f = setup().await;
        f.db.carts().add_item(f.user, f.shirt, 2).await.unwrap();
        f.db.inventory().adjust(f.shirt, 0).await.unwrap();

        let cart = f.db.carts().materialize(f.user).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].in_stock, 0);
        assert!(!cart.lines[0].is_available);
        // Still priced
        assert_eq!(cart.totals.subtotal, Money::from_cents(18_000));
    }

    #[tokio::test]
    async fn test_primary_image_on_line() {
        let f = setup().await;
        f.db.images().create(f.hat.product_id, "https://cdn.test/hat.jpg", false).await.unwrap();
        f.db.carts().add_item(f.user, f.hat, 1).await.unwrap();

        let cart = f.db.carts().materialize(f.user).await.unwrap();
        assert_eq!(cart.lines[0].image_url.as_deref(), Some("https://cdn.test/hat.jpg"));
    }

    #[tokio::test]
    async fn test_add_item_replaces_quantity() {
        let f = setup().await;
        let first = f.db.carts().add_item(f.user, f.shirt, 2).await.unwrap();
        let second = f.db.carts().add_item(f.user, f.shirt, 5).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(f.db.carts().line_count(f.user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_item_checks_stock_and_variant() {
        let f = setup().await;

        let err = f.db.carts().add_item(f.user, f.shirt, 11).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let mixed = InventoryKey::new(f.shirt.product_id, f.hat.color_id, f.shirt.size_id);
        let err = f.db.carts().add_item(f.user, mixed, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f.db.carts().add_item(f.user, f.shirt, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(f.db.carts().line_count(f.user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_remove_clear() {
        let f = setup().await;
        let line = f.db.carts().add_item(f.user, f.shirt, 1).await.unwrap();
        f.db.carts().add_item(f.user, f.hat, 1).await.unwrap();

        let updated = f.db.carts().update_quantity(f.user, line.id, 4).await.unwrap();
        assert_eq!(updated.quantity, 4);

        let err = f.db.carts().update_quantity(f.user, line.id, 50).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let other = f.db.catalog().create_user("Bo", "bo@example.com").await.unwrap().id;
        let err = f.db.carts().remove_line(other, line.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        f.db.carts().remove_line(f.user, line.id).await.unwrap();
        assert_eq!(f.db.carts().lines(f.user).await.unwrap().len(), 1);

        assert_eq!(f.db.carts().clear(f.user).await.unwrap(), 1);
        assert_eq!(f.db.carts().line_count(f.user).await.unwrap(), 0);
    }
}
