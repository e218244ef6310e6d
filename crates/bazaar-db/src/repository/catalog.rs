//! # Catalog Repository
//!
//! Users, categories, products and the two variant dimensions (color, size)
//! that inventory cells and cart lines are keyed by. Each write here is a
//! single statement; nothing in this module needs a write scope.

use bazaar_core::validation::{
    validate_color_hex, validate_discount_bps, validate_price_cents, validate_text,
};
use bazaar_core::{
    Category, InventoryKey, NewProduct, Product, ProductColor, ProductId, ProductSize, User,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for catalog and account rows.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Creates a user. Duplicate emails are rejected by the store.
    pub async fn create_user(&self, name: &str, email: &str) -> DbResult<User> {
        validate_text("name", name, 100)?;
        validate_text("email", email, 254)?;

        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(name.trim())
        .bind(email.trim())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", email.trim()),
            other => other,
        })?;

        debug!(id = user.id, "Created user");
        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, created_at, updated_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Deletes a user. Addresses and cart lines go with it; users with
    /// orders cannot be deleted.
    pub async fn delete_user(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    /// Creates a category. Names are unique.
    pub async fn create_category(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        validate_text("name", name, 100)?;

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description)
            VALUES (?1, ?2)
            RETURNING id, name, description
            "#,
        )
        .bind(name.trim())
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("category", name.trim()),
            other => other,
        })?;

        Ok(category)
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Creates a product.
    pub async fn create_product(&self, product: &NewProduct) -> DbResult<Product> {
        validate_text("name", &product.name, 200)?;
        validate_price_cents(product.base_price_cents)?;
        validate_discount_bps(product.discount_bps)?;

        let now = Utc::now();
        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                name, description, category_id,
                base_price_cents, discount_bps, featured,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING
                id, name, description, category_id,
                base_price_cents, discount_bps, featured,
                created_at, updated_at
            "#,
        )
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(product.category_id)
        .bind(product.base_price_cents)
        .bind(product.discount_bps)
        .bind(product.featured)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = created.id, price = %created.base_price(), "Created product");
        Ok(created)
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: ProductId) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, name, description, category_id,
                base_price_cents, discount_bps, featured,
                created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Changes a product's list price and discount.
    ///
    /// Carts pick the new price up on their next read; orders already
    /// placed keep the price they were checked out at.
    pub async fn update_pricing(
        &self,
        id: ProductId,
        base_price_cents: i64,
        discount_bps: u32,
    ) -> DbResult<()> {
        validate_price_cents(base_price_cents)?;
        validate_discount_bps(discount_bps)?;

        debug!(id, base_price_cents, discount_bps, "Updating product pricing");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET base_price_cents = ?2, discount_bps = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(base_price_cents)
        .bind(discount_bps)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deletes a product together with its images, variants, inventory and
    /// cart lines. Products that appear on an order cannot be deleted.
    pub async fn delete_product(&self, id: ProductId) -> DbResult<()> {
        debug!(id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts products (for diagnostics and the seed binary).
    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Variant dimensions
    // -------------------------------------------------------------------------

    /// Adds a color to a product.
    pub async fn add_color(
        &self,
        product_id: ProductId,
        color_name: &str,
        color_hex: Option<&str>,
    ) -> DbResult<ProductColor> {
        validate_text("color_name", color_name, 50)?;
        validate_color_hex(color_hex)?;

        let color = sqlx::query_as::<_, ProductColor>(
            r#"
            INSERT INTO product_colors (product_id, color_name, color_hex, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, product_id, color_name, color_hex, created_at
            "#,
        )
        .bind(product_id)
        .bind(color_name.trim())
        .bind(color_hex)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_product(e, product_id))?;

        Ok(color)
    }

    /// Adds a size to a product.
    pub async fn add_size(&self, product_id: ProductId, size_name: &str) -> DbResult<ProductSize> {
        validate_text("size_name", size_name, 20)?;

        let size = sqlx::query_as::<_, ProductSize>(
            r#"
            INSERT INTO product_sizes (product_id, size_name, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, product_id, size_name, created_at
            "#,
        )
        .bind(product_id)
        .bind(size_name.trim())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_product(e, product_id))?;

        Ok(size)
    }

    /// Removes a color. Its inventory cells and cart lines are removed with it.
    pub async fn delete_color(&self, product_id: ProductId, color_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM product_colors WHERE id = ?1 AND product_id = ?2")
            .bind(color_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Color", color_id));
        }

        Ok(())
    }

    /// Removes a size. Its inventory cells and cart lines are removed with it.
    pub async fn delete_size(&self, product_id: ProductId, size_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM product_sizes WHERE id = ?1 AND product_id = ?2")
            .bind(size_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Size", size_id));
        }

        Ok(())
    }

    /// Lists a product's colors.
    pub async fn colors(&self, product_id: ProductId) -> DbResult<Vec<ProductColor>> {
        let colors = sqlx::query_as::<_, ProductColor>(
            r#"
            SELECT id, product_id, color_name, color_hex, created_at
            FROM product_colors
            WHERE product_id = ?1
            ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(colors)
    }

    /// Lists a product's sizes.
    pub async fn sizes(&self, product_id: ProductId) -> DbResult<Vec<ProductSize>> {
        let sizes = sqlx::query_as::<_, ProductSize>(
            r#"
            SELECT id, product_id, size_name, created_at
            FROM product_sizes
            WHERE product_id = ?1
            ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sizes)
    }
}

fn missing_product(err: sqlx::Error, product_id: ProductId) -> DbError {
    match DbError::from(err) {
        DbError::ForeignKeyViolation { .. } => DbError::not_found("Product", product_id),
        other => other,
    }
}

/// Checks that the product exists and that the color and size belong to it.
///
/// Used by the inventory ledger and the cart before they touch a cell.
pub(crate) async fn ensure_variant(conn: &mut SqliteConnection, key: InventoryKey) -> DbResult<()> {
    let (product, color, size): (bool, bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS (SELECT 1 FROM products WHERE id = ?1),
            EXISTS (SELECT 1 FROM product_colors WHERE id = ?2 AND product_id = ?1),
            EXISTS (SELECT 1 FROM product_sizes WHERE id = ?3 AND product_id = ?1)
        "#,
    )
    .bind(key.product_id)
    .bind(key.color_id)
    .bind(key.size_id)
    .fetch_one(&mut *conn)
    .await?;

    if !product {
        return Err(DbError::not_found("Product", key.product_id));
    }
    if !color {
        return Err(DbError::not_found("Color", key.color_id));
    }
    if !size {
        return Err(DbError::not_found("Size", key.size_id));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
