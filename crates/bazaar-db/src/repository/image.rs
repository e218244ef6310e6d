//! # Image Repository
//!
//! Product images, one of which is the product's primary image.
//!
//! Unlike addresses, re-flagging a survivor after the primary image is
//! deleted is best effort: if the promotion fails, the delete still commits
//! and the product shows no primary image until one is set.

use bazaar_core::validation::validate_image_url;
use bazaar_core::{ImageId, ProductId, ProductImage};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::candidate::{self, ImageCandidates};
use crate::error::{DbError, DbResult};
use crate::tx::WriteScope;

/// Repository for product images.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    pool: SqlitePool,
}

impl ImageRepository {
    /// Creates a new ImageRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ImageRepository { pool }
    }

    /// Attaches an image to a product. The product's first image is always
    /// primary.
    pub async fn create(
        &self,
        product_id: ProductId,
        image_url: &str,
        make_primary: bool,
    ) -> DbResult<ProductImage> {
        validate_image_url(image_url)?;

        let mut scope = WriteScope::begin(&self.pool, "image.create").await?;

        let product_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = ?1)")
                .bind(product_id)
                .fetch_one(scope.conn())
                .await?;
        if !product_exists {
            return Err(DbError::not_found("Product", product_id));
        }

        let id: ImageId = sqlx::query_scalar(
            r#"
            INSERT INTO product_images (product_id, image_url, is_primary, created_at)
            VALUES (?1, ?2, 0, ?3)
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(image_url.trim())
        .bind(Utc::now())
        .fetch_one(scope.conn())
        .await?;

        let is_primary =
            candidate::after_insert::<ImageCandidates>(scope.conn(), product_id, id, make_primary)
                .await?;

        let image = fetch_owned(scope.conn(), product_id, id).await?;
        scope.commit().await?;

        info!(product_id, image_id = id, is_primary, "Image added");
        Ok(image)
    }

    /// Deletes an image. Returns the image promoted to primary, if any.
    pub async fn delete(&self, product_id: ProductId, image_id: ImageId) -> DbResult<Option<ImageId>> {
        let mut scope = WriteScope::begin(&self.pool, "image.delete").await?;

        let was_primary = candidate::owned_flag::<ImageCandidates>(scope.conn(), product_id, image_id)
            .await?
            .ok_or_else(|| DbError::not_found("Image", image_id))?;

        sqlx::query("DELETE FROM product_images WHERE id = ?1 AND product_id = ?2")
            .bind(image_id)
            .bind(product_id)
            .execute(scope.conn())
            .await?;

        let promoted =
            candidate::after_delete::<ImageCandidates>(scope.conn(), product_id, was_primary).await?;

        scope.commit().await?;

        info!(product_id, image_id, ?promoted, "Image deleted");
        Ok(promoted)
    }

    /// Makes `image_id` the product's primary image.
    pub async fn set_primary(&self, product_id: ProductId, image_id: ImageId) -> DbResult<ProductImage> {
        let mut scope = WriteScope::begin(&self.pool, "image.set_primary").await?;

        candidate::set_flag::<ImageCandidates>(scope.conn(), product_id, image_id).await?;
        let image = fetch_owned(scope.conn(), product_id, image_id).await?;

        scope.commit().await?;
        Ok(image)
    }

    /// Lists a product's images, primary first.
    pub async fn list(&self, product_id: ProductId) -> DbResult<Vec<ProductImage>> {
        let images = sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT id, product_id, image_url, is_primary, created_at
            FROM product_images
            WHERE product_id = ?1
            ORDER BY is_primary DESC, id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    /// The product's primary image.
    pub async fn primary_for(&self, product_id: ProductId) -> DbResult<Option<ProductImage>> {
        let image = sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT id, product_id, image_url, is_primary, created_at
            FROM product_images
            WHERE product_id = ?1 AND is_primary = 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }
}

async fn fetch_owned(conn: &mut SqliteConnection, product_id: ProductId, image_id: ImageId) -> DbResult<ProductImage> {
    sqlx::query_as::<_, ProductImage>(
        r#"
        SELECT id, product_id, image_url, is_primary, created_at
        FROM product_images
        WHERE id = ?1 AND product_id = ?2
        "#,
    )
    .bind(image_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Image", image_id))
}

// =============================================================================
// Unit Tests
// =============================================================================
