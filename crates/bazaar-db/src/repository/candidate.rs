//! # Singleton Flag Maintainer
//!
//! Shared machinery for tables where each owner has exactly one flagged row:
//! `addresses.is_default` per user and `product_images.is_primary` per
//! product. The decisions come from [`bazaar_core::singleton`]; this module
//! applies them with SQL on a connection that belongs to an open
//! [`WriteScope`](crate::tx::WriteScope).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  claim(owner, id)                                                       │
//! │     UPDATE t SET flag = 0 WHERE owner = ?     (clear every sibling)     │
//! │     UPDATE t SET flag = 1 WHERE id = ?        (then set the target)     │
//! │                                                                         │
//! │  Two statements, in that order: the partial UNIQUE index on            │
//! │  (owner) WHERE flag = 1 is checked row by row and would reject a       │
//! │  single statement that sets before it clears.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::singleton::{self, FlagChange, PromotionMode};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Describes a table holding singleton-flag candidates.
pub trait CandidateTable {
    /// Entity name used in errors and logs.
    const ENTITY: &'static str;
    const TABLE: &'static str;
    const OWNER_COLUMN: &'static str;
    const FLAG_COLUMN: &'static str;
    const PROMOTION: PromotionMode;
}

/// Shipping addresses: one default per user.
pub struct AddressCandidates;

impl CandidateTable for AddressCandidates {
    const ENTITY: &'static str = "Address";
    const TABLE: &'static str = "addresses";
    const OWNER_COLUMN: &'static str = "user_id";
    const FLAG_COLUMN: &'static str = "is_default";
    const PROMOTION: PromotionMode = PromotionMode::Strict;
}

/// Product images: one primary per product.
pub struct ImageCandidates;

impl CandidateTable for ImageCandidates {
    const ENTITY: &'static str = "Image";
    const TABLE: &'static str = "product_images";
    const OWNER_COLUMN: &'static str = "product_id";
    const FLAG_COLUMN: &'static str = "is_primary";
    const PROMOTION: PromotionMode = PromotionMode::BestEffort;
}

/// Returns the candidate's flag, or `None` when `id` does not exist or
/// belongs to another owner.
pub async fn owned_flag<T: CandidateTable>(
    conn: &mut SqliteConnection,
    owner: i64,
    id: i64,
) -> DbResult<Option<bool>> {
    let sql = format!(
        "SELECT {flag} FROM {table} WHERE id = ?1 AND {owner} = ?2",
        flag = T::FLAG_COLUMN,
        table = T::TABLE,
        owner = T::OWNER_COLUMN,
    );

    let flag: Option<bool> = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(flag)
}

/// Number of candidates the owner currently has.
pub async fn count<T: CandidateTable>(conn: &mut SqliteConnection, owner: i64) -> DbResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {table} WHERE {owner} = ?1",
        table = T::TABLE,
        owner = T::OWNER_COLUMN,
    );

    let count: i64 = sqlx::query_scalar(&sql)
        .bind(owner)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

/// Moves the flag to `id`. The caller has already checked ownership.
async fn claim<T: CandidateTable>(conn: &mut SqliteConnection, owner: i64, id: i64) -> DbResult<()> {
    let clear = format!(
        "UPDATE {table} SET {flag} = 0 WHERE {owner} = ?1 AND {flag} = 1",
        table = T::TABLE,
        flag = T::FLAG_COLUMN,
        owner = T::OWNER_COLUMN,
    );
    sqlx::query(&clear).bind(owner).execute(&mut *conn).await?;

    let set = format!(
        "UPDATE {table} SET {flag} = 1 WHERE id = ?1 AND {owner} = ?2",
        table = T::TABLE,
        flag = T::FLAG_COLUMN,
        owner = T::OWNER_COLUMN,
    );
    let result = sqlx::query(&set).bind(id).bind(owner).execute(&mut *conn).await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(T::ENTITY, id));
    }

    debug!(entity = T::ENTITY, owner, id, "Flag claimed");
    Ok(())
}

/// Flags the owner's most recent candidate other than `excluding`.
///
/// Returns the promoted id, or `None` when no candidate is left.
async fn promote_latest<T: CandidateTable>(
    conn: &mut SqliteConnection,
    owner: i64,
    excluding: Option<i64>,
) -> DbResult<Option<i64>> {
    let sql = format!(
        "SELECT id FROM {table} WHERE {owner} = ?1 AND id != ?2",
        table = T::TABLE,
        owner = T::OWNER_COLUMN,
    );
    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(owner)
        .bind(excluding.unwrap_or(0))
        .fetch_all(&mut *conn)
        .await?;

    let Some(target) = singleton::promotion_target(ids) else {
        return Ok(None);
    };

    claim::<T>(conn, owner, target).await?;
    Ok(Some(target))
}

/// Makes `id` the owner's flagged candidate.
pub async fn set_flag<T: CandidateTable>(
    conn: &mut SqliteConnection,
    owner: i64,
    id: i64,
) -> DbResult<()> {
    if owned_flag::<T>(conn, owner, id).await?.is_none() {
        return Err(DbError::not_found(T::ENTITY, id));
    }

    claim::<T>(conn, owner, id).await
}

/// Settles the flag for a candidate inserted (unflagged) in this scope.
///
/// Returns whether the candidate ended up flagged.
pub async fn after_insert<T: CandidateTable>(
    conn: &mut SqliteConnection,
    owner: i64,
    id: i64,
    requested: bool,
) -> DbResult<bool> {
    let candidates = count::<T>(conn, owner).await?;
    let flagged = singleton::flag_on_create(requested, candidates);

    if flagged {
        claim::<T>(conn, owner, id).await?;
    }

    Ok(flagged)
}

/// Applies a requested flag value to an existing candidate.
///
/// Returns the candidate's flag afterwards.
pub async fn after_update<T: CandidateTable>(
    conn: &mut SqliteConnection,
    owner: i64,
    id: i64,
    requested: bool,
) -> DbResult<bool> {
    let current = owned_flag::<T>(conn, owner, id)
        .await?
        .ok_or_else(|| DbError::not_found(T::ENTITY, id))?;
    let candidates = count::<T>(conn, owner).await?;

    let change = singleton::flag_on_update(requested, current, candidates);
    match change {
        FlagChange::Claim => claim::<T>(conn, owner, id).await?,
        FlagChange::Release => {
            // Another candidate exists (count > 1), so this always promotes
            promote_latest::<T>(conn, owner, Some(id)).await?;
        }
        FlagChange::ForceKeep => {
            debug!(entity = T::ENTITY, owner, id, "Sole candidate keeps its flag");
        }
        FlagChange::Unchanged => {}
    }

    Ok(change.resulting_flag(current))
}

/// Restores the invariant after a candidate was deleted in this scope.
///
/// Returns the promoted candidate, if any. Under
/// [`PromotionMode::BestEffort`] a failed promotion is logged and reported
/// as `None`; the delete itself still stands.
pub async fn after_delete<T: CandidateTable>(
    conn: &mut SqliteConnection,
    owner: i64,
    was_flagged: bool,
) -> DbResult<Option<i64>> {
    let remaining = count::<T>(conn, owner).await?;
    if !singleton::needs_promotion(was_flagged, remaining) {
        return Ok(None);
    }

    match (T::PROMOTION, promote_latest::<T>(conn, owner, None).await) {
        (_, Ok(promoted)) => {
            debug!(entity = T::ENTITY, owner, ?promoted, "Promoted after delete");
            Ok(promoted)
        }
        (PromotionMode::Strict, Err(e)) => Err(e),
        (PromotionMode::BestEffort, Err(e)) => {
            warn!(
                entity = T::ENTITY,
                owner,
                error = %e,
                "Promotion after delete failed, owner left without a flagged candidate"
            );
            Ok(None)
        }
    }
}
