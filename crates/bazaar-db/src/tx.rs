//! # Write Scopes
//!
//! Every multi-step mutation in the engine runs inside a [`WriteScope`]:
//! one SQLite transaction that holds the database's writer lock from its
//! first statement until commit or rollback.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WriteScope::begin                                                     │
//! │     BEGIN                                                              │
//! │     UPDATE tx_gate ...          ◄── takes the writer lock now, waiting │
//! │                                     up to busy_timeout if another      │
//! │                                     scope holds it                     │
//! │  ...reads see a snapshot no other writer can change...                 │
//! │                                                                         │
//! │  scope.commit()  ──► COMMIT                                            │
//! │  any `?` / panic / deadline / dropped future ──► ROLLBACK (on drop)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Taking the lock with a write as the first statement matters: a deferred
//! transaction that reads first and writes later can fail with
//! `SQLITE_BUSY` instead of waiting, and its reads could be stale by the
//! time it writes.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::future::Future;
use std::time::Duration;
use tracing::{trace, warn};

use crate::error::{DbError, DbResult};

/// A serialized write transaction.
///
/// Dropping the scope without calling [`WriteScope::commit`] rolls back.
pub struct WriteScope {
    tx: Transaction<'static, Sqlite>,
    label: &'static str,
}

impl WriteScope {
    /// Opens a transaction and acquires the writer lock.
    pub async fn begin(pool: &SqlitePool, label: &'static str) -> DbResult<Self> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(format!("{label}: begin: {e}")))?;

        sqlx::query("UPDATE tx_gate SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::TransactionFailed(format!("{label}: writer lock: {e}")))?;

        trace!(scope = label, "Write scope opened");
        Ok(WriteScope { tx, label })
    }

    /// The connection every statement of the scope must run on.
    #[inline]
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Commits everything done in the scope.
    pub async fn commit(self) -> DbResult<()> {
        let label = self.label;
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(format!("{label}: commit: {e}")))?;
        trace!(scope = label, "Write scope committed");
        Ok(())
    }

    /// Rolls back explicitly. Equivalent to dropping the scope, but waits
    /// for the rollback to finish.
    pub async fn rollback(self) -> DbResult<()> {
        let label = self.label;
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(format!("{label}: rollback: {e}")))?;
        trace!(scope = label, "Write scope rolled back");
        Ok(())
    }
}

/// Runs `fut` with an upper bound on its duration.
///
/// When the deadline passes, `fut` is dropped. Any [`WriteScope`] it owned
/// is dropped with it, which rolls the transaction back.
pub async fn with_deadline<T, F>(deadline: Duration, label: &'static str, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(scope = label, ?deadline, "Deadline elapsed, rolling back");
            Err(DbError::TransactionFailed(format!(
                "{label}: deadline of {deadline:?} elapsed"
            )))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn generation(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT generation FROM tx_gate WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn user_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn insert_user(scope: &mut WriteScope) {
        sqlx::query(
            "INSERT INTO users (name, email, created_at, updated_at) \
             VALUES ('Ana', 'ana@example.com', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(scope.conn())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut scope = WriteScope::begin(db.pool(), "test").await.unwrap();
        insert_user(&mut scope).await;
        scope.commit().await.unwrap();

        assert_eq!(user_count(&db).await, 1);
        assert_eq!(generation(&db).await, 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut scope = WriteScope::begin(db.pool(), "test").await.unwrap();
            insert_user(&mut scope).await;
        }

        assert_eq!(user_count(&db).await, 0);
        assert_eq!(generation(&db).await, 0);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut scope = WriteScope::begin(db.pool(), "test").await.unwrap();
        insert_user(&mut scope).await;
        scope.rollback().await.unwrap();

        assert_eq!(user_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_deadline_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pool = db.pool().clone();

        let result: DbResult<()> = with_deadline(Duration::from_millis(50), "slow", async move {
            let mut scope = WriteScope::begin(&pool, "slow").await?;
            insert_user(&mut scope).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            scope.commit().await
        })
        .await;

        assert!(matches!(result, Err(DbError::TransactionFailed(_))));
        assert_eq!(user_count(&db).await, 0);
    }
}
