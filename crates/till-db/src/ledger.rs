//! # Unit of Work & Inventory Ledger
//!
//! The explicit transactional boundary every write goes through, and the
//! ledger operations that run inside it.
//!
//! ## Lock Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UnitOfWork::begin                                                      │
//! │     │  pool.acquire() + BEGIN IMMEDIATE                                 │
//! │     │  (SQLite writer lock, waits up to busy_timeout)                   │
//! │     ▼                                                                   │
//! │  lock_for_update(item A) ─► RowLocks["inventory_items:A"]               │
//! │  lock_for_update(item B) ─► RowLocks["inventory_items:B"]  (ascending)  │
//! │  lock_customer(C)        ─► RowLocks["customers:C"]        (last)       │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  commit() / rollback()  ─► COMMIT/ROLLBACK, then drop every row guard   │
//! │                                                                         │
//! │  Dropped without finishing? The connection is closed instead of being   │
//! │  returned to the pool, which discards the open transaction.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row locks are only taken while the writer lock is held, and always in
//! the order items (ascending id) then customer. No two units of work can
//! wait on each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use till_core::InventoryItem;

// =============================================================================
// Row Locks
// =============================================================================

/// Process-wide table of exclusive row locks, keyed `table:id`.
///
/// Cloning shares the table. Idle entries are pruned when a unit of work
/// releases its guards.
#[derive(Debug, Clone, Default)]
pub struct RowLocks {
    slots: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        RowLocks::default()
    }

    /// Waits for the row lock on `key`.
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    fn prune(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    /// Number of rows currently tracked (held or awaited).
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// One write transaction: a dedicated connection inside `BEGIN IMMEDIATE`
/// plus the row locks taken so far.
///
/// Finish it exactly once with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
pub struct UnitOfWork {
    conn: PoolConnection<Sqlite>,
    locks: RowLocks,
    held: Vec<(String, OwnedMutexGuard<()>)>,
    finished: bool,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("held", &self.held.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>())
            .field("finished", &self.finished)
            .finish()
    }
}

impl UnitOfWork {
    /// Acquires a connection and takes the SQLite writer lock.
    pub async fn begin(pool: &SqlitePool, locks: RowLocks) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::TransactionFailed(format!("begin: {e}")))?;

        debug!("Unit of work started");

        Ok(UnitOfWork {
            conn,
            locks,
            held: Vec::new(),
            finished: false,
        })
    }

    /// The transaction's connection, for queries inside this unit of work.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Takes the exclusive lock on `table:id` for the rest of this unit of
    /// work. Re-locking a row already held is a no-op.
    pub async fn lock_row(&mut self, table: &str, id: &str) {
        let key = format!("{table}:{id}");
        if self.held.iter().any(|(held, _)| *held == key) {
            return;
        }
        let guard = self.locks.acquire(&key).await;
        debug!(row = %key, "Row locked");
        self.held.push((key, guard));
    }

    /// Whether this unit of work holds the lock on `table:id`.
    pub fn holds(&self, table: &str, id: &str) -> bool {
        let key = format!("{table}:{id}");
        self.held.iter().any(|(held, _)| *held == key)
    }

    /// Commits and releases every row lock.
    pub async fn commit(mut self) -> DbResult<()> {
        let result = sqlx::query("COMMIT").execute(&mut *self.conn).await;
        if result.is_err() {
            self.conn.close_on_drop();
        }
        self.finish();
        result.map_err(|e| DbError::TransactionFailed(format!("commit: {e}")))?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Rolls back every write and releases every row lock.
    pub async fn rollback(mut self) -> DbResult<()> {
        let result = sqlx::query("ROLLBACK").execute(&mut *self.conn).await;
        if result.is_err() {
            self.conn.close_on_drop();
        }
        self.finish();
        result.map_err(|e| DbError::TransactionFailed(format!("rollback: {e}")))?;
        debug!("Unit of work rolled back");
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
        self.held.clear();
        self.locks.prune();
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Unit of work dropped without commit or rollback, discarding connection");
            self.conn.close_on_drop();
            self.held.clear();
            self.locks.prune();
        }
    }
}

// =============================================================================
// Inventory Ledger
// =============================================================================

pub(crate) const INVENTORY_TABLE: &str = "inventory_items";

/// Per-item stock operations. Every call runs inside a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Locks the item row and reads it.
    ///
    /// The returned quantity stays authoritative until the unit of work
    /// ends: no other writer can change it in the meantime.
    pub async fn lock_for_update(&self, uow: &mut UnitOfWork, item_id: &str) -> DbResult<InventoryItem> {
        uow.lock_row(INVENTORY_TABLE, item_id).await;

        sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT id, sku, name, category_id, tax_id, quantity, unit,
                   min_stock, max_stock, unit_cost_cents, selling_price_cents,
                   created_at, updated_at
            FROM inventory_items
            WHERE id = ?1
            "#,
        )
        .bind(item_id)
        .fetch_optional(uow.conn())
        .await?
        .ok_or_else(|| DbError::not_found("InventoryItem", item_id))
    }

    /// Adds `delta` to the item's quantity and returns the new quantity.
    ///
    /// The row must already be locked by this unit of work.
    pub async fn apply_delta(&self, uow: &mut UnitOfWork, item_id: &str, delta: i64) -> DbResult<i64> {
        if !uow.holds(INVENTORY_TABLE, item_id) {
            return Err(DbError::TransactionFailed(format!(
                "delta on unlocked inventory row {item_id}"
            )));
        }

        let quantity: i64 = sqlx::query_scalar(
            r#"
            UPDATE inventory_items
            SET quantity = quantity + ?1, updated_at = ?2
            WHERE id = ?3
            RETURNING quantity
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(item_id)
        .fetch_optional(uow.conn())
        .await?
        .ok_or_else(|| DbError::not_found("InventoryItem", item_id))?;

        debug!(item_id = %item_id, delta, quantity, "Ledger delta applied");
        Ok(quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, memory_db};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_and_apply_delta() {
        let db = memory_db().await;
        db.inventory().insert(&item("a", "SKU-A", 10, 100, 150)).await.unwrap();

        let ledger = db.ledger();
        let mut uow = db.begin().await.unwrap();
        let locked = ledger.lock_for_update(&mut uow, "a").await.unwrap();
        assert_eq!(locked.quantity, 10);

        let after = ledger.apply_delta(&mut uow, "a", -4).await.unwrap();
        assert_eq!(after, 6);
        uow.commit().await.unwrap();

        assert_eq!(db.inventory().get("a").await.unwrap().quantity, 6);
        assert_eq!(db.row_locks().tracked(), 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_delta() {
        let db = memory_db().await;
        db.inventory().insert(&item("a", "SKU-A", 10, 100, 150)).await.unwrap();

        let ledger = db.ledger();
        let mut uow = db.begin().await.unwrap();
        ledger.lock_for_update(&mut uow, "a").await.unwrap();
        ledger.apply_delta(&mut uow, "a", 5).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(db.inventory().get("a").await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_delta_requires_lock() {
        let db = memory_db().await;
        db.inventory().insert(&item("a", "SKU-A", 10, 100, 150)).await.unwrap();

        let mut uow = db.begin().await.unwrap();
        let err = db.ledger().apply_delta(&mut uow, "a", -1).await.unwrap_err();
        assert!(matches!(err, DbError::TransactionFailed(_)));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let db = memory_db().await;
        let mut uow = db.begin().await.unwrap();
        let err = db.ledger().lock_for_update(&mut uow, "nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_quantity_cannot_go_negative() {
        let db = memory_db().await;
        db.inventory().insert(&item("a", "SKU-A", 1, 100, 150)).await.unwrap();

        let ledger = db.ledger();
        let mut uow = db.begin().await.unwrap();
        ledger.lock_for_update(&mut uow, "a").await.unwrap();
        let err = ledger.apply_delta(&mut uow, "a", -2).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::testing::file_db(dir.path()).await;
        db.inventory().insert(&item("a", "SKU-A", 10, 100, 150)).await.unwrap();

        {
            let ledger = db.ledger();
            let mut uow = db.begin().await.unwrap();
            ledger.lock_for_update(&mut uow, "a").await.unwrap();
            ledger.apply_delta(&mut uow, "a", -10).await.unwrap();
        }

        assert_eq!(db.row_locks().tracked(), 0);

        // Writer lock is free again and the delta never landed.
        let uow = tokio::time::timeout(Duration::from_secs(5), db.begin())
            .await
            .unwrap()
            .unwrap();
        uow.rollback().await.unwrap();
        assert_eq!(db.inventory().get("a").await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_holder() {
        let locks = RowLocks::new();
        let first = locks.acquire("inventory_items:x").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("inventory_items:x").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        locks.prune();
        assert_eq!(locks.tracked(), 0);
    }
}
