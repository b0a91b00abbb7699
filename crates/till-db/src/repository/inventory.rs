//! # Inventory Repository
//!
//! Reads over inventory items plus item registration.
//!
//! Stock quantity is never written here: every change goes through the
//! [`InventoryLedger`](crate::ledger::InventoryLedger) inside a unit of work,
//! and leaves a transaction item or a stock adjustment behind. That history
//! is what [`InventoryRepository::movements`] replays.
//!
//! ## Movement History
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transaction_items ─┐                                                  │
//! │   (SALE, -qty)      ├─► UNION ALL ─► ORDER BY occurred_at              │
//! │  stock_adjustments ─┘                                                  │
//! │   (ADJUSTMENT, new - previous, with snapshots)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::ledger::UnitOfWork;
use till_core::{InventoryItem, StockMovement};

const SELECT_ITEM: &str = r#"
    SELECT id, sku, name, category_id, tax_id, quantity, unit,
           min_stock, max_stock, unit_cost_cents, selling_price_cents,
           created_at, updated_at
    FROM inventory_items
"#;

/// Repository for inventory item reads.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets an item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(&format!("{SELECT_ITEM} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Gets an item by ID, or `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<InventoryItem> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryItem", id))
    }

    /// Reads an item inside `uow` without locking it, or `NotFound`.
    ///
    /// For paths that price or display an item but never move its stock.
    pub async fn require(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(&format!("{SELECT_ITEM} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(uow.conn())
            .await?
            .ok_or_else(|| DbError::not_found("InventoryItem", id))
    }

    /// Gets an item by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(&format!("{SELECT_ITEM} WHERE sku = ?1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Registers a new item with its opening quantity.
    pub async fn insert(&self, item: &InventoryItem) -> DbResult<()> {
        debug!(id = %item.id, sku = %item.sku, quantity = item.quantity, "Inserting inventory item");

        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, sku, name, category_id, tax_id, quantity, unit,
                min_stock, max_stock, unit_cost_cents, selling_price_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.category_id)
        .bind(&item.tax_id)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.min_stock)
        .bind(item.max_stock)
        .bind(item.unit_cost_cents)
        .bind(item.selling_price_cents)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Items at or below their minimum stock, emptiest first then by name.
    pub async fn list_low_stock(&self) -> DbResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "{SELECT_ITEM} WHERE quantity <= min_stock ORDER BY quantity ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Counts all items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Every sale and adjustment that touched `item_id`, oldest first.
    pub async fn movements(&self, item_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT t.date AS occurred_at,
                   'SALE' AS source,
                   t.transaction_number AS reference,
                   -ti.quantity AS delta,
                   NULL AS previous_quantity,
                   NULL AS new_quantity
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            WHERE ti.item_id = ?1

            UNION ALL

            SELECT adjusted_date AS occurred_at,
                   'ADJUSTMENT' AS source,
                   adjustment_type AS reference,
                   new_quantity - previous_quantity AS delta,
                   previous_quantity,
                   new_quantity
            FROM stock_adjustments
            WHERE item_id = ?1

            ORDER BY occurred_at ASC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{item, memory_db};

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = memory_db().await;
        db.inventory().insert(&item("a", "COKE-330", 24, 60, 100)).await.unwrap();

        let by_sku = db.inventory().get_by_sku("COKE-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, "a");
        assert_eq!(by_sku.quantity, 24);
        assert!(db.inventory().get_by_id("missing").await.unwrap().is_none());
        assert_eq!(db.inventory().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_unique_violation() {
        let db = memory_db().await;
        db.inventory().insert(&item("a", "COKE-330", 24, 60, 100)).await.unwrap();

        let err = db.inventory().insert(&item("b", "COKE-330", 1, 60, 100)).await.unwrap_err();
        assert!(err.is_unique_violation_on("sku"));
    }

    #[tokio::test]
    async fn test_low_stock_ordering() {
        let db = memory_db().await;
        // min_stock is 10 in the fixture
        db.inventory().insert(&item("a", "A", 10, 1, 2)).await.unwrap();
        db.inventory().insert(&item("b", "B", 3, 1, 2)).await.unwrap();
        db.inventory().insert(&item("c", "C", 50, 1, 2)).await.unwrap();

        let low: Vec<String> = db
            .inventory()
            .list_low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(low, vec!["b", "a"]);
    }
}
