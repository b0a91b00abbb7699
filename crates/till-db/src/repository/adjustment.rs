//! # Stock Adjustment Repository
//!
//! Immutable audit rows for manual stock corrections. Inserted once inside
//! the adjustment's unit of work, never updated or deleted by this crate.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::ledger::UnitOfWork;
use till_core::StockAdjustment;

const SELECT_ADJUSTMENT: &str = r#"
    SELECT id, item_id, adjustment_type, quantity, previous_quantity, new_quantity,
           reason, adjusted_by, adjusted_date
    FROM stock_adjustments
"#;

/// Repository for stock adjustments.
#[derive(Debug, Clone)]
pub struct AdjustmentRepository {
    pool: SqlitePool,
}

impl AdjustmentRepository {
    /// Creates a new AdjustmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AdjustmentRepository { pool }
    }

    pub async fn insert(&self, uow: &mut UnitOfWork, adjustment: &StockAdjustment) -> DbResult<()> {
        debug!(
            id = %adjustment.id,
            item_id = %adjustment.item_id,
            adjustment_type = ?adjustment.adjustment_type,
            previous = adjustment.previous_quantity,
            new = adjustment.new_quantity,
            "Inserting stock adjustment"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                id, item_id, adjustment_type, quantity, previous_quantity, new_quantity,
                reason, adjusted_by, adjusted_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.item_id)
        .bind(adjustment.adjustment_type)
        .bind(adjustment.quantity)
        .bind(adjustment.previous_quantity)
        .bind(adjustment.new_quantity)
        .bind(&adjustment.reason)
        .bind(&adjustment.adjusted_by)
        .bind(adjustment.adjusted_date)
        .execute(uow.conn())
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockAdjustment>> {
        let adjustment = sqlx::query_as::<_, StockAdjustment>(&format!("{SELECT_ADJUSTMENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(adjustment)
    }

    /// All adjustments, newest first.
    pub async fn list(&self) -> DbResult<Vec<StockAdjustment>> {
        let adjustments = sqlx::query_as::<_, StockAdjustment>(&format!(
            "{SELECT_ADJUSTMENT} ORDER BY adjusted_date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(adjustments)
    }

    /// Adjustments for one item, newest first.
    pub async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let adjustments = sqlx::query_as::<_, StockAdjustment>(&format!(
            "{SELECT_ADJUSTMENT} WHERE item_id = ?1 ORDER BY adjusted_date DESC, id DESC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(adjustments)
    }
}
