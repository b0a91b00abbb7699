//! # Adjustment Applier
//!
//! Manual stock corrections with a before/after audit row.
//!
//! ```text
//! apply(account, { item, REMOVAL, 4, "broken seal" })
//!   BEGIN IMMEDIATE
//!   lock item ─► previous = 10
//!   new = previous ± quantity        (+ ADDITION/RETURN, − everything else)
//!   new < 0 ? ─► ROLLBACK, INSUFFICIENT_STOCK
//!   INSERT stock_adjustments (previous 10, new 6)
//!   quantity += delta
//!   COMMIT
//! ```

use chrono::Utc;
use till_core::validation::{validate_adjustment, validate_reference};
use till_core::{AdjustmentRequest, StockAdjustment, StockShortfall, ValidationError};
use till_db::{Database, DbError, UnitOfWork};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AdjustmentApplier {
    db: Database,
}

impl AdjustmentApplier {
    pub fn new(db: Database) -> Self {
        AdjustmentApplier { db }
    }

    /// Applies one correction for the acting account and returns the audit
    /// row. A subtractive correction larger than the stock on hand is
    /// rejected with `INSUFFICIENT_STOCK` and nothing is written.
    pub async fn apply(&self, account_id: &str, request: AdjustmentRequest) -> EngineResult<StockAdjustment> {
        validate_reference("account_id", account_id)?;
        validate_adjustment(&request)?;

        let mut uow = self.db.begin().await?;
        match self.write(&mut uow, account_id, &request).await {
            Ok(adjustment) => {
                uow.commit().await?;
                info!(
                    item_id = %adjustment.item_id,
                    adjustment_type = ?adjustment.adjustment_type,
                    previous = adjustment.previous_quantity,
                    new = adjustment.new_quantity,
                    adjusted_by = %adjustment.adjusted_by,
                    "Stock adjusted"
                );
                Ok(adjustment)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed adjustment also failed");
                }
                Err(err)
            }
        }
    }

    async fn write(
        &self,
        uow: &mut UnitOfWork,
        account_id: &str,
        request: &AdjustmentRequest,
    ) -> EngineResult<StockAdjustment> {
        let ledger = self.db.ledger();

        let account = self.db.accounts().require(uow, account_id).await?;
        let item = ledger.lock_for_update(uow, &request.item_id).await?;

        let delta = request.adjustment_type.signed_delta(request.quantity);
        let new_quantity = item.quantity.checked_add(delta).ok_or_else(|| ValidationError::TooLarge {
            field: "quantity".to_string(),
        })?;
        if new_quantity < 0 {
            warn!(
                item_id = %item.id,
                available = item.quantity,
                requested = request.quantity,
                "Adjustment rejected: would drive stock negative"
            );
            return Err(EngineError::InsufficientStock {
                shortfalls: vec![StockShortfall::new(item.id, item.sku, item.quantity, request.quantity)],
            });
        }

        let adjustment = StockAdjustment {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            adjustment_type: request.adjustment_type,
            quantity: request.quantity,
            previous_quantity: item.quantity,
            new_quantity,
            reason: request.reason.trim().to_string(),
            adjusted_by: account.id,
            adjusted_date: Utc::now(),
        };

        self.db.adjustments().insert(uow, &adjustment).await?;

        let applied = ledger.apply_delta(uow, &item.id, delta).await?;
        if applied != new_quantity {
            // The row is locked; anything else means a writer bypassed the ledger.
            return Err(DbError::Internal(format!(
                "ledger drift on {}: expected {new_quantity}, found {applied}",
                item.id
            ))
            .into());
        }

        Ok(adjustment)
    }

    /// Every adjustment, newest first.
    pub async fn list(&self) -> EngineResult<Vec<StockAdjustment>> {
        Ok(self.db.adjustments().list().await?)
    }

    pub async fn list_for_item(&self, item_id: &str) -> EngineResult<Vec<StockAdjustment>> {
        Ok(self.db.adjustments().list_for_item(item_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{EngineError, ErrorCode};
    use crate::testing::{back_office, stock, CASHIER, MANAGER};
    use till_core::{AdjustmentRequest, AdjustmentType};

    fn adjust(item_id: &str, adjustment_type: AdjustmentType, quantity: i64) -> AdjustmentRequest {
        AdjustmentRequest {
            item_id: item_id.to_string(),
            adjustment_type,
            quantity,
            reason: "stock take".to_string(),
        }
    }

    #[tokio::test]
    async fn test_removal_records_snapshots() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 10, 600, 1000).await;

        let adjustment = office
            .apply_adjustment(MANAGER, adjust("item-a", AdjustmentType::Removal, 4))
            .await
            .unwrap();

        assert_eq!(adjustment.previous_quantity, 10);
        assert_eq!(adjustment.new_quantity, 6);
        assert_eq!(adjustment.adjusted_by, MANAGER);
        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 6);

        let stored = db.adjustments().get_by_id(&adjustment.id).await.unwrap().unwrap();
        assert_eq!(stored.previous_quantity, 10);
        assert_eq!(stored.new_quantity, 6);
        assert_eq!(stored.adjustment_type, AdjustmentType::Removal);
    }

    #[tokio::test]
    async fn test_additive_types_increase_stock() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 2, 600, 1000).await;

        office
            .apply_adjustment(CASHIER, adjust("item-a", AdjustmentType::Addition, 5))
            .await
            .unwrap();
        let ret = office
            .apply_adjustment(CASHIER, adjust("item-a", AdjustmentType::Return, 1))
            .await
            .unwrap();
        assert_eq!(ret.previous_quantity, 7);
        assert_eq!(ret.new_quantity, 8);

        let damage = office
            .apply_adjustment(CASHIER, adjust("item-a", AdjustmentType::Damage, 8))
            .await
            .unwrap();
        assert_eq!(damage.new_quantity, 0);
    }

    #[tokio::test]
    async fn test_negative_result_is_rejected() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 3, 600, 1000).await;

        let err = office
            .apply_adjustment(MANAGER, adjust("item-a", AdjustmentType::Disposal, 5))
            .await
            .unwrap_err();

        match err {
            EngineError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls[0].available, 3);
                assert_eq!(shortfalls[0].requested, 5);
                assert_eq!(shortfalls[0].shortfall, 2);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 3);
        assert!(office.adjustments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_addition_past_i64_is_rejected() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 5, 600, 1000).await;

        let err = office
            .apply_adjustment(MANAGER, adjust("item-a", AdjustmentType::Addition, i64::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 5);
        assert!(office.adjustments().await.unwrap().is_empty());

        // Removing everything that large still reads as a shortfall
        let err = office
            .apply_adjustment(MANAGER, adjust("item-a", AdjustmentType::Removal, i64::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 3, 600, 1000).await;

        let err = office
            .apply_adjustment(MANAGER, adjust("item-a", AdjustmentType::Addition, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let mut request = adjust("item-a", AdjustmentType::Addition, 1);
        request.reason = "   ".to_string();
        let err = office.apply_adjustment(MANAGER, request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let err = office
            .apply_adjustment(MANAGER, adjust("ghost", AdjustmentType::Addition, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = office
            .apply_adjustment("ghost", adjust("item-a", AdjustmentType::Addition, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_listing() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 3, 600, 1000).await;
        stock(db, "item-b", "SKU-B", 3, 600, 1000).await;

        office
            .apply_adjustment(MANAGER, adjust("item-a", AdjustmentType::Addition, 1))
            .await
            .unwrap();
        office
            .apply_adjustment(MANAGER, adjust("item-b", AdjustmentType::Transfer, 2))
            .await
            .unwrap();

        assert_eq!(office.adjustments().await.unwrap().len(), 2);
        let for_b = office.adjustments_for_item("item-b").await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].adjustment_type, AdjustmentType::Transfer);
    }
}
