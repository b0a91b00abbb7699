//! # Settlement Engine
//!
//! Turns a cart into a committed sale.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  settle(account_id, request)                                            │
//! │                                                                         │
//! │  DRAFT        validate request shape          (no lock, no connection) │
//! │    │          assign transaction number       (supplied or generated)  │
//! │    ▼                                                                    │
//! │  LOCKING      BEGIN IMMEDIATE                                          │
//! │    │          account / customer must exist                            │
//! │    │          lock each distinct item, ascending id                    │
//! │    ▼                                                                    │
//! │  VALIDATING   aggregate per item, compare with locked quantity ──────┐ │
//! │    │                                                                  │ │
//! │    ▼                                                                  ▼ │
//! │  COMMITTING   header + lines (request order)     REJECTED_INSUFFICIENT │
//! │    │          -quantity per line                 _STOCK (rollback)     │
//! │    │          lock customer, fold in total                             │
//! │    │          read back the receipt                                    │
//! │    ▼                                                                    │
//! │  COMMITTED    COMMIT, row locks released                               │
//! │                                                                         │
//! │  Any error after BEGIN ──► ROLLBACK ──► ABORTED                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lock order is global: inventory rows by ascending id, then the customer
//! row. Two settlements can share items without deadlocking.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use till_core::settlement::{check_availability, LockedStock};
use till_core::validation::{validate_reference, validate_settlement};
use till_core::{
    IdentifierKind, IdentifierSource, SettlementRequest, SettlementState, Transaction, TransactionDetail,
    TransactionItem, TransactionStatus,
};
use till_db::{Database, DbError, UnitOfWork};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::numbering::{with_identifier, AttemptError};

/// Commits sales against the inventory ledger.
#[derive(Clone)]
pub struct SettlementEngine {
    db: Database,
    ids: Arc<dyn IdentifierSource>,
    max_attempts: u32,
}

impl fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    pub fn new(db: Database, ids: Arc<dyn IdentifierSource>, max_attempts: u32) -> Self {
        SettlementEngine { db, ids, max_attempts }
    }

    /// Settles one sale for the acting account.
    ///
    /// Returns the persisted transaction with decorated lines, or:
    /// - `VALIDATION` for a malformed request (nothing locked)
    /// - `NOT_FOUND` for an unknown account, customer or item
    /// - `INSUFFICIENT_STOCK` listing every short item
    /// - `CONFLICT` when the number is taken (a supplied one is never replaced)
    /// - `INFRASTRUCTURE` for storage failures
    ///
    /// Every failure leaves stock, lines and customer aggregates untouched.
    pub async fn settle(&self, account_id: &str, request: SettlementRequest) -> EngineResult<TransactionDetail> {
        validate_reference("account_id", account_id)?;
        validate_settlement(&request)?;

        let request = &request;
        with_identifier(
            self.ids.as_ref(),
            IdentifierKind::Transaction,
            request.transaction_number.as_deref(),
            self.max_attempts,
            |number| self.attempt(account_id, request, number),
        )
        .await
    }

    /// One pass through the state machine under `number`.
    async fn attempt(
        &self,
        account_id: &str,
        request: &SettlementRequest,
        number: String,
    ) -> Result<TransactionDetail, AttemptError> {
        let mut state = SettlementState::Draft;
        let mut uow = self.db.begin().await?;

        match self.run(&mut uow, &mut state, account_id, request, &number).await {
            Ok(detail) => {
                if let Err(err) = uow.commit().await {
                    abort(&mut state);
                    return Err(err.into());
                }
                state.advance(SettlementState::Committed)?;

                info!(
                    transaction_number = %detail.transaction.transaction_number,
                    account_id = %account_id,
                    lines = detail.items.len(),
                    total_cents = detail.transaction.total_cents,
                    "Sale settled"
                );
                Ok(detail)
            }
            Err(err) => {
                abort(&mut state);
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed settlement also failed");
                }
                debug!(transaction_number = %number, final_state = ?state, "Settlement attempt ended without commit");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        uow: &mut UnitOfWork,
        state: &mut SettlementState,
        account_id: &str,
        request: &SettlementRequest,
        number: &str,
    ) -> Result<TransactionDetail, AttemptError> {
        let ledger = self.db.ledger();
        let customers = self.db.customers();

        // LOCKING
        state.advance(SettlementState::Locking)?;

        self.db.accounts().require(uow, account_id).await?;
        if let Some(customer_id) = &request.customer_id {
            customers.require(uow, customer_id).await?;
        }

        let item_ids: BTreeSet<&str> = request.items.iter().map(|line| line.item_id.as_str()).collect();
        let mut locked = Vec::with_capacity(item_ids.len());
        let mut selling_prices = HashMap::with_capacity(item_ids.len());
        for item_id in item_ids {
            let item = ledger.lock_for_update(uow, item_id).await?;
            selling_prices.insert(item.id.clone(), item.selling_price_cents);
            locked.push(LockedStock::from(&item));
        }

        // VALIDATING
        state.advance(SettlementState::Validating)?;

        let requested = request.items.iter().map(|line| (line.item_id.as_str(), line.quantity));
        if let Err(shortfalls) = check_availability(&locked, requested) {
            state.advance(SettlementState::RejectedInsufficientStock)?;
            warn!(
                account_id = %account_id,
                short_items = shortfalls.len(),
                "Sale rejected: insufficient stock"
            );
            return Err(EngineError::InsufficientStock { shortfalls }.into());
        }

        // COMMITTING
        state.advance(SettlementState::Committing)?;

        let date = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            transaction_number: number.to_string(),
            date,
            customer_id: request.customer_id.clone(),
            account_id: account_id.to_string(),
            payment_method: request.payment_method,
            subtotal_cents: request.subtotal_cents,
            tax_cents: request.tax_cents,
            discount_cents: request.discount_cents,
            total_cents: request.total_cents,
            status: TransactionStatus::Completed,
        };

        let mut lines = Vec::with_capacity(request.items.len());
        for (idx, line) in request.items.iter().enumerate() {
            let price_at_sale_cents = match line.price_at_sale_cents {
                Some(price) => price,
                None => *selling_prices
                    .get(&line.item_id)
                    .ok_or_else(|| DbError::not_found("InventoryItem", line.item_id.clone()))?,
            };
            lines.push(TransactionItem {
                id: Uuid::new_v4().to_string(),
                transaction_id: transaction.id.clone(),
                line_no: idx as i64 + 1,
                item_id: line.item_id.clone(),
                quantity: line.quantity,
                price_at_sale_cents,
            });
        }

        self.db
            .transactions()
            .insert(uow, &transaction, &lines)
            .await
            .map_err(|err| AttemptError::from_insert(IdentifierKind::Transaction, err))?;

        for line in &request.items {
            ledger.apply_delta(uow, &line.item_id, -line.quantity).await?;
        }

        if let Some(customer_id) = &request.customer_id {
            customers.lock_for_update(uow, customer_id).await?;
            customers
                .record_purchase(uow, customer_id, transaction.total_cents, date)
                .await?;
        }

        let detail = self
            .db
            .transactions()
            .detail_in(uow, &transaction.id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", transaction.id.clone()))?;

        Ok(detail)
    }
}

fn abort(state: &mut SettlementState) {
    if !state.is_terminal() {
        // Any non-terminal state may abort.
        let _ = state.advance(SettlementState::Aborted);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::{EngineError, ErrorCode};
    use crate::testing::{
        back_office, customer, file_db, memory_db, sale, scripted_back_office, stock, CASHIER, MANAGER,
    };
    use crate::BackOffice;
    use till_core::{LineRequest, PaymentMethod, TransactionStatus};

    #[tokio::test]
    async fn test_settle_records_lines_and_deducts_stock() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 10, 600, 1000).await;
        stock(db, "item-b", "SKU-B", 5, 300, 500).await;

        let detail = office
            .settle(
                CASHIER,
                sale(vec![LineRequest::new("item-b", 1), LineRequest::priced("item-a", 2, 900)], 2300),
            )
            .await
            .unwrap();

        assert!(detail.transaction.transaction_number.starts_with("TXN-"));
        assert_eq!(detail.transaction.status, TransactionStatus::Completed);
        assert_eq!(detail.account_name, "The cashier");
        assert_eq!(detail.customer_name, None);

        // Request order, current price unless one was supplied
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].item_id, "item-b");
        assert_eq!(detail.items[0].item_name, "Item SKU-B");
        assert_eq!(detail.items[0].price_at_sale_cents, 500);
        assert_eq!(detail.items[1].price_at_sale_cents, 900);

        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 8);
        assert_eq!(db.inventory().get("item-b").await.unwrap().quantity, 4);
        assert_eq!(db.row_locks().tracked(), 0);
    }

    #[tokio::test]
    async fn test_customer_aggregates_after_sale() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 10, 600, 1000).await;
        stock(db, "item-b", "SKU-B", 10, 300, 500).await;
        customer(db, "cust-1", 10_000, 3).await;

        let mut request = sale(vec![LineRequest::new("item-a", 2), LineRequest::new("item-b", 1)], 2500);
        request.customer_id = Some("cust-1".to_string());
        request.payment_method = PaymentMethod::MPesa;

        let detail = office.settle(CASHIER, request).await.unwrap();
        assert_eq!(detail.customer_name.as_deref(), Some("Customer cust-1"));

        let customer = db.customers().get("cust-1").await.unwrap();
        assert_eq!(customer.purchase_count, 4);
        assert_eq!(customer.total_spent_cents, 12_500);
        assert_eq!(customer.last_visit, Some(detail.transaction.date));

        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 8);
        assert_eq!(db.inventory().get("item-b").await.unwrap().quantity, 9);
    }

    #[tokio::test]
    async fn test_customer_aggregates_exact_after_many_sales() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 100, 600, 1000).await;
        customer(db, "cust-1", 0, 0).await;

        for n in 1..=5 {
            let mut request = sale(vec![LineRequest::new("item-a", 1)], n * 100);
            request.customer_id = Some("cust-1".to_string());
            office.settle(CASHIER, request).await.unwrap();
        }

        let customer = db.customers().get("cust-1").await.unwrap();
        assert_eq!(customer.purchase_count, 5);
        assert_eq!(customer.total_spent_cents, 1500);
    }

    #[tokio::test]
    async fn test_one_short_line_rolls_back_everything() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 10, 600, 1000).await;
        stock(db, "item-b", "SKU-B", 1, 300, 500).await;
        customer(db, "cust-1", 0, 0).await;

        let mut request = sale(vec![LineRequest::new("item-a", 2), LineRequest::new("item-b", 3)], 3500);
        request.customer_id = Some("cust-1".to_string());

        let err = office.settle(CASHIER, request).await.unwrap_err();
        match err {
            EngineError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].item_id, "item-b");
                assert_eq!(shortfalls[0].available, 1);
                assert_eq!(shortfalls[0].requested, 3);
                assert_eq!(shortfalls[0].shortfall, 2);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 10);
        assert_eq!(db.inventory().get("item-b").await.unwrap().quantity, 1);
        assert_eq!(db.transactions().count().await.unwrap(), 0);
        assert_eq!(db.transactions().count_items().await.unwrap(), 0);
        assert_eq!(db.customers().get("cust-1").await.unwrap().purchase_count, 0);
        assert_eq!(db.row_locks().tracked(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_checked_together() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-x", "SKU-X", 5, 100, 200).await;

        let err = office
            .settle(CASHIER, sale(vec![LineRequest::new("item-x", 3), LineRequest::new("item-x", 3)], 1200))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        let detail = office
            .settle(CASHIER, sale(vec![LineRequest::new("item-x", 2), LineRequest::new("item-x", 3)], 1000))
            .await
            .unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(db.inventory().get("item-x").await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_huge_duplicate_lines_are_a_shortfall() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-x", "SKU-X", 5, 100, 200).await;

        let lines = vec![LineRequest::new("item-x", i64::MAX), LineRequest::new("item-x", i64::MAX)];
        match office.settle(CASHIER, sale(lines, 1200)).await.unwrap_err() {
            EngineError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].available, 5);
                assert_eq!(shortfalls[0].requested, i64::MAX);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        assert_eq!(db.inventory().get("item-x").await.unwrap().quantity, 5);
        assert!(office.transactions_for_account(CASHIER, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_and_missing_references() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 10, 600, 1000).await;

        let err = office.settle(CASHIER, sale(vec![], 0)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let err = office
            .settle(CASHIER, sale(vec![LineRequest::new("item-a", 0)], 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let err = office
            .settle(CASHIER, sale(vec![LineRequest::new("item-a", 1)], -1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let err = office
            .settle(CASHIER, sale(vec![LineRequest::new("no-such-item", 1)], 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = office
            .settle("no-such-account", sale(vec![LineRequest::new("item-a", 1)], 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let mut request = sale(vec![LineRequest::new("item-a", 1)], 100);
        request.customer_id = Some("ghost".to_string());
        let err = office.settle(CASHIER, request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        assert_eq!(office.database().inventory().get("item-a").await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_generated_number_collision_is_retried() {
        let db = memory_db().await;
        stock(&db, "item-a", "SKU-A", 10, 600, 1000).await;
        let (office, ids) = scripted_back_office(db, &["TXN-1", "TXN-1", "TXN-2"]);

        let first = office
            .settle(CASHIER, sale(vec![LineRequest::new("item-a", 1)], 1000))
            .await
            .unwrap();
        assert_eq!(first.transaction.transaction_number, "TXN-1");

        let second = office
            .settle(MANAGER, sale(vec![LineRequest::new("item-a", 1)], 1000))
            .await
            .unwrap();
        assert_eq!(second.transaction.transaction_number, "TXN-2");
        assert_eq!(ids.issued(), 3);

        // The collided attempt left nothing behind
        let db = office.database();
        assert_eq!(db.transactions().count().await.unwrap(), 2);
        assert_eq!(db.transactions().count_items().await.unwrap(), 2);
        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_supplied_number_collision_conflicts_immediately() {
        let db = memory_db().await;
        stock(&db, "item-a", "SKU-A", 10, 600, 1000).await;
        let (office, ids) = scripted_back_office(db, &[]);

        let mut request = sale(vec![LineRequest::new("item-a", 1)], 1000);
        request.transaction_number = Some("TXN-FIXED-1".to_string());

        office.settle(CASHIER, request.clone()).await.unwrap();
        let err = office.settle(CASHIER, request).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(ids.issued(), 0);
        assert_eq!(office.database().transactions().count().await.unwrap(), 1);
        assert_eq!(office.database().inventory().get("item-a").await.unwrap().quantity, 9);
    }

    #[tokio::test]
    async fn test_receipt_can_be_fetched_by_id_and_number() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 10, 600, 1000).await;

        let detail = office
            .settle(CASHIER, sale(vec![LineRequest::new("item-a", 3)], 3000))
            .await
            .unwrap();

        let by_id = office.transaction(&detail.transaction.id).await.unwrap();
        assert_eq!(by_id.items, detail.items);

        let by_number = office
            .transaction_by_number(&detail.transaction.transaction_number)
            .await
            .unwrap();
        assert_eq!(by_number.transaction.id, detail.transaction.id);

        let listed = office.transactions_for_account(CASHIER, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(office.transactions_for_account(MANAGER, 10).await.unwrap().is_empty());

        let err = office.transaction("missing").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(dir.path()).await;
        stock(&db, "item-x", "SKU-X", 5, 100, 200).await;
        let office = BackOffice::new(db, 3);

        let first = {
            let office = office.clone();
            tokio::spawn(async move {
                office
                    .settle(CASHIER, sale(vec![LineRequest::new("item-x", 3)], 600))
                    .await
            })
        };
        let second = {
            let office = office.clone();
            tokio::spawn(async move {
                office
                    .settle(MANAGER, sale(vec![LineRequest::new("item-x", 3)], 600))
                    .await
            })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let committed = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.code() == ErrorCode::InsufficientStock))
            .count();

        assert_eq!(committed, 1);
        assert_eq!(rejected, 1);
        assert_eq!(office.database().inventory().get("item-x").await.unwrap().quantity, 2);
        assert_eq!(office.database().transactions().count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_sales_drain_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(dir.path()).await;
        stock(&db, "item-a", "SKU-A", 7, 100, 200).await;
        stock(&db, "item-b", "SKU-B", 50, 100, 200).await;
        let office = BackOffice::new(db, 3);

        let mut handles = Vec::new();
        for n in 0..12 {
            let office = office.clone();
            // Alternate line order so lock ordering is exercised
            let lines = if n % 2 == 0 {
                vec![LineRequest::new("item-a", 1), LineRequest::new("item-b", 1)]
            } else {
                vec![LineRequest::new("item-b", 1), LineRequest::new("item-a", 1)]
            };
            handles.push(tokio::spawn(async move { office.settle(CASHIER, sale(lines, 400)).await }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(e) => assert_eq!(e.code(), ErrorCode::InsufficientStock),
            }
        }

        let db = office.database();
        assert_eq!(committed, 7);
        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 0);
        assert_eq!(db.inventory().get("item-b").await.unwrap().quantity, 43);
    }
}
