//! # till-engine: Settlement Orchestration for the Till Back Office
//!
//! Owns one unit of work per operation: settle a sale, park a cart, apply a
//! stock correction. Also builds the read-side dashboard.
//!
//! ## Module Organization
//! ```text
//! till_engine
//! ├── config      - BackOfficeConfig (till.toml + TILL_* overrides)
//! ├── error       - EngineError, ErrorCode, ErrorResponse
//! ├── settlement  - SettlementEngine (DRAFT → … → COMMITTED)
//! ├── cart        - CartStore (no locks, no stock effect)
//! ├── adjustment  - AdjustmentApplier (audited stock corrections)
//! ├── metrics     - MetricsAggregator (committed data only)
//! └── numbering   - identifier assignment and collision retry
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_engine::{BackOffice, BackOfficeConfig};
//!
//! let office = BackOffice::open(&BackOfficeConfig::load(None)?).await?;
//! let receipt = office.settle(&account_id, request).await?;
//! let report = office.dashboard(&account_id).await?;
//! ```

pub mod adjustment;
pub mod cart;
pub mod config;
pub mod error;
pub mod metrics;
mod numbering;
pub mod settlement;

#[cfg(test)]
pub(crate) mod testing;

pub use adjustment::AdjustmentApplier;
pub use cart::CartStore;
pub use config::{BackOfficeConfig, ConfigError};
pub use error::{EngineError, EngineResult, ErrorCode, ErrorResponse};
pub use metrics::MetricsAggregator;
pub use settlement::SettlementEngine;

use std::sync::Arc;

use chrono::Utc;
use till_core::{
    AccountStats, AdjustmentRequest, CartDetail, CartRequest, DashboardReport, IdentifierSource, InventoryItem,
    Money, RandomIdentifiers, SettlementRequest, StockAdjustment, StockMovement, Transaction, TransactionDetail,
};
use till_db::Database;
use tracing::info;

/// Every back-office operation over one database.
///
/// Cheap to clone; clones share the pool and the row-lock table.
#[derive(Debug, Clone)]
pub struct BackOffice {
    db: Database,
    settlement: SettlementEngine,
    carts: CartStore,
    adjustments: AdjustmentApplier,
    metrics: MetricsAggregator,
}

impl BackOffice {
    /// Opens (and migrates) the configured database.
    pub async fn open(config: &BackOfficeConfig) -> EngineResult<Self> {
        info!(path = %config.database.path.display(), "Opening back office");
        let db = Database::new(config.to_db_config()).await?;
        Ok(BackOffice::new(db, config.settlement.identifier_attempts))
    }

    /// Wires the components over `db` with random identifiers.
    pub fn new(db: Database, identifier_attempts: u32) -> Self {
        BackOffice::with_identifiers(db, Arc::new(RandomIdentifiers), identifier_attempts)
    }

    pub fn with_identifiers(db: Database, ids: Arc<dyn IdentifierSource>, identifier_attempts: u32) -> Self {
        BackOffice {
            settlement: SettlementEngine::new(db.clone(), ids.clone(), identifier_attempts),
            carts: CartStore::new(db.clone(), ids, identifier_attempts),
            adjustments: AdjustmentApplier::new(db.clone()),
            metrics: MetricsAggregator::new(db.clone()),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn settle(&self, account_id: &str, request: SettlementRequest) -> EngineResult<TransactionDetail> {
        self.settlement.settle(account_id, request).await
    }

    pub async fn save_cart(&self, account_id: &str, request: CartRequest) -> EngineResult<CartDetail> {
        self.carts.save(account_id, request).await
    }

    pub async fn apply_adjustment(&self, account_id: &str, request: AdjustmentRequest) -> EngineResult<StockAdjustment> {
        self.adjustments.apply(account_id, request).await
    }

    pub async fn delete_cart(&self, cart_id: &str) -> EngineResult<()> {
        self.carts.delete(cart_id).await
    }

    // =========================================================================
    // Reports
    // =========================================================================

    pub async fn dashboard(&self, account_id: &str) -> EngineResult<DashboardReport> {
        self.metrics.dashboard(account_id).await
    }

    /// The acting account's sales so far today (UTC).
    pub async fn account_daily_stats(&self, account_id: &str) -> EngineResult<AccountStats> {
        self.metrics.account_daily_stats(account_id, Utc::now()).await
    }

    /// Items at or below their minimum stock, emptiest first.
    pub async fn low_stock(&self) -> EngineResult<Vec<InventoryItem>> {
        Ok(self.db.inventory().list_low_stock().await?)
    }

    /// Sales and adjustments for one item, oldest first.
    pub async fn stock_movements(&self, item_id: &str) -> EngineResult<Vec<StockMovement>> {
        self.db.inventory().get(item_id).await?;
        Ok(self.db.inventory().movements(item_id).await?)
    }

    /// Total spent divided by purchase count, zero before the first purchase.
    pub async fn customer_average_spend(&self, customer_id: &str) -> EngineResult<Money> {
        Ok(self.db.customers().get(customer_id).await?.average_spend())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn transaction(&self, id: &str) -> EngineResult<TransactionDetail> {
        self.db
            .transactions()
            .get_detail(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", id))
    }

    pub async fn transaction_by_number(&self, number: &str) -> EngineResult<TransactionDetail> {
        self.db
            .transactions()
            .get_detail_by_number(number)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", number))
    }

    /// An account's most recent transactions, newest first.
    pub async fn transactions_for_account(&self, account_id: &str, limit: u32) -> EngineResult<Vec<Transaction>> {
        Ok(self.db.transactions().list_for_account(account_id, limit).await?)
    }

    pub async fn cart(&self, cart_id: &str) -> EngineResult<CartDetail> {
        self.carts.get(cart_id).await
    }

    pub async fn carts_for_account(&self, account_id: &str) -> EngineResult<Vec<CartDetail>> {
        self.carts.list_for_account(account_id).await
    }

    pub async fn adjustments(&self) -> EngineResult<Vec<StockAdjustment>> {
        self.adjustments.list().await
    }

    pub async fn adjustments_for_item(&self, item_id: &str) -> EngineResult<Vec<StockAdjustment>> {
        self.adjustments.list_for_item(item_id).await
    }
}
