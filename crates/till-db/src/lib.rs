//! # till-db: Database Layer for the Till Back Office
//!
//! SQLite storage via sqlx: the connection pool, embedded migrations, the
//! unit of work every write runs in, the inventory ledger and repositories.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Data Flow                                   │
//! │                                                                         │
//! │  till-engine (SettlementEngine, CartStore, AdjustmentApplier, ...)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌───────────────┐  ┌───────────────────┐  │   │
//! │  │   │   Database    │  │    ledger     │  │   Repositories    │  │   │
//! │  │   │   (pool.rs)   │  │               │  │                   │  │   │
//! │  │   │ SqlitePool    │─►│ UnitOfWork    │◄─│ transactions      │  │   │
//! │  │   │ RowLocks      │  │ RowLocks      │  │ carts, customers  │  │   │
//! │  │   │ migrations    │  │ Inventory-    │  │ adjustments       │  │   │
//! │  │   │               │  │ Ledger        │  │ metrics           │  │   │
//! │  │   └───────────────┘  └───────────────┘  └───────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//!
//! let ledger = db.ledger();
//! let mut uow = db.begin().await?;
//! let item = ledger.lock_for_update(&mut uow, &item_id).await?;
//! ledger.apply_delta(&mut uow, &item.id, -1).await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::{InventoryLedger, RowLocks, UnitOfWork};
pub use pool::{Database, DbConfig};

pub use repository::account::AccountRepository;
pub use repository::adjustment::AdjustmentRepository;
pub use repository::cart::CartRepository;
pub use repository::customer::CustomerRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::metrics::MetricsRepository;
pub use repository::transaction::TransactionRepository;
