//! # Repository Module
//!
//! Database repository implementations for the till back office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Kinds of Calls                                   │
//! │                                                                         │
//! │  Reads (&self.pool)              Writes (&mut UnitOfWork)               │
//! │  ─────────────────               ─────────────────────────              │
//! │  db.inventory().get(id)          db.transactions().insert(uow, ..)      │
//! │  db.transactions().get_detail()  db.carts().insert(uow, ..)             │
//! │  db.metrics().top_items(5)       db.adjustments().insert(uow, ..)       │
//! │                                  db.customers().record_purchase(uow,..) │
//! │                                                                         │
//! │  A write never opens its own transaction: the caller owns the unit of  │
//! │  work and decides when it commits.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - Items, low stock, movement history
//! - [`AccountRepository`](account::AccountRepository) - Staff accounts
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and purchase aggregates
//! - [`TransactionRepository`](transaction::TransactionRepository) - Committed sales
//! - [`CartRepository`](cart::CartRepository) - Saved carts
//! - [`AdjustmentRepository`](adjustment::AdjustmentRepository) - Stock adjustment audit rows
//! - [`MetricsRepository`](metrics::MetricsRepository) - Dashboard aggregates

pub mod account;
pub mod adjustment;
pub mod cart;
pub mod customer;
pub mod inventory;
pub mod metrics;
pub mod transaction;
