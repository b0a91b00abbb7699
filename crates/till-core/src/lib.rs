//! # till-core: Pure Business Logic for the Till Back Office
//!
//! This crate contains the domain model and every rule of the settlement
//! core that can be expressed without touching storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Till Back Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    till-engine                                  │   │
//! │  │   settle, save_cart, apply_adjustment, dashboard               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │   money   │  │ settlement │  │identifier│  │   │
//! │  │   │ Inventory │  │   Money   │  │ StateMachine│ │ TXN-/CART│  │   │
//! │  │   │Transaction│  │           │  │ Shortfalls │  │          │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Database Layer)                     │   │
//! │  │        SQLite queries, migrations, ledger, repositories         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (InventoryItem, Transaction, StockAdjustment, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation, run before any lock is taken
//! - [`identifier`] - Transaction and cart number generation
//! - [`settlement`] - Settlement state machine and stock availability check
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//!
//! let price = Money::from_cents(1000); // $10.00
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 2000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identifier;
pub mod money;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, StockShortfall, ValidationError};
pub use identifier::{IdentifierKind, IdentifierSource, RandomIdentifiers};
pub use money::Money;
pub use settlement::SettlementState;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single cart or sale.
///
/// ## Business Reason
/// Prevents runaway carts and bounds how many row locks one settlement holds.
pub const MAX_CART_ITEMS: usize = 100;

/// Number of entries in the best-sellers ranking.
pub const TOP_ITEMS_LIMIT: i64 = 5;
