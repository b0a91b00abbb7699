//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Request shape failures                         │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  till-engine errors                                                    │
//! │  └── EngineError      - What callers see (code + message + detail)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settlement::SettlementState;

// =============================================================================
// Stock Shortfall
// =============================================================================

/// One item that could not cover the requested quantity.
///
/// Returned to clients so they can correct the cart and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub item_id: String,
    pub sku: String,
    /// Quantity on hand when the row was locked.
    pub available: i64,
    /// Total quantity requested across all lines for this item.
    pub requested: i64,
    /// `requested - available`, always positive.
    pub shortfall: i64,
}

impl StockShortfall {
    pub fn new(item_id: impl Into<String>, sku: impl Into<String>, available: i64, requested: i64) -> Self {
        StockShortfall {
            item_id: item_id.into(),
            sku: sku.into(),
            available,
            requested,
            shortfall: requested - available,
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Inventory cannot cover the request.
    ///
    /// ## When This Occurs
    /// - Two cashiers race for the last units of an item
    /// - A subtractive stock adjustment exceeds the quantity on hand
    ///
    /// ## User Workflow
    /// ```text
    /// Settle cart (X: qty 3)
    ///      │
    ///      ▼
    /// Lock X: available=2
    ///      │
    ///      ▼
    /// InsufficientStock [{ sku: "X", available: 2, requested: 3, shortfall: 1 }]
    ///      │
    ///      ▼
    /// Client shows: "Only 2 X in stock"
    /// ```
    #[error("Insufficient stock for {} item(s)", shortfalls.len())]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// A settlement tried to move between states the machine does not allow.
    #[error("Illegal settlement transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: SettlementState,
        to: SettlementState,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a request doesn't meet requirements.
/// Always raised before any lock is taken.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Arithmetic on the value would leave the i64 range.
    #[error("{field} is too large")]
    TooLarge { field: String },

    /// Invalid format (e.g., invalid identifier).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
