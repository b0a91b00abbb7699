//! # Engine Error Type
//!
//! The single error surface of the back office.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Back Office                        │
//! │                                                                         │
//! │  ValidationError ──────────────────────────────► VALIDATION             │
//! │  (before any lock)                               field + reason         │
//! │                                                                         │
//! │  check_availability / adjustment underflow ────► INSUFFICIENT_STOCK     │
//! │                                                  item, available,       │
//! │                                                  requested, shortfall   │
//! │                                                                         │
//! │  DbError::UniqueViolation (identifier) ────────► retried, then CONFLICT │
//! │  DbError::NotFound / ForeignKeyViolation ──────► NOT_FOUND              │
//! │  everything else ──────────────────────────────► INFRASTRUCTURE         │
//! │                                                  (logged, opaque text)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers that need a wire shape use [`ErrorResponse`]:
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for 1 item(s)",
//!   "shortfalls": [
//!     { "item_id": "…", "sku": "COKE-330", "available": 2, "requested": 3, "shortfall": 1 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use till_core::{CoreError, StockShortfall, ValidationError};
use till_db::DbError;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request, rejected before any lock (400)
    Validation,

    /// Stock cannot cover the request (409/422)
    InsufficientStock,

    /// Identifier already taken (409)
    Conflict,

    /// Referenced row does not exist (404)
    NotFound,

    /// Storage or programming failure (500)
    Infrastructure,
}

/// Errors returned by every back-office operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient stock for {} item(s)", shortfalls.len())]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// A unique business identifier is already in use.
    #[error("{field} '{value}' already exists")]
    Conflict { field: String, value: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Opaque to callers; the cause is logged where it is raised.
    #[error("{0}")]
    Infrastructure(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::Validation,
            EngineError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            EngineError::Conflict { .. } => ErrorCode::Conflict,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::Infrastructure(_) => ErrorCode::Infrastructure,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// The serializable form handed to clients.
    pub fn to_response(&self) -> ErrorResponse {
        let shortfalls = match self {
            EngineError::InsufficientStock { shortfalls } => shortfalls.clone(),
            _ => Vec::new(),
        };
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            shortfalls,
        }
    }
}

/// Wire shape of an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shortfalls: Vec<StockShortfall>,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        err.to_response()
    }
}

/// Converts database errors to engine errors.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => EngineError::Conflict { field, value },
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                EngineError::not_found("Reference", message)
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Check constraint violated inside unit of work: {}", message);
                EngineError::Infrastructure("Database constraint violated".to_string())
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                EngineError::Infrastructure("Database connection failed".to_string())
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                EngineError::Infrastructure("Database migration failed".to_string())
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                EngineError::Infrastructure("Database operation failed".to_string())
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                EngineError::Infrastructure("Database transaction failed".to_string())
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                EngineError::Infrastructure("Database pool exhausted".to_string())
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                EngineError::Infrastructure("Database operation failed".to_string())
            }
        }
    }
}

/// Converts core errors to engine errors.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock { shortfalls } => EngineError::InsufficientStock { shortfalls },
            CoreError::Validation(e) => EngineError::Validation(e),
            CoreError::IllegalTransition { from, to } => {
                tracing::error!(?from, ?to, "Illegal settlement transition");
                EngineError::Infrastructure("Settlement failed".to_string())
            }
        }
    }
}

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
