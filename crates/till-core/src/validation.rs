//! # Validation Module
//!
//! Request validation for the settlement core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Transport (outside this workspace)                           │
//! │  ├── Field renaming, deserialization                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Shape rules: non-empty carts, positive quantities, line cap       │
//! │  └── Runs BEFORE any lock is taken                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE transaction_number / cart_number                           │
//! │  ├── CHECK quantity >= 1                                               │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::types::{LineRequest, PaymentMethod, SettlementRequest};
//! use till_core::validation::validate_settlement;
//!
//! let req = SettlementRequest {
//!     customer_id: None,
//!     payment_method: PaymentMethod::Cash,
//!     items: vec![LineRequest::new("item-1", 2)],
//!     subtotal_cents: 2000,
//!     tax_cents: 0,
//!     discount_cents: 0,
//!     total_cents: 2000,
//!     transaction_number: None,
//! };
//! assert!(validate_settlement(&req).is_ok());
//! ```

use crate::error::ValidationError;
use crate::identifier::IdentifierKind;
use crate::types::{AdjustmentRequest, CartRequest, LineRequest, SettlementRequest};
use crate::MAX_CART_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted business identifier or reason string.
const MAX_IDENTIFIER_LEN: usize = 100;
const MAX_REASON_LEN: usize = 255;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates an id reference (`item_id`, `customer_id`, ...).
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity. Must be at least 1.
pub fn validate_quantity(field: &str, quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a money amount that must not be negative.
pub fn validate_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a caller-supplied transaction or cart number.
///
/// ## Rules
/// - Not empty, at most 100 characters
/// - Letters, digits and hyphens only
///
/// The prefix is not enforced so clients may replay numbers from older
/// tills.
pub fn validate_identifier(kind: IdentifierKind, value: &str) -> ValidationResult<()> {
    let field = kind.column();

    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates the line list shared by sales and carts.
///
/// ## Rules
/// - At least one line (an empty sale is rejected)
/// - At most [`MAX_CART_ITEMS`] lines
/// - Every line names an item and a positive quantity
/// - A supplied price is not negative
pub fn validate_lines(lines: &[LineRequest]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    for (idx, line) in lines.iter().enumerate() {
        validate_reference(&format!("items[{idx}].item_id"), &line.item_id)?;
        validate_quantity(&format!("items[{idx}].quantity"), line.quantity)?;
        if let Some(price) = line.price_at_sale_cents {
            validate_amount(&format!("items[{idx}].price_at_sale"), price)?;
        }
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a settlement request before any lock is taken.
pub fn validate_settlement(req: &SettlementRequest) -> ValidationResult<()> {
    validate_lines(&req.items)?;

    validate_amount("subtotal", req.subtotal_cents)?;
    validate_amount("tax", req.tax_cents)?;
    validate_amount("discount", req.discount_cents)?;
    validate_amount("total", req.total_cents)?;

    if let Some(customer_id) = &req.customer_id {
        validate_reference("customer_id", customer_id)?;
    }
    if let Some(number) = &req.transaction_number {
        validate_identifier(IdentifierKind::Transaction, number)?;
    }

    Ok(())
}

/// Validates a cart before it is parked.
pub fn validate_cart(req: &CartRequest) -> ValidationResult<()> {
    validate_lines(&req.items)?;

    validate_amount("subtotal", req.subtotal_cents)?;
    validate_amount("tax", req.tax_cents)?;
    validate_amount("discount", req.discount_cents)?;
    if let Some(total) = req.total_cents {
        validate_amount("total", total)?;
    }

    if let Some(customer_id) = &req.customer_id {
        validate_reference("customer_id", customer_id)?;
    }
    if let Some(number) = &req.cart_number {
        validate_identifier(IdentifierKind::Cart, number)?;
    }

    Ok(())
}

/// Validates a manual stock correction.
pub fn validate_adjustment(req: &AdjustmentRequest) -> ValidationResult<()> {
    validate_reference("item_id", &req.item_id)?;
    validate_quantity("quantity", req.quantity)?;

    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
