//! # Domain Types
//!
//! Core domain types used throughout the till back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ InventoryItem   │   │  Transaction    │   │ TransactionItem │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  id (UUID)      │◄──│  transaction_id │       │
//! │  │  sku (business) │   │  txn number     │   │  item_id        │       │
//! │  │  quantity       │   │  account_id     │   │  quantity       │       │
//! │  │  selling_price  │   │  total_cents    │   │  price_at_sale  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │          ▲                                                              │
//! │          │             ┌─────────────────┐   ┌─────────────────┐       │
//! │          └─────────────│ StockAdjustment │   │   SavedCart     │       │
//! │                        │  previous_qty   │   │  cart_number    │       │
//! │                        │  new_qty        │   │  (no stock      │       │
//! │                        └─────────────────┘   │   effect)       │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, transaction_number, cart_number) - human-readable, unique

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Inventory Item
// =============================================================================

/// A stocked item. Its `quantity` is the ledger balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Category reference.
    pub category_id: String,

    /// Optional tax-rate reference.
    pub tax_id: Option<String>,

    /// Units on hand. Never negative after a committed sale or adjustment.
    pub quantity: i64,

    /// Display unit ("Bottles", "Tablets").
    pub unit: String,

    /// Low-stock threshold (advisory).
    pub min_stock: i64,

    /// Restock ceiling (advisory).
    pub max_stock: i64,

    /// Cost in cents, used for valuation and gross profit.
    pub unit_cost_cents: i64,

    /// Current selling price in cents.
    pub selling_price_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// At or below the minimum stock threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

// =============================================================================
// Accounts & Customers
// =============================================================================

/// Staff role. Authorization policy lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRole {
    Admin,
    Cashier,
    Manager,
}

/// A staff account. Every sale, cart and adjustment names one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
}

/// A customer and the aggregates settlement maintains for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,

    /// Σ total of committed transactions naming this customer.
    pub total_spent_cents: i64,

    /// Number of committed transactions naming this customer.
    pub purchase_count: i64,

    /// Date of the most recent committed transaction.
    pub last_visit: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }

    /// Lifetime spend divided by purchase count. Zero before the first purchase.
    pub fn average_spend(&self) -> Money {
        self.total_spent().average_over(self.purchase_count)
    }
}

// =============================================================================
// Payment Method & Transaction Status
// =============================================================================

/// How a transaction was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum PaymentMethod {
    #[serde(rename = "M-PESA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "M-PESA"))]
    MPesa,
    #[serde(rename = "ECOCASH")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ECOCASH"))]
    EcoCash,
    #[serde(rename = "CASH")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CASH"))]
    Cash,
    #[serde(rename = "CREDIT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CREDIT"))]
    Credit,
    #[serde(rename = "EFT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "EFT"))]
    Eft,
}

/// The status of a committed transaction.
///
/// Settlement only ever writes `Completed`. The other states exist for
/// refunds and layaways, which are separate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Completed,
    Refunded,
    Pending,
}

// =============================================================================
// Transaction
// =============================================================================

/// A committed sale header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: String,

    /// Human-readable number (`TXN-yyyymmddHHMMSS-nnnn`), unique and immutable.
    pub transaction_number: String,

    /// Commit timestamp.
    pub date: DateTime<Utc>,

    pub customer_id: Option<String>,

    /// Cashier who rang the sale.
    pub account_id: String,

    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub status: TransactionStatus,
}

impl Transaction {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One line of a committed sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,

    /// Position in the request, starting at 1.
    pub line_no: i64,

    pub item_id: String,
    pub quantity: i64,

    /// Unit price frozen at commit time.
    pub price_at_sale_cents: i64,
}

impl TransactionItem {
    /// `price_at_sale × quantity`.
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_at_sale_cents).multiply_quantity(self.quantity)
    }
}

/// A transaction line joined with the item's name and SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionLine {
    pub id: String,
    pub line_no: i64,
    pub item_id: String,
    pub item_name: String,
    pub sku: String,
    pub quantity: i64,
    pub price_at_sale_cents: i64,
}

/// Receipt returned after settlement, and by transaction lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub customer_name: Option<String>,
    pub account_name: String,
    pub items: Vec<TransactionLine>,
}

// =============================================================================
// Saved Cart
// =============================================================================

/// A parked sale. Reserves nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SavedCart {
    pub id: String,
    pub cart_number: String,
    pub saved_date: DateTime<Utc>,
    pub customer_id: Option<String>,
    pub account_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    /// Caller-supplied, or estimated from selling prices at save time.
    pub total_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SavedCartItem {
    pub id: String,
    pub cart_id: String,
    pub line_no: i64,
    pub item_id: String,
    pub quantity: i64,
}

/// A cart line joined with the item's name, SKU and current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: String,
    pub line_no: i64,
    pub item_id: String,
    pub item_name: String,
    pub sku: String,
    pub quantity: i64,
    pub selling_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartDetail {
    #[serde(flatten)]
    pub cart: SavedCart,
    pub customer_name: Option<String>,
    pub account_name: String,
    pub items: Vec<CartLine>,
}

// =============================================================================
// Stock Adjustment
// =============================================================================

/// Why stock was corrected by hand. The type fixes the sign of the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    Addition,
    Removal,
    Damage,
    Transfer,
    Return,
    Disposal,
}

impl AdjustmentType {
    /// ADDITION and RETURN add stock; everything else removes it.
    pub const fn is_additive(&self) -> bool {
        matches!(self, AdjustmentType::Addition | AdjustmentType::Return)
    }

    /// Signed ledger delta for a positive `magnitude`.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::types::AdjustmentType;
    ///
    /// assert_eq!(AdjustmentType::Return.signed_delta(4), 4);
    /// assert_eq!(AdjustmentType::Damage.signed_delta(4), -4);
    /// ```
    pub const fn signed_delta(&self, magnitude: i64) -> i64 {
        if self.is_additive() {
            magnitude
        } else {
            -magnitude
        }
    }
}

/// Immutable audit row for one manual correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockAdjustment {
    pub id: String,
    pub item_id: String,
    pub adjustment_type: AdjustmentType,

    /// Positive magnitude; `adjustment_type` decides the sign.
    pub quantity: i64,

    /// Quantity on hand immediately before the adjustment.
    pub previous_quantity: i64,

    /// `previous_quantity ± quantity`.
    pub new_quantity: i64,

    pub reason: String,
    pub adjusted_by: String,
    pub adjusted_date: DateTime<Utc>,
}

// =============================================================================
// Stock Movements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementSource {
    Sale,
    Adjustment,
}

/// One change to an item's quantity, from either ledger path.
///
/// Sales carry only the delta; adjustments also carry their snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub occurred_at: DateTime<Utc>,
    pub source: MovementSource,
    /// Transaction number for sales, adjustment type for adjustments.
    pub reference: String,
    pub delta: i64,
    pub previous_quantity: Option<i64>,
    pub new_quantity: Option<i64>,
}

// =============================================================================
// Requests
// =============================================================================

/// One requested line. `price_at_sale_cents` defaults to the selling price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub item_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub price_at_sale_cents: Option<i64>,
}

impl LineRequest {
    pub fn new(item_id: impl Into<String>, quantity: i64) -> Self {
        LineRequest {
            item_id: item_id.into(),
            quantity,
            price_at_sale_cents: None,
        }
    }

    pub fn priced(item_id: impl Into<String>, quantity: i64, price_at_sale_cents: i64) -> Self {
        LineRequest {
            item_id: item_id.into(),
            quantity,
            price_at_sale_cents: Some(price_at_sale_cents),
        }
    }
}

/// A cart to be settled into a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineRequest>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Used verbatim when present; never regenerated.
    #[serde(default)]
    pub transaction_number: Option<String>,
}

/// A cart to be parked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub subtotal_cents: i64,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    /// Estimated from selling prices when absent.
    #[serde(default)]
    pub total_cents: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cart_number: Option<String>,
}

/// A manual stock correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub item_id: String,
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub reason: String,
}

// =============================================================================
// Reports
// =============================================================================

/// Revenue and count of completed transactions in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesFigures {
    pub revenue_cents: i64,
    pub transaction_count: i64,
}

/// One account's completed sales in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub revenue_cents: i64,
    pub transaction_count: i64,
    pub items_sold: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryValuation {
    /// Σ quantity × unit_cost.
    pub current_value_at_cost_cents: i64,
    /// Σ quantity × selling_price.
    pub potential_revenue_cents: i64,
    /// Items with `quantity <= min_stock`.
    pub low_stock_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeSummary {
    pub total_sales_cents: i64,
    pub total_customers: i64,
    pub total_transactions: i64,
    /// Σ (price_at_sale − unit_cost) × quantity.
    pub gross_profit_cents: i64,
}

/// A best seller, ranked by quantity sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TopItem {
    pub item_id: String,
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

/// The dashboard, recomputed from committed data on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub today: SalesFigures,
    pub my_contribution: AccountStats,
    pub inventory: InventoryValuation,
    pub summary: LifetimeSummary,
    pub top_items: Vec<TopItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(total_spent_cents: i64, purchase_count: i64) -> Customer {
        Customer {
            id: "c".to_string(),
            name: "Wanjiru".to_string(),
            email: None,
            phone: None,
            total_spent_cents,
            purchase_count,
            last_visit: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_adjustment_signs() {
        for t in [AdjustmentType::Addition, AdjustmentType::Return] {
            assert!(t.is_additive());
            assert_eq!(t.signed_delta(3), 3);
        }
        for t in [
            AdjustmentType::Removal,
            AdjustmentType::Damage,
            AdjustmentType::Transfer,
            AdjustmentType::Disposal,
        ] {
            assert!(!t.is_additive());
            assert_eq!(t.signed_delta(3), -3);
        }
    }

    #[test]
    fn test_average_spend() {
        assert_eq!(customer(12500, 4).average_spend().cents(), 3125);
        assert_eq!(customer(0, 0).average_spend().cents(), 0);
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::MPesa).unwrap(), "\"M-PESA\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::Eft).unwrap(), "\"EFT\"");
        let parsed: PaymentMethod = serde_json::from_str("\"ECOCASH\"").unwrap();
        assert_eq!(parsed, PaymentMethod::EcoCash);
    }

    #[test]
    fn test_line_total() {
        let line = TransactionItem {
            id: "l".to_string(),
            transaction_id: "t".to_string(),
            line_no: 0,
            item_id: "a".to_string(),
            quantity: 2,
            price_at_sale_cents: 1000,
        };
        assert_eq!(line.line_total().cents(), 2000);
    }

    #[test]
    fn test_settlement_request_defaults() {
        let json = r#"{
            "payment_method": "CASH",
            "items": [{ "item_id": "a", "quantity": 1 }],
            "subtotal_cents": 500,
            "tax_cents": 0,
            "total_cents": 500
        }"#;
        let req: SettlementRequest = serde_json::from_str(json).unwrap();
        assert!(req.customer_id.is_none());
        assert!(req.transaction_number.is_none());
        assert_eq!(req.discount_cents, 0);
        assert_eq!(req.items[0].price_at_sale_cents, None);
    }
}
