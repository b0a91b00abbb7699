//! # Metrics Repository
//!
//! Read-only aggregate queries over committed data.
//!
//! ## Consistency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every query runs on a plain pool connection, outside any unit of     │
//! │  work. With WAL, a reader sees the last committed snapshot: a sale    │
//! │  is either fully counted (header, lines, deltas) or not at all.       │
//! │                                                                         │
//! │  Only status = 'COMPLETED' transactions count. saved_carts is never   │
//! │  read here.                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Time windows are half-open `[start, end)` over the stored UTC dates.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use till_core::{AccountStats, InventoryValuation, LifetimeSummary, SalesFigures, TopItem};

/// Repository for dashboard aggregates.
#[derive(Debug, Clone)]
pub struct MetricsRepository {
    pool: SqlitePool,
}

impl MetricsRepository {
    /// Creates a new MetricsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MetricsRepository { pool }
    }

    /// Revenue and count of completed sales in `[start, end)`.
    pub async fn sales_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DbResult<SalesFigures> {
        let (revenue_cents, transaction_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM transactions
            WHERE status = 'COMPLETED' AND date >= ?1 AND date < ?2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesFigures {
            revenue_cents,
            transaction_count,
        })
    }

    /// One account's completed sales and units sold in `[start, end)`.
    pub async fn account_stats_between(
        &self,
        account_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<AccountStats> {
        let (revenue_cents, transaction_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM transactions
            WHERE status = 'COMPLETED' AND account_id = ?1 AND date >= ?2 AND date < ?3
            "#,
        )
        .bind(account_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let items_sold: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ti.quantity), 0)
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            WHERE t.status = 'COMPLETED' AND t.account_id = ?1 AND t.date >= ?2 AND t.date < ?3
            "#,
        )
        .bind(account_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountStats {
            revenue_cents,
            transaction_count,
            items_sold,
        })
    }

    /// Stock valued at cost and at selling price, plus the low-stock count.
    pub async fn inventory_valuation(&self) -> DbResult<InventoryValuation> {
        let (current_value_at_cost_cents, potential_revenue_cents, low_stock_count): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COALESCE(SUM(quantity * unit_cost_cents), 0),
                       COALESCE(SUM(quantity * selling_price_cents), 0),
                       COALESCE(SUM(CASE WHEN quantity <= min_stock THEN 1 ELSE 0 END), 0)
                FROM inventory_items
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(InventoryValuation {
            current_value_at_cost_cents,
            potential_revenue_cents,
            low_stock_count,
        })
    }

    /// Lifetime totals over completed sales.
    ///
    /// Gross profit uses each item's current unit cost.
    pub async fn lifetime_summary(&self) -> DbResult<LifetimeSummary> {
        let (total_sales_cents, total_transactions): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_cents), 0), COUNT(*) FROM transactions WHERE status = 'COMPLETED'",
        )
        .fetch_one(&self.pool)
        .await?;

        let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        let gross_profit_cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM((ti.price_at_sale_cents - i.unit_cost_cents) * ti.quantity), 0)
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            JOIN inventory_items i ON i.id = ti.item_id
            WHERE t.status = 'COMPLETED'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LifetimeSummary {
            total_sales_cents,
            total_customers,
            total_transactions,
            gross_profit_cents,
        })
    }

    /// Best sellers by quantity, ties broken by SKU ascending.
    pub async fn top_items(&self, limit: i64) -> DbResult<Vec<TopItem>> {
        let items = sqlx::query_as::<_, TopItem>(
            r#"
            SELECT i.id AS item_id, i.name, i.sku, i.unit,
                   SUM(ti.quantity) AS quantity,
                   SUM(ti.quantity * ti.price_at_sale_cents) AS revenue_cents
            FROM transaction_items ti
            JOIN transactions t ON t.id = ti.transaction_id
            JOIN inventory_items i ON i.id = ti.item_id
            WHERE t.status = 'COMPLETED'
            GROUP BY i.id, i.name, i.sku, i.unit
            ORDER BY quantity DESC, i.sku ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
