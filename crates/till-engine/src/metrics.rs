//! # Metrics Aggregator
//!
//! Builds the dashboard from committed data only. Nothing here opens a unit
//! of work or takes a row lock, so reporting never slows a till down.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use till_core::validation::validate_reference;
use till_core::{AccountStats, DashboardReport, TOP_ITEMS_LIMIT};
use till_db::Database;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    db: Database,
}

impl MetricsAggregator {
    pub fn new(db: Database) -> Self {
        MetricsAggregator { db }
    }

    /// The dashboard as of now.
    pub async fn dashboard(&self, account_id: &str) -> EngineResult<DashboardReport> {
        self.dashboard_at(account_id, Utc::now()).await
    }

    /// The dashboard with "today" being the UTC day containing `now`.
    pub async fn dashboard_at(&self, account_id: &str, now: DateTime<Utc>) -> EngineResult<DashboardReport> {
        self.require_account(account_id).await?;

        let (start, end) = utc_day(now);
        let metrics = self.db.metrics();

        let report = DashboardReport {
            today: metrics.sales_between(start, end).await?,
            my_contribution: metrics.account_stats_between(account_id, start, end).await?,
            inventory: metrics.inventory_valuation().await?,
            summary: metrics.lifetime_summary().await?,
            top_items: metrics.top_items(TOP_ITEMS_LIMIT).await?,
        };

        debug!(
            account_id = %account_id,
            today_revenue_cents = report.today.revenue_cents,
            top_items = report.top_items.len(),
            "Dashboard built"
        );
        Ok(report)
    }

    /// One account's sales for the UTC day containing `now`.
    pub async fn account_daily_stats(&self, account_id: &str, now: DateTime<Utc>) -> EngineResult<AccountStats> {
        self.require_account(account_id).await?;

        let (start, end) = utc_day(now);
        Ok(self.db.metrics().account_stats_between(account_id, start, end).await?)
    }

    async fn require_account(&self, account_id: &str) -> EngineResult<()> {
        validate_reference("account_id", account_id)?;
        match self.db.accounts().get_by_id(account_id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::not_found("Account", account_id)),
        }
    }
}

/// `[midnight, next midnight)` of the UTC day containing `at`.
pub fn utc_day(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN));
    (start, start + Duration::days(1))
}
