//! # Customer Repository
//!
//! Customer records and the purchase aggregates settlement maintains.
//!
//! ## Aggregate Update
//! ```text
//! committed sale (total = T, date = D) naming customer C
//!      │
//!      ▼
//! lock customers:C   (after every item row)
//!      │
//!      ▼
//! purchase_count += 1, total_spent_cents += T, last_visit = D
//! ```
//! The update is a single relative UPDATE inside the sale's unit of work,
//! so concurrent sales for the same customer never lose an increment.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::ledger::UnitOfWork;
use till_core::Customer;

const CUSTOMER_TABLE: &str = "customers";

const SELECT_CUSTOMER: &str = r#"
    SELECT id, name, email, phone, total_spent_cents, purchase_count, last_visit, created_at
    FROM customers
"#;

/// Repository for customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!("{SELECT_CUSTOMER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Gets a customer by ID, or `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, email, phone, total_spent_cents, purchase_count, last_visit, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.total_spent_cents)
        .bind(customer.purchase_count)
        .bind(customer.last_visit)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Loads a customer inside `uow` without locking it, or `NotFound`.
    pub async fn require(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Customer> {
        sqlx::query_as::<_, Customer>(&format!("{SELECT_CUSTOMER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(uow.conn())
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Locks the customer row inside `uow` and reads it.
    ///
    /// Call only after every inventory row the unit of work needs.
    pub async fn lock_for_update(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Customer> {
        uow.lock_row(CUSTOMER_TABLE, id).await;
        self.require(uow, id).await
    }

    /// Folds one committed sale into the customer's aggregates.
    pub async fn record_purchase(
        &self,
        uow: &mut UnitOfWork,
        id: &str,
        total_cents: i64,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        if !uow.holds(CUSTOMER_TABLE, id) {
            return Err(DbError::TransactionFailed(format!("purchase on unlocked customer row {id}")));
        }

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET purchase_count = purchase_count + 1,
                total_spent_cents = total_spent_cents + ?1,
                last_visit = ?2
            WHERE id = ?3
            "#,
        )
        .bind(total_cents)
        .bind(at)
        .bind(id)
        .execute(uow.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        debug!(customer_id = %id, total_cents, "Customer aggregates updated");
        Ok(())
    }
}
