//! # Transaction Repository
//!
//! Committed sales and their line items.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Inside the settlement's UnitOfWork:                                    │
//! │                                                                         │
//! │  insert(header, lines)                                                  │
//! │     ├── INSERT transactions        ← UNIQUE(transaction_number) may    │
//! │     │                                 fire here: the engine retries    │
//! │     └── INSERT transaction_items   (one per line, line_no = position)  │
//! │                                                                         │
//! │  detail_in(uow, id)  ← the receipt, read before COMMIT                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transactions are immutable once inserted. Nothing here updates them.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::ledger::UnitOfWork;
use till_core::{Transaction, TransactionDetail, TransactionItem, TransactionLine};

const SELECT_TRANSACTION: &str = r#"
    SELECT id, transaction_number, date, customer_id, account_id, payment_method,
           subtotal_cents, tax_cents, discount_cents, total_cents, status
    FROM transactions
"#;

/// Header joined with the names a receipt shows.
#[derive(Debug, sqlx::FromRow)]
struct HeaderRow {
    #[sqlx(flatten)]
    transaction: Transaction,
    customer_name: Option<String>,
    account_name: String,
}

/// How a single transaction is looked up.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Id,
    Number,
}

impl Lookup {
    fn column(self) -> &'static str {
        match self {
            Lookup::Id => "t.id",
            Lookup::Number => "t.transaction_number",
        }
    }
}

/// Repository for transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Inserts the header and its lines inside the settlement's unit of work.
    pub async fn insert(&self, uow: &mut UnitOfWork, txn: &Transaction, items: &[TransactionItem]) -> DbResult<()> {
        debug!(
            id = %txn.id,
            transaction_number = %txn.transaction_number,
            lines = items.len(),
            "Inserting transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, transaction_number, date, customer_id, account_id, payment_method,
                subtotal_cents, tax_cents, discount_cents, total_cents, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.transaction_number)
        .bind(txn.date)
        .bind(&txn.customer_id)
        .bind(&txn.account_id)
        .bind(txn.payment_method)
        .bind(txn.subtotal_cents)
        .bind(txn.tax_cents)
        .bind(txn.discount_cents)
        .bind(txn.total_cents)
        .bind(txn.status)
        .execute(uow.conn())
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO transaction_items (
                    id, transaction_id, line_no, item_id, quantity, price_at_sale_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.transaction_id)
            .bind(item.line_no)
            .bind(&item.item_id)
            .bind(item.quantity)
            .bind(item.price_at_sale_cents)
            .execute(uow.conn())
            .await?;
        }

        Ok(())
    }

    /// Reads a transaction's receipt inside `uow` (sees its own writes).
    pub async fn detail_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Option<TransactionDetail>> {
        load_detail(uow.conn(), Lookup::Id, id).await
    }

    /// Gets a committed transaction with decorated items.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<TransactionDetail>> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, Lookup::Id, id).await
    }

    /// Gets a committed transaction by its human-readable number.
    pub async fn get_detail_by_number(&self, number: &str) -> DbResult<Option<TransactionDetail>> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, Lookup::Number, number).await
    }

    /// An account's transactions, newest first.
    pub async fn list_for_account(&self, account_id: &str, limit: u32) -> DbResult<Vec<Transaction>> {
        let txns = sqlx::query_as::<_, Transaction>(&format!(
            "{SELECT_TRANSACTION} WHERE account_id = ?1 ORDER BY date DESC, transaction_number DESC LIMIT ?2"
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(txns)
    }

    /// Counts all transactions regardless of status.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts all transaction lines. Diagnostics and tests.
    pub async fn count_items(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transaction_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn load_detail(conn: &mut SqliteConnection, by: Lookup, key: &str) -> DbResult<Option<TransactionDetail>> {
    let header = sqlx::query_as::<_, HeaderRow>(&format!(
        r#"
        SELECT t.id, t.transaction_number, t.date, t.customer_id, t.account_id, t.payment_method,
               t.subtotal_cents, t.tax_cents, t.discount_cents, t.total_cents, t.status,
               c.name AS customer_name,
               a.name AS account_name
        FROM transactions t
        JOIN accounts a ON a.id = t.account_id
        LEFT JOIN customers c ON c.id = t.customer_id
        WHERE {} = ?1
        "#,
        by.column()
    ))
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, TransactionLine>(
        r#"
        SELECT ti.id, ti.line_no, ti.item_id, i.name AS item_name, i.sku,
               ti.quantity, ti.price_at_sale_cents
        FROM transaction_items ti
        JOIN inventory_items i ON i.id = ti.item_id
        WHERE ti.transaction_id = ?1
        ORDER BY ti.line_no ASC
        "#,
    )
    .bind(&header.transaction.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(TransactionDetail {
        transaction: header.transaction,
        customer_name: header.customer_name,
        account_name: header.account_name,
        items,
    }))
}
