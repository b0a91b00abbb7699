//! # Account Repository
//!
//! Staff accounts. Every sale, cart and adjustment names the acting account;
//! credentials and permissions are checked upstream.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::ledger::UnitOfWork;
use till_core::Account;

const SELECT_ACCOUNT: &str = "SELECT id, username, name, role, created_at FROM accounts";

/// Repository for staff accounts.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    pub async fn insert(&self, account: &Account) -> DbResult<()> {
        debug!(id = %account.id, username = %account.username, "Inserting account");

        sqlx::query("INSERT INTO accounts (id, username, name, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(&account.id)
            .bind(&account.username)
            .bind(&account.name)
            .bind(account.role)
            .bind(account.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Loads the acting account inside a unit of work, or `NotFound`.
    pub async fn require(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Account> {
        sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(uow.conn())
            .await?
            .ok_or_else(|| DbError::not_found("Account", id))
    }
}
