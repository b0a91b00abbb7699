//! # Saved Cart Repository
//!
//! Parked sales. A saved cart reserves nothing: no row locks, no ledger
//! deltas. Its lines point at inventory items and are priced at whatever
//! the item sells for when the cart is read back.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::ledger::UnitOfWork;
use till_core::{CartDetail, CartLine, SavedCart, SavedCartItem};

const SELECT_CART: &str = r#"
    SELECT id, cart_number, saved_date, customer_id, account_id,
           subtotal_cents, tax_cents, discount_cents, total_cents, notes
    FROM saved_carts
"#;

#[derive(Debug, sqlx::FromRow)]
struct HeaderRow {
    #[sqlx(flatten)]
    cart: SavedCart,
    customer_name: Option<String>,
    account_name: String,
}

/// Repository for saved carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Inserts the cart and its lines inside `uow`.
    pub async fn insert(&self, uow: &mut UnitOfWork, cart: &SavedCart, items: &[SavedCartItem]) -> DbResult<()> {
        debug!(id = %cart.id, cart_number = %cart.cart_number, lines = items.len(), "Inserting saved cart");

        sqlx::query(
            r#"
            INSERT INTO saved_carts (
                id, cart_number, saved_date, customer_id, account_id,
                subtotal_cents, tax_cents, discount_cents, total_cents, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.cart_number)
        .bind(cart.saved_date)
        .bind(&cart.customer_id)
        .bind(&cart.account_id)
        .bind(cart.subtotal_cents)
        .bind(cart.tax_cents)
        .bind(cart.discount_cents)
        .bind(cart.total_cents)
        .bind(&cart.notes)
        .execute(uow.conn())
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO saved_cart_items (id, cart_id, line_no, item_id, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&item.id)
            .bind(&item.cart_id)
            .bind(item.line_no)
            .bind(&item.item_id)
            .bind(item.quantity)
            .execute(uow.conn())
            .await?;
        }

        Ok(())
    }

    /// Reads a cart inside `uow` (sees its own writes).
    pub async fn detail_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Option<CartDetail>> {
        load_detail(uow.conn(), id).await
    }

    pub async fn get_detail(&self, id: &str) -> DbResult<Option<CartDetail>> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, id).await
    }

    pub async fn get_by_number(&self, cart_number: &str) -> DbResult<Option<SavedCart>> {
        let cart = sqlx::query_as::<_, SavedCart>(&format!("{SELECT_CART} WHERE cart_number = ?1"))
            .bind(cart_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(cart)
    }

    /// An account's carts with their lines, newest first.
    pub async fn list_for_account(&self, account_id: &str) -> DbResult<Vec<CartDetail>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM saved_carts WHERE account_id = ?1 ORDER BY saved_date DESC, cart_number DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut carts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(detail) = load_detail(&mut conn, &id).await? {
                carts.push(detail);
            }
        }

        Ok(carts)
    }

    /// Deletes a cart; its lines cascade. Returns false if it didn't exist.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting saved cart");

        let result = sqlx::query("DELETE FROM saved_carts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_carts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CartDetail>> {
    let header = sqlx::query_as::<_, HeaderRow>(
        r#"
        SELECT s.id, s.cart_number, s.saved_date, s.customer_id, s.account_id,
               s.subtotal_cents, s.tax_cents, s.discount_cents, s.total_cents, s.notes,
               c.name AS customer_name,
               a.name AS account_name
        FROM saved_carts s
        JOIN accounts a ON a.id = s.account_id
        LEFT JOIN customers c ON c.id = s.customer_id
        WHERE s.id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT si.id, si.line_no, si.item_id, i.name AS item_name, i.sku,
               si.quantity, i.selling_price_cents
        FROM saved_cart_items si
        JOIN inventory_items i ON i.id = si.item_id
        WHERE si.cart_id = ?1
        ORDER BY si.line_no ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(CartDetail {
        cart: header.cart,
        customer_name: header.customer_name,
        account_name: header.account_name,
        items,
    }))
}
