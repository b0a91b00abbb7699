//! # Cart Store
//!
//! Parks a cart under a `CART-…` number for later. Same identifier and
//! all-or-nothing discipline as a sale, but nothing is locked and the
//! ledger is never touched: a saved cart reserves no stock.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use till_core::validation::{validate_cart, validate_reference};
use till_core::{
    CartDetail, CartRequest, IdentifierKind, IdentifierSource, Money, SavedCart, SavedCartItem, ValidationError,
};
use till_db::{Database, DbError, UnitOfWork};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::numbering::{with_identifier, AttemptError};

#[derive(Clone)]
pub struct CartStore {
    db: Database,
    ids: Arc<dyn IdentifierSource>,
    max_attempts: u32,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    pub fn new(db: Database, ids: Arc<dyn IdentifierSource>, max_attempts: u32) -> Self {
        CartStore { db, ids, max_attempts }
    }

    /// Saves a cart for the acting account.
    ///
    /// Every referenced item, the customer and the account must exist.
    /// When `total_cents` is omitted the saved total is Σ selling price ×
    /// quantity at save time.
    pub async fn save(&self, account_id: &str, request: CartRequest) -> EngineResult<CartDetail> {
        validate_reference("account_id", account_id)?;
        validate_cart(&request)?;

        let request = &request;
        with_identifier(
            self.ids.as_ref(),
            IdentifierKind::Cart,
            request.cart_number.as_deref(),
            self.max_attempts,
            |number| self.attempt(account_id, request, number),
        )
        .await
    }

    async fn attempt(&self, account_id: &str, request: &CartRequest, number: String) -> Result<CartDetail, AttemptError> {
        let mut uow = self.db.begin().await?;

        match self.write(&mut uow, account_id, request, &number).await {
            Ok(detail) => {
                uow.commit().await?;
                info!(
                    cart_number = %detail.cart.cart_number,
                    account_id = %account_id,
                    lines = detail.items.len(),
                    total_cents = detail.cart.total_cents,
                    "Cart saved"
                );
                Ok(detail)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed cart save also failed");
                }
                Err(err)
            }
        }
    }

    async fn write(
        &self,
        uow: &mut UnitOfWork,
        account_id: &str,
        request: &CartRequest,
        number: &str,
    ) -> Result<CartDetail, AttemptError> {
        self.db.accounts().require(uow, account_id).await?;
        if let Some(customer_id) = &request.customer_id {
            self.db.customers().require(uow, customer_id).await?;
        }

        let inventory = self.db.inventory();
        let mut estimate = Some(Money::zero());
        for line in &request.items {
            let item = inventory.require(uow, &line.item_id).await?;
            estimate = estimate
                .zip(item.selling_price().checked_multiply_quantity(line.quantity))
                .and_then(|(sum, line_total)| sum.checked_add(line_total));
        }
        let total_cents = match (request.total_cents, estimate) {
            (Some(total), _) => total,
            (None, Some(estimate)) => estimate.cents(),
            (None, None) => {
                return Err(EngineError::from(ValidationError::TooLarge {
                    field: "total".to_string(),
                })
                .into())
            }
        };

        let cart = SavedCart {
            id: Uuid::new_v4().to_string(),
            cart_number: number.to_string(),
            saved_date: Utc::now(),
            customer_id: request.customer_id.clone(),
            account_id: account_id.to_string(),
            subtotal_cents: request.subtotal_cents,
            tax_cents: request.tax_cents,
            discount_cents: request.discount_cents,
            total_cents,
            notes: request.notes.clone(),
        };

        let items: Vec<SavedCartItem> = request
            .items
            .iter()
            .enumerate()
            .map(|(idx, line)| SavedCartItem {
                id: Uuid::new_v4().to_string(),
                cart_id: cart.id.clone(),
                line_no: idx as i64 + 1,
                item_id: line.item_id.clone(),
                quantity: line.quantity,
            })
            .collect();

        self.db
            .carts()
            .insert(uow, &cart, &items)
            .await
            .map_err(|err| AttemptError::from_insert(IdentifierKind::Cart, err))?;

        let detail = self
            .db
            .carts()
            .detail_in(uow, &cart.id)
            .await?
            .ok_or_else(|| DbError::not_found("SavedCart", cart.id.clone()))?;

        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> EngineResult<CartDetail> {
        self.db
            .carts()
            .get_detail(id)
            .await?
            .ok_or_else(|| EngineError::not_found("SavedCart", id))
    }

    /// An account's carts, newest first.
    pub async fn list_for_account(&self, account_id: &str) -> EngineResult<Vec<CartDetail>> {
        Ok(self.db.carts().list_for_account(account_id).await?)
    }

    /// Deletes a cart and its lines.
    pub async fn delete(&self, id: &str) -> EngineResult<()> {
        if !self.db.carts().delete(id).await? {
            return Err(EngineError::not_found("SavedCart", id));
        }
        info!(cart_id = %id, "Saved cart deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::testing::{back_office, customer, memory_db, scripted_back_office, stock, CASHIER, MANAGER};
    use till_core::{CartRequest, LineRequest};

    fn cart(lines: Vec<LineRequest>) -> CartRequest {
        CartRequest {
            items: lines,
            ..CartRequest::default()
        }
    }

    #[tokio::test]
    async fn test_save_estimates_total_and_leaves_stock_alone() {
        let office = back_office().await;
        let db = office.database();
        stock(db, "item-a", "SKU-A", 1, 600, 1000).await;
        stock(db, "item-b", "SKU-B", 0, 300, 450).await;
        customer(db, "cust-1", 0, 0).await;

        let mut request = cart(vec![LineRequest::new("item-a", 2), LineRequest::new("item-b", 3)]);
        request.customer_id = Some("cust-1".to_string());
        request.notes = Some("collect Friday".to_string());

        let detail = office.save_cart(CASHIER, request).await.unwrap();

        assert!(detail.cart.cart_number.starts_with("CART-"));
        assert_eq!(detail.cart.total_cents, 2 * 1000 + 3 * 450);
        assert_eq!(detail.cart.notes.as_deref(), Some("collect Friday"));
        assert_eq!(detail.customer_name.as_deref(), Some("Customer cust-1"));
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[1].item_name, "Item SKU-B");

        // More than is in stock, and still nothing moved
        assert_eq!(db.inventory().get("item-a").await.unwrap().quantity, 1);
        assert_eq!(db.inventory().get("item-b").await.unwrap().quantity, 0);
        assert_eq!(db.customers().get("cust-1").await.unwrap().purchase_count, 0);
    }

    #[tokio::test]
    async fn test_supplied_total_is_kept() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 5, 600, 1000).await;

        let mut request = cart(vec![LineRequest::new("item-a", 1)]);
        request.total_cents = Some(850);

        let detail = office.save_cart(CASHIER, request).await.unwrap();
        assert_eq!(detail.cart.total_cents, 850);
    }

    #[tokio::test]
    async fn test_estimate_past_i64_is_a_validation_error() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 5, 600, 1000).await;

        let err = office
            .save_cart(CASHIER, cart(vec![LineRequest::new("item-a", i64::MAX)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let err = office
            .save_cart(
                CASHIER,
                cart(vec![LineRequest::new("item-a", i64::MAX / 1000), LineRequest::new("item-a", i64::MAX / 1000)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert!(office.carts_for_account(CASHIER).await.unwrap().is_empty());

        // With the total supplied there is nothing to estimate
        let mut request = cart(vec![LineRequest::new("item-a", i64::MAX)]);
        request.total_cents = Some(1000);
        let detail = office.save_cart(CASHIER, request).await.unwrap();
        assert_eq!(detail.cart.total_cents, 1000);
    }

    #[tokio::test]
    async fn test_missing_references_write_nothing() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 5, 600, 1000).await;

        let err = office
            .save_cart(CASHIER, cart(vec![LineRequest::new("item-a", 1), LineRequest::new("ghost", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let mut request = cart(vec![LineRequest::new("item-a", 1)]);
        request.customer_id = Some("ghost".to_string());
        let err = office.save_cart(CASHIER, request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = office
            .save_cart("ghost", cart(vec![LineRequest::new("item-a", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        assert_eq!(office.database().carts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cart_number_collisions() {
        let db = memory_db().await;
        stock(&db, "item-a", "SKU-A", 5, 600, 1000).await;
        let (office, _ids) = scripted_back_office(db, &["CART-1", "CART-1", "CART-2"]);

        office.save_cart(CASHIER, cart(vec![LineRequest::new("item-a", 1)])).await.unwrap();
        let second = office.save_cart(CASHIER, cart(vec![LineRequest::new("item-a", 1)])).await.unwrap();
        assert_eq!(second.cart.cart_number, "CART-2");

        let mut request = cart(vec![LineRequest::new("item-a", 1)]);
        request.cart_number = Some("CART-2".to_string());
        let err = office.save_cart(CASHIER, request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        assert_eq!(office.database().carts().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_get_and_delete() {
        let office = back_office().await;
        stock(office.database(), "item-a", "SKU-A", 5, 600, 1000).await;

        let first = office.save_cart(CASHIER, cart(vec![LineRequest::new("item-a", 1)])).await.unwrap();
        office.save_cart(MANAGER, cart(vec![LineRequest::new("item-a", 2)])).await.unwrap();

        let mine = office.carts_for_account(CASHIER).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].cart.id, first.cart.id);

        let fetched = office.cart(&first.cart.id).await.unwrap();
        assert_eq!(fetched.items, first.items);

        office.delete_cart(&first.cart.id).await.unwrap();
        assert_eq!(office.cart(&first.cart.id).await.unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(office.delete_cart(&first.cart.id).await.unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(office.database().carts().count().await.unwrap(), 1);
    }
}
