//! Fixtures for this crate's tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use till_core::{
    Account, AccountRole, Customer, IdentifierKind, IdentifierSource, InventoryItem, LineRequest, PaymentMethod,
    SettlementRequest,
};
use till_db::{Database, DbConfig};

use crate::BackOffice;

pub const CASHIER: &str = "acct-cashier";
pub const MANAGER: &str = "acct-manager";

/// Hands out a fixed list of identifiers, then numbered fallbacks.
#[derive(Debug, Default)]
pub struct ScriptedIdentifiers {
    script: Mutex<VecDeque<String>>,
    issued: Mutex<u32>,
}

impl ScriptedIdentifiers {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedIdentifiers {
            script: Mutex::new(script.into_iter().map(Into::into).collect()),
            issued: Mutex::new(0),
        }
    }

    pub fn issued(&self) -> u32 {
        *self.issued.lock().unwrap()
    }
}

impl IdentifierSource for ScriptedIdentifiers {
    fn next(&self, kind: IdentifierKind) -> String {
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("{}-EXTRA-{}", kind.prefix(), *issued))
    }
}

pub async fn memory_db() -> Database {
    seeded(Database::new(DbConfig::in_memory()).await.unwrap()).await
}

pub async fn file_db(dir: &Path) -> Database {
    let db = Database::new(DbConfig::new(dir.join("till.db")).max_connections(8))
        .await
        .unwrap();
    seeded(db).await
}

/// A back office over an in-memory database with two accounts.
pub async fn back_office() -> BackOffice {
    BackOffice::new(memory_db().await, 3)
}

pub fn scripted_back_office(db: Database, script: &[&str]) -> (BackOffice, Arc<ScriptedIdentifiers>) {
    let ids = Arc::new(ScriptedIdentifiers::new(script.iter().copied()));
    (BackOffice::with_identifiers(db, ids.clone(), 3), ids)
}

async fn seeded(db: Database) -> Database {
    for (id, username, role) in [(CASHIER, "cashier", AccountRole::Cashier), (MANAGER, "manager", AccountRole::Manager)] {
        db.accounts()
            .insert(&Account {
                id: id.to_string(),
                username: username.to_string(),
                name: format!("The {username}"),
                role,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }
    db
}

pub async fn stock(db: &Database, id: &str, sku: &str, quantity: i64, unit_cost_cents: i64, selling_price_cents: i64) {
    let now = Utc::now();
    db.inventory()
        .insert(&InventoryItem {
            id: id.to_string(),
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            category_id: "general".to_string(),
            tax_id: None,
            quantity,
            unit: "Pieces".to_string(),
            min_stock: 3,
            max_stock: 100,
            unit_cost_cents,
            selling_price_cents,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

pub async fn customer(db: &Database, id: &str, total_spent_cents: i64, purchase_count: i64) {
    db.customers()
        .insert(&Customer {
            id: id.to_string(),
            name: format!("Customer {id}"),
            email: None,
            phone: None,
            total_spent_cents,
            purchase_count,
            last_visit: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// A cash sale with header totals equal to `total_cents`.
pub fn sale(lines: Vec<LineRequest>, total_cents: i64) -> SettlementRequest {
    SettlementRequest {
        customer_id: None,
        payment_method: PaymentMethod::Cash,
        items: lines,
        subtotal_cents: total_cents,
        tax_cents: 0,
        discount_cents: 0,
        total_cents,
        transaction_number: None,
    }
}
