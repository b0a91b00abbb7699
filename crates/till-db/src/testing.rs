//! Fixtures for this crate's tests.

use std::path::Path;

use chrono::Utc;
use till_core::{Customer, InventoryItem};

use crate::{Database, DbConfig};

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub async fn file_db(dir: &Path) -> Database {
    Database::new(DbConfig::new(dir.join("till.db")).max_connections(4))
        .await
        .unwrap()
}

pub fn item(id: &str, sku: &str, quantity: i64, unit_cost_cents: i64, selling_price_cents: i64) -> InventoryItem {
    let now = Utc::now();
    InventoryItem {
        id: id.to_string(),
        sku: sku.to_string(),
        name: format!("Item {sku}"),
        category_id: "general".to_string(),
        tax_id: None,
        quantity,
        unit: "Pieces".to_string(),
        min_stock: 10,
        max_stock: 100,
        unit_cost_cents,
        selling_price_cents,
        created_at: now,
        updated_at: now,
    }
}

pub fn customer(id: &str, total_spent_cents: i64, purchase_count: i64) -> Customer {
    Customer {
        id: id.to_string(),
        name: format!("Customer {id}"),
        email: None,
        phone: None,
        total_spent_cents,
        purchase_count,
        last_visit: None,
        created_at: Utc::now(),
    }
}
