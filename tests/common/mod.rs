#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use sjf_stock_ledger::auth::api_key::hash_api_key;
use sjf_stock_ledger::inventory::{MovementContext, MovementEngine, Scope};
use sjf_stock_ledger::models::stock_item::NewStockItem;
use sjf_stock_ledger::models::{ApiKey, Product, StockItem, StockKey, Warehouse};
use sjf_stock_ledger::store::InMemoryStore;
use uuid::Uuid;

pub const RAW_API_KEY: &str = "sk_test_merchant_key";
pub const PERFORMER: &str = "user-1";

pub struct Fixture {
    pub store: InMemoryStore,
    pub engine: MovementEngine,
    pub merchant_id: Uuid,
    pub product: Product,
    /// Merchant's first warehouse.
    pub main: Warehouse,
    pub overflow: Warehouse,
    pub api_key: ApiKey,
}

pub fn product(merchant_id: Uuid, sku: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        merchant_id,
        name: format!("Product {sku}"),
        sku: sku.to_string(),
        is_active: true,
    }
}

/// `age_days` pushes `created_at` into the past so creation order is explicit.
pub fn warehouse(merchant_id: Option<Uuid>, code: &str, age_days: i64) -> Warehouse {
    Warehouse {
        id: Uuid::new_v4(),
        merchant_id,
        name: format!("Warehouse {code}"),
        code: code.to_string(),
        address: "1 Dock Road".to_string(),
        capacity: 5_000,
        is_active: true,
        created_at: Utc::now() - Duration::days(age_days),
    }
}

pub async fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let merchant_id = Uuid::new_v4();
    let product = product(merchant_id, "SKU-001");
    let main = warehouse(Some(merchant_id), "WH-A", 10);
    let overflow = warehouse(Some(merchant_id), "WH-B", 5);
    let api_key = ApiKey {
        id: Uuid::new_v4(),
        merchant_id,
        name: "storefront".to_string(),
        key_hash: hash_api_key(RAW_API_KEY),
        is_active: true,
    };

    store.insert_product(product.clone()).await;
    store.insert_warehouse(main.clone()).await;
    store.insert_warehouse(overflow.clone()).await;
    store.insert_api_key(api_key.clone()).await;

    Fixture {
        engine: MovementEngine::new(Arc::new(store.clone())),
        store,
        merchant_id,
        product,
        main,
        overflow,
        api_key,
    }
}

impl Fixture {
    pub async fn stock_item(&self, warehouse: &Warehouse, quantity: i32) -> StockItem {
        let key = StockKey::new(self.product.id, warehouse.id, None);
        let (item, _) = self
            .engine
            .create_stock_item(&Scope::Global, NewStockItem::new(key, quantity), PERFORMER)
            .await
            .unwrap();
        item
    }

    pub async fn reload(&self, id: Uuid) -> StockItem {
        self.engine.get_stock_item(&Scope::Global, id).await.unwrap()
    }
}

pub fn ctx(reason: &str) -> MovementContext {
    MovementContext::new(PERFORMER).reason(reason)
}

pub fn assert_levels_consistent(item: &StockItem) {
    assert!(item.quantity >= 0, "negative quantity: {item:?}");
    assert!(item.available_quantity >= 0, "negative available: {item:?}");
    assert_eq!(item.available_quantity, item.quantity - item.reserved_quantity);
}
