// src/store/memory.rs
// In-memory inventory store.
//
// Transactions take the single writer lock and work on a copy of the tables;
// `commit` publishes the copy, dropping the transaction discards it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{InventoryStore, InventoryTx, Page, PageRequest, StockItemFilter};
use crate::error::AppError;
use crate::models::{
    ApiKey, ApiRequestLog, AuditEntry, MovementKind, Product, StockItem, StockKey, StockMovement,
    Warehouse,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    warehouses: HashMap<Uuid, Warehouse>,
    stock_items: HashMap<Uuid, StockItem>,
    // append order is insertion order
    movements: Vec<StockMovement>,
    audit_log: Vec<AuditEntry>,
    api_keys: Vec<ApiKey>,
    api_requests: Vec<ApiRequestLog>,
}

impl Tables {
    fn item_by_key(&self, key: &StockKey) -> Option<&StockItem> {
        self.stock_items.values().find(|i| i.key() == *key)
    }

    fn owner_of(&self, item: &StockItem) -> Option<Uuid> {
        self.products.get(&item.product_id).map(|p| p.merchant_id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.lock().await.products.insert(product.id, product);
    }

    pub async fn insert_warehouse(&self, warehouse: Warehouse) {
        self.tables
            .lock()
            .await
            .warehouses
            .insert(warehouse.id, warehouse);
    }

    pub async fn insert_api_key(&self, key: ApiKey) {
        self.tables.lock().await.api_keys.push(key);
    }

    pub async fn stock_items(&self) -> Vec<StockItem> {
        let mut items: Vec<_> = self.tables.lock().await.stock_items.values().cloned().collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        items
    }

    pub async fn warehouses(&self) -> Vec<Warehouse> {
        self.tables.lock().await.warehouses.values().cloned().collect()
    }

    /// Oldest first, unlike [`InventoryStore::list_movements`].
    pub async fn movements_for(&self, stock_item_id: Uuid) -> Vec<StockMovement> {
        self.tables
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.stock_item_id == stock_item_id)
            .cloned()
            .collect()
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.tables.lock().await.audit_log.clone()
    }

    pub async fn api_requests(&self) -> Vec<ApiRequestLog> {
        self.tables.lock().await.api_requests.clone()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }

    async fn get_stock_item(&self, id: Uuid) -> Result<Option<StockItem>, AppError> {
        Ok(self.tables.lock().await.stock_items.get(&id).cloned())
    }

    async fn list_stock_items(
        &self,
        filter: &StockItemFilter,
        page: PageRequest,
    ) -> Result<Page<StockItem>, AppError> {
        let tables = self.tables.lock().await;
        let mut matched: Vec<StockItem> = tables
            .stock_items
            .values()
            .filter(|i| filter.matches(i, tables.owner_of(i)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn list_movements(
        &self,
        stock_item_id: Uuid,
        kind: Option<MovementKind>,
        limit: u32,
    ) -> Result<Vec<StockMovement>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .movements
            .iter()
            .rev()
            .filter(|m| m.stock_item_id == stock_item_id)
            .filter(|m| kind.map_or(true, |k| m.movement_type == k))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn find_warehouse(&self, id: Uuid) -> Result<Option<Warehouse>, AppError> {
        Ok(self.tables.lock().await.warehouses.get(&id).cloned())
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self
            .tables
            .lock()
            .await
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn record_api_request(&self, entry: &ApiRequestLog) -> Result<(), AppError> {
        self.tables.lock().await.api_requests.push(entry.clone());
        Ok(())
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl InventoryTx for InMemoryTx {
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        // the transaction already holds the only writer lock
        Ok(self.working.products.get(&id).cloned())
    }

    async fn find_warehouse(&mut self, id: Uuid) -> Result<Option<Warehouse>, AppError> {
        Ok(self.working.warehouses.get(&id).cloned())
    }

    async fn earliest_active_warehouse(
        &mut self,
        merchant_id: Option<Uuid>,
    ) -> Result<Option<Warehouse>, AppError> {
        Ok(self
            .working
            .warehouses
            .values()
            .filter(|w| w.is_active)
            .filter(|w| merchant_id.map_or(true, |m| w.merchant_id == Some(m)))
            .min_by_key(|w| (w.created_at, w.id))
            .cloned())
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<bool, AppError> {
        let shared_code_taken = warehouse.merchant_id.is_none()
            && self
                .working
                .warehouses
                .values()
                .any(|w| w.merchant_id.is_none() && w.code == warehouse.code);
        if shared_code_taken {
            return Ok(false);
        }
        self.working
            .warehouses
            .insert(warehouse.id, warehouse.clone());
        Ok(true)
    }

    async fn find_stock_item(&mut self, id: Uuid) -> Result<Option<StockItem>, AppError> {
        Ok(self.working.stock_items.get(&id).cloned())
    }

    async fn find_stock_item_by_key(
        &mut self,
        key: &StockKey,
    ) -> Result<Option<StockItem>, AppError> {
        Ok(self.working.item_by_key(key).cloned())
    }

    async fn first_stock_item_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Option<StockItem>, AppError> {
        Ok(self
            .working
            .stock_items
            .values()
            .filter(|i| i.product_id == product_id)
            .min_by_key(|i| (i.created_at, i.id))
            .cloned())
    }

    async fn lock_stock_items(&mut self, ids: &[Uuid]) -> Result<Vec<StockItem>, AppError> {
        // the transaction already holds the only writer lock
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.working.stock_items.get(id).cloned())
            .collect())
    }

    async fn insert_stock_item(&mut self, item: &StockItem) -> Result<bool, AppError> {
        if self.working.item_by_key(&item.key()).is_some() {
            return Ok(false);
        }
        self.working.stock_items.insert(item.id, item.clone());
        Ok(true)
    }

    async fn update_stock_item(&mut self, item: &StockItem) -> Result<(), AppError> {
        match self.working.stock_items.get_mut(&item.id) {
            Some(row) => {
                *row = item.clone();
                Ok(())
            }
            None => Err(AppError::internal(format!(
                "stock item {} vanished during update",
                item.id
            ))),
        }
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), AppError> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), AppError> {
        self.working.audit_log.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
