// src/store/mod.rs
// Persistence seam for the stock ledger.
//
// `InventoryStore` hands out `InventoryTx` units of work. A transaction that is
// dropped without `InventoryTx::commit` leaves no trace, which is what keeps a
// stock item update and its movement row all-or-nothing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    ApiKey, ApiRequestLog, AuditEntry, MovementKind, Product, StockItem, StockKey, StockMovement,
    Warehouse,
};

pub use memory::InMemoryStore;
pub use postgres::PgInventoryStore;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct StockItemFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    /// Restrict to products owned by this merchant.
    pub merchant_id: Option<Uuid>,
    pub low_stock: bool,
}

impl StockItemFilter {
    pub fn matches(&self, item: &StockItem, owner: Option<Uuid>) -> bool {
        self.product_id.map_or(true, |p| p == item.product_id)
            && self.warehouse_id.map_or(true, |w| w == item.warehouse_id)
            && self.merchant_id.map_or(true, |m| owner == Some(m))
            && (!self.low_stock || item.is_low_stock())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp caller input: pages start at 1, limit is capped at [`MAX_PAGE_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let limit = i64::from(request.limit);
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, AppError>;

    async fn get_stock_item(&self, id: Uuid) -> Result<Option<StockItem>, AppError>;
    async fn list_stock_items(
        &self,
        filter: &StockItemFilter,
        page: PageRequest,
    ) -> Result<Page<StockItem>, AppError>;
    /// Newest first.
    async fn list_movements(
        &self,
        stock_item_id: Uuid,
        kind: Option<MovementKind>,
        limit: u32,
    ) -> Result<Vec<StockMovement>, AppError>;

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn find_warehouse(&self, id: Uuid) -> Result<Option<Warehouse>, AppError>;
    async fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError>;
    async fn record_api_request(&self, entry: &ApiRequestLog) -> Result<(), AppError>;
}

#[async_trait]
pub trait InventoryTx: Send {
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;
    /// Read the product and hold its row lock until commit.
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn find_warehouse(&mut self, id: Uuid) -> Result<Option<Warehouse>, AppError>;
    /// Earliest-created active warehouse, for one merchant or system-wide.
    async fn earliest_active_warehouse(
        &mut self,
        merchant_id: Option<Uuid>,
    ) -> Result<Option<Warehouse>, AppError>;
    /// Returns `false` when a shared warehouse (no merchant) already uses the code.
    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<bool, AppError>;

    /// Unlocked reads, used to discover which rows to lock.
    async fn find_stock_item(&mut self, id: Uuid) -> Result<Option<StockItem>, AppError>;
    async fn find_stock_item_by_key(&mut self, key: &StockKey)
        -> Result<Option<StockItem>, AppError>;
    async fn first_stock_item_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Option<StockItem>, AppError>;

    /// Lock rows for update in ascending id order. Missing ids are skipped.
    async fn lock_stock_items(&mut self, ids: &[Uuid]) -> Result<Vec<StockItem>, AppError>;
    /// Returns `false` when another item already owns the same key.
    async fn insert_stock_item(&mut self, item: &StockItem) -> Result<bool, AppError>;
    async fn update_stock_item(&mut self, item: &StockItem) -> Result<(), AppError>;

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), AppError>;
    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
