use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::inventory::levels::StockLevels;

pub const DEFAULT_REORDER_LEVEL: i32 = 10;
pub const DEFAULT_MAX_STOCK_LEVEL: i32 = 100;

/// Quantity record for one product in one warehouse, optionally one batch.
///
/// `available_quantity` is persisted for filtering but is only ever written
/// through [`StockItem::set_levels`], which derives it from `quantity` and
/// `reserved_quantity`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub available_quantity: i32,
    pub reserved_quantity: i32,
    pub reorder_level: i32,
    pub max_stock_level: i32,
    pub batch_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub cost_price: Option<Decimal>,
    pub last_stock_in: Option<DateTime<Utc>>,
    pub last_stock_out: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity of a stock item: (product, warehouse, batch-or-none).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub batch_number: Option<String>,
}

impl StockKey {
    pub fn new(product_id: Uuid, warehouse_id: Uuid, batch_number: Option<String>) -> Self {
        // Blank batch numbers are the same lot as no batch.
        let batch_number = batch_number
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        Self {
            product_id,
            warehouse_id,
            batch_number,
        }
    }
}

/// Attributes for a stock item that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewStockItem {
    pub key: StockKey,
    pub initial_quantity: i32,
    pub cost_price: Option<Decimal>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub reorder_level: i32,
    pub max_stock_level: i32,
}

impl NewStockItem {
    pub fn new(key: StockKey, initial_quantity: i32) -> Self {
        Self {
            key,
            initial_quantity,
            cost_price: None,
            expiry_date: None,
            reorder_level: DEFAULT_REORDER_LEVEL,
            max_stock_level: DEFAULT_MAX_STOCK_LEVEL,
        }
    }

    pub fn build(self, now: DateTime<Utc>) -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            product_id: self.key.product_id,
            warehouse_id: self.key.warehouse_id,
            quantity: self.initial_quantity,
            available_quantity: self.initial_quantity,
            reserved_quantity: 0,
            reorder_level: self.reorder_level,
            max_stock_level: self.max_stock_level,
            batch_number: self.key.batch_number,
            expiry_date: self.expiry_date,
            cost_price: self.cost_price,
            last_stock_in: (self.initial_quantity > 0).then_some(now),
            last_stock_out: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl StockItem {
    pub fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            batch_number: self.batch_number.clone(),
        }
    }

    pub fn levels(&self) -> StockLevels {
        StockLevels {
            quantity: self.quantity,
            reserved: self.reserved_quantity,
        }
    }

    pub fn set_levels(&mut self, levels: StockLevels, now: DateTime<Utc>) {
        self.quantity = levels.quantity;
        self.reserved_quantity = levels.reserved;
        self.available_quantity = levels.available();
        self.updated_at = now;
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}
