use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Catalogue product owned by a merchant. Only the fields the stock ledger reads.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub sku: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: Uuid,
    pub merchant_id: Option<Uuid>,
    pub name: String,
    pub code: String,
    pub address: String,
    pub capacity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Warehouse {
    pub const DEFAULT_NAME: &'static str = "Main Warehouse";
    pub const DEFAULT_CODE: &'static str = "MAIN-WH";
    pub const DEFAULT_ADDRESS: &'static str = "Default warehouse address";
    pub const DEFAULT_CAPACITY: i32 = 10_000;

    /// Placeholder warehouse created when no active warehouse exists at all.
    pub fn default_for(merchant_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            name: Self::DEFAULT_NAME.to_string(),
            code: Self::DEFAULT_CODE.to_string(),
            address: Self::DEFAULT_ADDRESS.to_string(),
            capacity: Self::DEFAULT_CAPACITY,
            is_active: true,
            created_at: now,
        }
    }
}
