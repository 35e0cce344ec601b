// src/dtos/external.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{non_blank, validate_not_negative};
use crate::error::AppError;
use crate::inventory::levels::checked_quantity;
use crate::inventory::{ExternalStockUpdate, MovementCommand};

/// Movement types accepted from merchant integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalMovementType {
    StockIn,
    StockOut,
    Adjustment,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInventoryRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i64,
    pub movement_type: ExternalMovementType,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_not_negative"))]
    pub cost_price: Option<Decimal>,
}

impl ExternalInventoryRequest {
    pub fn into_update(self) -> Result<ExternalStockUpdate, AppError> {
        let quantity = checked_quantity(self.quantity)?;
        let command = match self.movement_type {
            ExternalMovementType::StockIn => MovementCommand::StockIn(quantity),
            ExternalMovementType::StockOut => MovementCommand::StockOut(quantity),
            ExternalMovementType::Adjustment => MovementCommand::Adjustment(quantity),
        };
        Ok(ExternalStockUpdate {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            command,
            reason: non_blank(self.reason),
            notes: non_blank(self.notes),
            batch_number: self.batch_number,
            expiry_date: self.expiry_date,
            cost_price: self.cost_price,
        })
    }
}
