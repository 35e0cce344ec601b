// src/dtos/stock.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{non_blank, validate_not_blank, validate_not_negative};
use crate::error::AppError;
use crate::inventory::levels::checked_quantity;
use crate::inventory::{MovementCommand, MovementContext, MovementOutcome, ProvisionOrigin};
use crate::models::stock_item::NewStockItem;
use crate::models::stock_movement::reference;
use crate::models::{MovementKind, StockItem, StockKey, StockMovement};
use crate::store::{PageRequest, StockItemFilter, MAX_PAGE_LIMIT};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

// ==================== Stock Items ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockItemRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    #[serde(default)]
    pub initial_quantity: i32,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub cost_price: Option<Decimal>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    #[validate(range(min = 0))]
    pub max_stock_level: Option<i32>,
}

impl CreateStockItemRequest {
    pub fn into_new_item(self) -> NewStockItem {
        let base = NewStockItem::new(
            StockKey::new(self.product_id, self.warehouse_id, self.batch_number),
            self.initial_quantity,
        );
        NewStockItem {
            cost_price: self.cost_price,
            expiry_date: self.expiry_date,
            reorder_level: self.reorder_level.unwrap_or(base.reorder_level),
            max_stock_level: self.max_stock_level.unwrap_or(base.max_stock_level),
            ..base
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockItemResponse {
    pub stock_item: StockItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_movement: Option<StockMovement>,
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockListQuery {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub low_stock: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl StockListQuery {
    pub fn into_parts(self) -> (StockItemFilter, PageRequest) {
        let filter = StockItemFilter {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            merchant_id: None,
            low_stock: self.low_stock.unwrap_or(false),
        };
        (filter, PageRequest::new(self.page, self.limit))
    }
}

// ==================== Movements ====================

/// Movement types as callers name them on the internal API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementRequestType {
    In,
    Out,
    Adjustment,
    Transfer,
    Damage,
    Return,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementRequest {
    #[serde(rename = "type")]
    pub movement_type: MovementRequestType,
    pub quantity: i64,
    #[validate(custom(function = "validate_not_blank"), length(max = 500))]
    pub reason: String,
    #[validate(length(max = 255))]
    pub reference: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub target_warehouse_id: Option<Uuid>,
}

impl CreateMovementRequest {
    pub fn into_command(
        self,
        performed_by: &str,
    ) -> Result<(MovementCommand, MovementContext), AppError> {
        let quantity = checked_quantity(self.quantity)?;
        let command = match self.movement_type {
            MovementRequestType::In => MovementCommand::StockIn(quantity),
            MovementRequestType::Out => MovementCommand::StockOut(quantity),
            MovementRequestType::Adjustment => MovementCommand::Adjustment(quantity),
            MovementRequestType::Damage => MovementCommand::Damage(quantity),
            MovementRequestType::Return => MovementCommand::Return(quantity),
            MovementRequestType::Transfer => MovementCommand::Transfer {
                quantity,
                target_warehouse_id: self.target_warehouse_id.ok_or_else(|| {
                    AppError::validation("targetWarehouseId is required for TRANSFER")
                })?,
            },
        };

        let mut ctx = MovementContext::new(performed_by)
            .reason(self.reason.trim())
            .notes(non_blank(self.notes));
        if let Some(reference) = non_blank(self.reference) {
            ctx = ctx.reference(reference::MANUAL, Some(reference));
        }
        Ok((command, ctx))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub stock_movement: StockMovement,
    pub updated_stock: StockItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_stock: Option<StockItem>,
    pub message: &'static str,
}

impl From<MovementOutcome> for MovementResponse {
    fn from(outcome: MovementOutcome) -> Self {
        Self {
            stock_movement: outcome.movement,
            updated_stock: outcome.stock_item,
            target_stock: outcome.target.map(|leg| leg.stock_item),
            message: "Stock movement recorded successfully",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementListQuery {
    #[serde(rename = "type")]
    pub movement_type: Option<MovementKind>,
    pub limit: Option<u32>,
}

impl MovementListQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_PAGE_LIMIT)
    }
}

// ==================== Reservations ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub quantity: i64,
    #[validate(length(max = 255))]
    pub reference: Option<String>,
}

// ==================== Provisioning ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureStockRequest {
    #[serde(default)]
    pub initial_quantity: i32,
    #[serde(default)]
    pub origin: ProvisionOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movement(body: serde_json::Value) -> CreateMovementRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn transfer_without_target_is_rejected() {
        let req = movement(json!({"type": "TRANSFER", "quantity": 5, "reason": "rebalance"}));
        assert!(matches!(req.into_command("u1"), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let req = movement(json!({"type": "OUT", "quantity": 0, "reason": "sale"}));
        assert!(matches!(req.into_command("u1"), Err(AppError::InvalidQuantity(_))));
    }

    #[test]
    fn blank_reason_fails_validation() {
        let req = movement(json!({"type": "IN", "quantity": 3, "reason": "   "}));
        let err = AppError::from(req.validate().unwrap_err());
        assert!(err.to_string().starts_with("reason:"));
    }

    #[test]
    fn caller_reference_is_kept() {
        let req = movement(json!({
            "type": "IN", "quantity": 3, "reason": "delivery", "reference": "PO-17"
        }));
        let (command, ctx) = req.into_command("u1").unwrap();
        assert_eq!(command, MovementCommand::StockIn(3));
        assert_eq!(ctx.reference_id.as_deref(), Some("PO-17"));
        assert_eq!(ctx.reason.as_deref(), Some("delivery"));
    }

    #[test]
    fn history_limit_is_capped() {
        let q = MovementListQuery { movement_type: None, limit: Some(1000) };
        assert_eq!(q.limit(), MAX_PAGE_LIMIT);
        assert_eq!(MovementListQuery::default().limit(), DEFAULT_HISTORY_LIMIT);
    }
}
