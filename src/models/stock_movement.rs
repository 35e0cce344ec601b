use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ==================== Enums ====================

/// Canonical movement kind as persisted in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_movement_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    StockIn,
    StockOut,
    Adjustment,
    Transfer,
    Damage,
    Return,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::StockIn => "STOCK_IN",
            MovementKind::StockOut => "STOCK_OUT",
            MovementKind::Adjustment => "ADJUSTMENT",
            MovementKind::Transfer => "TRANSFER",
            MovementKind::Damage => "DAMAGE",
            MovementKind::Return => "RETURN",
        }
    }
}

// ==================== Provenance tags ====================

pub mod reference {
    pub const INITIAL_STOCK: &str = "INITIAL_STOCK";
    pub const BULK_UPLOAD: &str = "BULK_UPLOAD";
    pub const API_UPDATE: &str = "API_UPDATE";
    pub const MANUAL: &str = "MANUAL";
    pub const TRANSFER_IN: &str = "TRANSFER_IN";
    pub const TRANSFER_OUT: &str = "TRANSFER_OUT";
}

/// Immutable ledger row. Written once by the movement engine, never updated.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub movement_type: MovementKind,
    pub quantity: i32,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}
