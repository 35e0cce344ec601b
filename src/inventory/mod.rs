// src/inventory/mod.rs
// Stock ledger core: quantity rules, the movement engine and its callers.

pub mod engine;
pub mod external;
pub mod levels;
pub mod provisioning;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::MovementKind;

pub use engine::{MovementEngine, MovementOutcome, TransferLeg};
pub use external::{ExternalStockUpdate, StockItemView};
pub use provisioning::{ProvisionOrigin, Provisioned};

/// A requested change to one stock item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementCommand {
    StockIn(i32),
    StockOut(i32),
    /// New absolute quantity.
    Adjustment(i32),
    Transfer {
        quantity: i32,
        target_warehouse_id: Uuid,
    },
    Damage(i32),
    Return(i32),
}

impl MovementCommand {
    pub fn kind(&self) -> MovementKind {
        match self {
            MovementCommand::StockIn(_) => MovementKind::StockIn,
            MovementCommand::StockOut(_) => MovementKind::StockOut,
            MovementCommand::Adjustment(_) => MovementKind::Adjustment,
            MovementCommand::Transfer { .. } => MovementKind::Transfer,
            MovementCommand::Damage(_) => MovementKind::Damage,
            MovementCommand::Return(_) => MovementKind::Return,
        }
    }

    /// Magnitude recorded on the ledger row.
    pub fn quantity(&self) -> i32 {
        match *self {
            MovementCommand::StockIn(q)
            | MovementCommand::StockOut(q)
            | MovementCommand::Adjustment(q)
            | MovementCommand::Damage(q)
            | MovementCommand::Return(q) => q,
            MovementCommand::Transfer { quantity, .. } => quantity,
        }
    }
}

/// Provenance recorded alongside a movement.
#[derive(Debug, Clone, Default)]
pub struct MovementContext {
    pub performed_by: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
}

impl MovementContext {
    pub fn new(performed_by: impl Into<String>) -> Self {
        Self {
            performed_by: performed_by.into(),
            ..Self::default()
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn reference(mut self, reference_type: impl Into<String>, reference_id: Option<String>) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = reference_id;
        self
    }
}

/// Which merchants' stock the caller may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Merchant(Uuid),
}

impl Scope {
    pub fn merchant_id(&self) -> Option<Uuid> {
        match self {
            Scope::Global => None,
            Scope::Merchant(id) => Some(*id),
        }
    }

    pub fn authorize(&self, owner_merchant_id: Uuid) -> Result<(), AppError> {
        match self {
            Scope::Global => Ok(()),
            Scope::Merchant(id) if *id == owner_merchant_id => Ok(()),
            Scope::Merchant(_) => Err(AppError::forbidden(
                "You do not have access to this product's stock",
            )),
        }
    }
}
