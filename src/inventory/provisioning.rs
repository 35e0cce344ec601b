// src/inventory/provisioning.rs
// Guarantee that a product has a stock item before inventory flows target it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::engine::{ledger_row, MovementEngine};
use super::{MovementContext, Scope};
use crate::error::AppError;
use crate::models::stock_item::NewStockItem;
use crate::models::stock_movement::reference;
use crate::models::{AuditEntry, MovementKind, StockItem, StockKey, StockMovement, Warehouse};
use crate::store::InventoryTx;

/// Flow that asked for the stock item; recorded as the receipt's reference type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionOrigin {
    #[default]
    InitialStock,
    BulkUpload,
}

impl ProvisionOrigin {
    pub fn reference_type(&self) -> &'static str {
        match self {
            ProvisionOrigin::InitialStock => reference::INITIAL_STOCK,
            ProvisionOrigin::BulkUpload => reference::BULK_UPLOAD,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioned {
    pub stock_item: StockItem,
    pub created: bool,
    pub movement: Option<StockMovement>,
}

impl MovementEngine {
    /// Return the product's first stock item, creating one if it has none.
    ///
    /// An existing item is returned untouched: `initial_quantity` only applies
    /// when a new item is created.
    #[instrument(skip(self, performed_by))]
    pub async fn ensure_product_stock_item(
        &self,
        scope: &Scope,
        product_id: Uuid,
        initial_quantity: i32,
        origin: ProvisionOrigin,
        performed_by: &str,
    ) -> Result<Provisioned, AppError> {
        if initial_quantity < 0 {
            return Err(AppError::invalid_quantity(
                "Initial quantity cannot be negative",
            ));
        }

        let mut tx = self.store().begin().await?;
        // serialises concurrent provisioning of the same product
        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))?;
        scope.authorize(product.merchant_id)?;

        if let Some(existing) = tx.first_stock_item_for_product(product_id).await? {
            return Ok(Provisioned {
                stock_item: existing,
                created: false,
                movement: None,
            });
        }

        let now = Utc::now();
        let warehouse = resolve_warehouse(tx.as_mut(), product.merchant_id).await?;
        let key = StockKey::new(product_id, warehouse.id, None);
        let item = NewStockItem::new(key, initial_quantity).build(now);

        if !tx.insert_stock_item(&item).await? {
            // a concurrent call provisioned the same key first
            let existing = tx
                .find_stock_item_by_key(&item.key())
                .await?
                .ok_or_else(|| AppError::internal("provisioned stock item disappeared"))?;
            return Ok(Provisioned {
                stock_item: existing,
                created: false,
                movement: None,
            });
        }

        let movement = if initial_quantity > 0 {
            let ctx = MovementContext::new(performed_by)
                .reason("Initial stock")
                .reference(origin.reference_type(), None);
            let movement = ledger_row(&item, MovementKind::StockIn, initial_quantity, &ctx, now);
            tx.append_movement(&movement).await?;
            Some(movement)
        } else {
            None
        };

        tx.append_audit(&AuditEntry::stock_item(
            performed_by,
            "STOCK_ITEM_CREATE",
            item.id,
            None,
            Some(serde_json::json!({
                "quantity": item.quantity,
                "warehouseId": item.warehouse_id,
                "origin": origin.reference_type(),
            })),
            now,
        ))
        .await?;
        tx.commit().await?;

        info!(
            product_id = %product_id,
            stock_item_id = %item.id,
            warehouse_id = %warehouse.id,
            initial_quantity,
            "Provisioned stock item"
        );
        Ok(Provisioned {
            stock_item: item,
            created: true,
            movement,
        })
    }
}

/// Merchant's earliest active warehouse, else any active warehouse, else a new
/// default warehouse.
async fn resolve_warehouse(
    tx: &mut dyn InventoryTx,
    merchant_id: Uuid,
) -> Result<Warehouse, AppError> {
    if let Some(warehouse) = tx.earliest_active_warehouse(Some(merchant_id)).await? {
        return Ok(warehouse);
    }
    if let Some(warehouse) = tx.earliest_active_warehouse(None).await? {
        return Ok(warehouse);
    }

    let warehouse = Warehouse::default_for(None, Utc::now());
    warn!(warehouse_id = %warehouse.id, "No active warehouse found, creating default warehouse");
    let inserted = tx
        .insert_warehouse(&warehouse)
        .await
        .map_err(|e| AppError::NoWarehouseAvailable(e.to_string()))?;
    if inserted {
        return Ok(warehouse);
    }

    // another transaction created the default warehouse first
    tx.earliest_active_warehouse(None)
        .await?
        .ok_or_else(|| {
            AppError::NoWarehouseAvailable(format!(
                "warehouse code {} is taken by an inactive warehouse",
                Warehouse::DEFAULT_CODE
            ))
        })
}
