// src/inventory/external.rs
// Key-authenticated inventory updates from merchant integrations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::engine::{apply_in_tx, MovementEngine};
use super::{MovementCommand, MovementContext, Scope};
use crate::error::AppError;
use crate::models::stock_item::NewStockItem;
use crate::models::stock_movement::reference;
use crate::models::{ApiKey, Product, StockItem, StockKey, Warehouse};
use crate::store::{Page, PageRequest, StockItemFilter};

pub const DEFAULT_API_REASON: &str = "API stock update";

/// A find-or-create-then-move request, already mapped to a core command.
#[derive(Debug, Clone)]
pub struct ExternalStockUpdate {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub command: MovementCommand,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub cost_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseSummary {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

/// Stock item with denormalised product and warehouse fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItemView {
    #[serde(flatten)]
    pub stock_item: StockItem,
    pub product: ProductSummary,
    pub warehouse: WarehouseSummary,
}

impl StockItemView {
    pub fn new(stock_item: StockItem, product: &Product, warehouse: &Warehouse) -> Self {
        Self {
            stock_item,
            product: ProductSummary {
                id: product.id,
                name: product.name.clone(),
                sku: product.sku.clone(),
            },
            warehouse: WarehouseSummary {
                id: warehouse.id,
                name: warehouse.name.clone(),
                code: warehouse.code.clone(),
            },
        }
    }
}

impl MovementEngine {
    /// Find or create the stock item for (product, warehouse, batch) and apply
    /// the movement, all in one transaction. A rejected movement therefore
    /// never leaves an empty stock item behind.
    #[instrument(skip(self, api_key, update), fields(api_key_id = %api_key.id, product_id = %update.product_id))]
    pub async fn upsert_and_move(
        &self,
        api_key: &ApiKey,
        update: ExternalStockUpdate,
    ) -> Result<StockItemView, AppError> {
        if let MovementCommand::Transfer { .. } = update.command {
            return Err(AppError::validation(
                "movementType must be STOCK_IN, STOCK_OUT or ADJUSTMENT",
            ));
        }

        let scope = Scope::Merchant(api_key.merchant_id);
        let mut tx = self.store().begin().await?;

        let product = tx
            .find_product(update.product_id)
            .await?
            .filter(|p| p.merchant_id == api_key.merchant_id && p.is_active)
            .ok_or_else(|| AppError::not_found("Product not found"))?;
        let warehouse = tx
            .find_warehouse(update.warehouse_id)
            .await?
            .ok_or_else(|| AppError::not_found("Warehouse not found"))?;

        let now = Utc::now();
        let key = StockKey::new(product.id, warehouse.id, update.batch_number);
        let stock_item_id = match tx.find_stock_item_by_key(&key).await? {
            Some(existing) => existing.id,
            None => {
                let fresh = NewStockItem {
                    cost_price: update.cost_price,
                    expiry_date: update.expiry_date,
                    ..NewStockItem::new(key.clone(), 0)
                }
                .build(now);
                if tx.insert_stock_item(&fresh).await? {
                    fresh.id
                } else {
                    tx.find_stock_item_by_key(&key)
                        .await?
                        .map(|i| i.id)
                        .ok_or_else(|| AppError::internal("stock item vanished after conflict"))?
                }
            }
        };

        let ctx = MovementContext::new(api_key.performer_tag())
            .reason(update.reason.unwrap_or_else(|| DEFAULT_API_REASON.to_string()))
            .notes(update.notes)
            .reference(reference::API_UPDATE, None);
        let outcome =
            apply_in_tx(tx.as_mut(), &scope, stock_item_id, update.command, &ctx, now).await?;
        tx.commit().await?;

        info!(
            stock_item_id = %outcome.stock_item.id,
            movement_type = outcome.movement.movement_type.as_str(),
            quantity = outcome.movement.quantity,
            "External stock update applied"
        );
        Ok(StockItemView::new(outcome.stock_item, &product, &warehouse))
    }

    pub async fn list_for_api_key(
        &self,
        api_key: &ApiKey,
        filter: StockItemFilter,
        page: PageRequest,
    ) -> Result<Page<StockItem>, AppError> {
        self.list_stock_items(&Scope::Merchant(api_key.merchant_id), filter, page)
            .await
    }
}
