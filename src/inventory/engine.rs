// src/inventory/engine.rs
// The movement engine is the only code that changes stock quantities.
//
// Each public operation runs in one store transaction: discover the rows, lock
// them in id order, check the business rules, then write the stock item(s), the
// ledger row(s) and the audit entry. Any error before `commit` discards the
// whole unit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::levels::{
    ensure_positive, Direction, StockLevels, INSUFFICIENT_STOCK, INSUFFICIENT_STOCK_FOR_TRANSFER,
};
use super::{MovementCommand, MovementContext, Scope};
use crate::error::AppError;
use crate::models::stock_item::NewStockItem;
use crate::models::stock_movement::reference;
use crate::models::{AuditEntry, MovementKind, StockItem, StockKey, StockMovement};
use crate::store::{InventoryStore, InventoryTx, Page, PageRequest, StockItemFilter};

pub const STOCK_NOT_FOUND: &str = "Stock item not found";
pub const TRANSFER_DESTINATION_RACED: &str =
    "Transfer destination was created concurrently, retry the transfer";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLeg {
    pub stock_item: StockItem,
    pub movement: StockMovement,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementOutcome {
    pub stock_item: StockItem,
    pub movement: StockMovement,
    pub target: Option<TransferLeg>,
}

#[derive(Clone)]
pub struct MovementEngine {
    store: Arc<dyn InventoryStore>,
}

impl MovementEngine {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    /// Apply one movement to an existing stock item.
    #[instrument(skip(self, ctx), fields(performed_by = %ctx.performed_by))]
    pub async fn apply(
        &self,
        scope: &Scope,
        stock_item_id: Uuid,
        command: MovementCommand,
        ctx: MovementContext,
    ) -> Result<MovementOutcome, AppError> {
        let mut tx = self.store.begin().await?;
        let outcome =
            apply_in_tx(tx.as_mut(), scope, stock_item_id, command, &ctx, Utc::now()).await?;
        tx.commit().await?;

        info!(
            stock_item_id = %outcome.stock_item.id,
            movement_id = %outcome.movement.id,
            movement_type = outcome.movement.movement_type.as_str(),
            quantity = outcome.movement.quantity,
            new_quantity = outcome.stock_item.quantity,
            "Stock movement applied"
        );
        Ok(outcome)
    }

    /// Create a stock item for a key that has none yet. A positive initial
    /// quantity is recorded as an `INITIAL_STOCK` receipt.
    #[instrument(skip(self, new_item, performed_by), fields(product_id = %new_item.key.product_id))]
    pub async fn create_stock_item(
        &self,
        scope: &Scope,
        new_item: NewStockItem,
        performed_by: &str,
    ) -> Result<(StockItem, Option<StockMovement>), AppError> {
        if new_item.initial_quantity < 0 {
            return Err(AppError::invalid_quantity(
                "Initial quantity cannot be negative",
            ));
        }
        if new_item.reorder_level < 0 || new_item.max_stock_level < 0 {
            return Err(AppError::validation("Stock levels cannot be negative"));
        }

        let mut tx = self.store.begin().await?;
        let product = tx
            .find_product(new_item.key.product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))?;
        scope.authorize(product.merchant_id)?;
        tx.find_warehouse(new_item.key.warehouse_id)
            .await?
            .ok_or_else(|| AppError::not_found("Warehouse not found"))?;

        let now = Utc::now();
        let item = new_item.build(now);
        if !tx.insert_stock_item(&item).await? {
            return Err(AppError::conflict(
                "Stock item already exists for this product, warehouse and batch",
            ));
        }

        let movement = if item.quantity > 0 {
            let ctx = MovementContext::new(performed_by)
                .reason("Initial stock")
                .reference(reference::INITIAL_STOCK, None);
            let movement = ledger_row(&item, MovementKind::StockIn, item.quantity, &ctx, now);
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
            Some(snapshot(&item)),
            now,
        ))
        .await?;
        tx.commit().await?;

        info!(stock_item_id = %item.id, quantity = item.quantity, "Stock item created");
        Ok((item, movement))
    }

    /// Earmark available units for an order. Quantity on hand is unchanged, so
    /// no ledger row is written.
    #[instrument(skip(self, reference_id, performed_by))]
    pub async fn reserve(
        &self,
        scope: &Scope,
        stock_item_id: Uuid,
        quantity: i32,
        reference_id: Option<String>,
        performed_by: &str,
    ) -> Result<StockItem, AppError> {
        self.change_reservation(
            scope,
            stock_item_id,
            reference_id,
            performed_by,
            "STOCK_RESERVE",
            |l| l.reserve(quantity),
        )
        .await
    }

    #[instrument(skip(self, reference_id, performed_by))]
    pub async fn release(
        &self,
        scope: &Scope,
        stock_item_id: Uuid,
        quantity: i32,
        reference_id: Option<String>,
        performed_by: &str,
    ) -> Result<StockItem, AppError> {
        self.change_reservation(
            scope,
            stock_item_id,
            reference_id,
            performed_by,
            "STOCK_RELEASE",
            |l| l.release(quantity),
        )
        .await
    }

    async fn change_reservation(
        &self,
        scope: &Scope,
        stock_item_id: Uuid,
        reference_id: Option<String>,
        performed_by: &str,
        action: &str,
        change: impl FnOnce(StockLevels) -> Result<StockLevels, AppError>,
    ) -> Result<StockItem, AppError> {
        let mut tx = self.store.begin().await?;
        let current = lock_authorized(tx.as_mut(), scope, stock_item_id).await?;

        let now = Utc::now();
        let next = change(current.levels())?;
        let mut updated = current.clone();
        updated.set_levels(next, now);
        tx.update_stock_item(&updated).await?;

        let mut new_values = snapshot(&updated);
        new_values["reference"] = json!(reference_id);
        tx.append_audit(&AuditEntry::stock_item(
            performed_by,
            action,
            updated.id,
            Some(snapshot(&current)),
            Some(new_values),
            now,
        ))
        .await?;
        tx.commit().await?;

        info!(
            stock_item_id = %updated.id,
            reserved = updated.reserved_quantity,
            available = updated.available_quantity,
            action,
            "Reservation changed"
        );
        Ok(updated)
    }

    pub async fn get_stock_item(&self, scope: &Scope, id: Uuid) -> Result<StockItem, AppError> {
        let item = self
            .store
            .get_stock_item(id)
            .await?
            .ok_or_else(|| AppError::not_found(STOCK_NOT_FOUND))?;
        self.authorize_item(scope, &item).await?;
        Ok(item)
    }

    pub async fn list_stock_items(
        &self,
        scope: &Scope,
        mut filter: StockItemFilter,
        page: PageRequest,
    ) -> Result<Page<StockItem>, AppError> {
        if let Some(merchant_id) = scope.merchant_id() {
            filter.merchant_id = Some(merchant_id);
        }
        self.store.list_stock_items(&filter, page).await
    }

    pub async fn movement_history(
        &self,
        scope: &Scope,
        stock_item_id: Uuid,
        kind: Option<MovementKind>,
        limit: u32,
    ) -> Result<Vec<StockMovement>, AppError> {
        self.get_stock_item(scope, stock_item_id).await?;
        self.store.list_movements(stock_item_id, kind, limit).await
    }

    async fn authorize_item(&self, scope: &Scope, item: &StockItem) -> Result<(), AppError> {
        if let Scope::Merchant(_) = scope {
            let product = self
                .store
                .find_product(item.product_id)
                .await?
                .ok_or_else(|| AppError::not_found("Product not found"))?;
            scope.authorize(product.merchant_id)?;
        }
        Ok(())
    }
}

/// Apply a movement inside a caller-owned transaction.
pub(crate) async fn apply_in_tx(
    tx: &mut dyn InventoryTx,
    scope: &Scope,
    stock_item_id: Uuid,
    command: MovementCommand,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<MovementOutcome, AppError> {
    ensure_positive(command.quantity())?;

    match command {
        MovementCommand::Transfer {
            quantity,
            target_warehouse_id,
        } => transfer(tx, scope, stock_item_id, quantity, target_warehouse_id, ctx, now).await,
        single => {
            let current = lock_authorized(tx, scope, stock_item_id).await?;
            let next = match single {
                MovementCommand::StockIn(q) | MovementCommand::Return(q) => {
                    current.levels().receive(q)?
                }
                MovementCommand::StockOut(q) | MovementCommand::Damage(q) => {
                    current.levels().issue(q, INSUFFICIENT_STOCK)?
                }
                MovementCommand::Adjustment(target) => current.levels().adjust_to(target)?,
                MovementCommand::Transfer { .. } => {
                    return Err(AppError::internal("transfer routed as a single-item movement"))
                }
            };

            let movement_ctx = with_default_reference(ctx, reference::MANUAL, None);
            let (updated, movement) = write_change(
                tx,
                &current,
                next,
                single.kind(),
                single.quantity(),
                &movement_ctx,
                now,
            )
            .await?;
            Ok(MovementOutcome {
                stock_item: updated,
                movement,
                target: None,
            })
        }
    }
}

async fn transfer(
    tx: &mut dyn InventoryTx,
    scope: &Scope,
    stock_item_id: Uuid,
    quantity: i32,
    target_warehouse_id: Uuid,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<MovementOutcome, AppError> {
    let discovered = tx
        .find_stock_item(stock_item_id)
        .await?
        .ok_or_else(|| AppError::not_found(STOCK_NOT_FOUND))?;
    authorize_product(tx, scope, discovered.product_id).await?;

    if discovered.warehouse_id == target_warehouse_id {
        return Err(AppError::validation(
            "Target warehouse must differ from the source warehouse",
        ));
    }
    tx.find_warehouse(target_warehouse_id)
        .await?
        .ok_or_else(|| AppError::not_found("Target warehouse not found"))?;

    let target_key = StockKey {
        warehouse_id: target_warehouse_id,
        ..discovered.key()
    };
    let existing_target = tx.find_stock_item_by_key(&target_key).await?;

    // lock both rows together so the acquisition order is by id
    let mut ids = vec![stock_item_id];
    ids.extend(existing_target.as_ref().map(|t| t.id));
    let locked = tx.lock_stock_items(&ids).await?;
    let source = locked
        .iter()
        .find(|i| i.id == stock_item_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(STOCK_NOT_FOUND))?;
    let locked_target = existing_target
        .and_then(|t| locked.iter().find(|i| i.id == t.id).cloned());

    let source_next = source
        .levels()
        .issue(quantity, INSUFFICIENT_STOCK_FOR_TRANSFER)?;

    let source_ctx = with_default_reference(
        ctx,
        reference::TRANSFER_OUT,
        Some(target_warehouse_id.to_string()),
    );
    let (updated_source, source_movement) = write_change(
        tx,
        &source,
        source_next,
        MovementKind::Transfer,
        quantity,
        &source_ctx,
        now,
    )
    .await?;

    let target_ctx = MovementContext {
        reference_type: Some(reference::TRANSFER_IN.to_string()),
        reference_id: Some(source_movement.id.to_string()),
        ..ctx.clone()
    };

    let (target_item, target_movement, created) = match locked_target {
        Some(target) => {
            let next = target.levels().receive(quantity)?;
            let (item, movement) = write_change(
                tx,
                &target,
                next,
                MovementKind::StockIn,
                quantity,
                &target_ctx,
                now,
            )
            .await?;
            (item, movement, false)
        }
        None => {
            let fresh = NewStockItem {
                key: target_key,
                initial_quantity: quantity,
                cost_price: source.cost_price,
                expiry_date: source.expiry_date,
                reorder_level: source.reorder_level,
                max_stock_level: source.max_stock_level,
            }
            .build(now);

            if !tx.insert_stock_item(&fresh).await? {
                // the destination appeared after discovery and can no longer be
                // locked in id order
                return Err(AppError::conflict(TRANSFER_DESTINATION_RACED));
            }
            let movement = ledger_row(&fresh, MovementKind::StockIn, quantity, &target_ctx, now);
            tx.append_movement(&movement).await?;
            tx.append_audit(&AuditEntry::stock_item(
                &ctx.performed_by,
                "STOCK_ITEM_CREATE",
                fresh.id,
                None,
                Some(snapshot(&fresh)),
                now,
            ))
            .await?;
            (fresh, movement, true)
        }
    };

    Ok(MovementOutcome {
        stock_item: updated_source,
        movement: source_movement,
        target: Some(TransferLeg {
            stock_item: target_item,
            movement: target_movement,
            created,
        }),
    })
}

async fn authorize_product(
    tx: &mut dyn InventoryTx,
    scope: &Scope,
    product_id: Uuid,
) -> Result<(), AppError> {
    if let Scope::Merchant(_) = scope {
        let product = tx
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))?;
        scope.authorize(product.merchant_id)?;
    }
    Ok(())
}

async fn lock_authorized(
    tx: &mut dyn InventoryTx,
    scope: &Scope,
    stock_item_id: Uuid,
) -> Result<StockItem, AppError> {
    let item = tx
        .lock_stock_items(&[stock_item_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found(STOCK_NOT_FOUND))?;
    authorize_product(tx, scope, item.product_id).await?;
    Ok(item)
}

/// Persist new levels for a locked item and append its ledger and audit rows.
async fn write_change(
    tx: &mut dyn InventoryTx,
    current: &StockItem,
    next: StockLevels,
    kind: MovementKind,
    quantity: i32,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<(StockItem, StockMovement), AppError> {
    let mut updated = current.clone();
    updated.set_levels(next, now);

    let direction = match kind {
        MovementKind::StockIn | MovementKind::Return => Direction::Inbound,
        MovementKind::StockOut | MovementKind::Damage | MovementKind::Transfer => {
            Direction::Outbound
        }
        MovementKind::Adjustment => current.levels().direction_to(&next),
    };
    match direction {
        Direction::Inbound => updated.last_stock_in = Some(now),
        Direction::Outbound => updated.last_stock_out = Some(now),
        Direction::Unchanged => {}
    }

    tx.update_stock_item(&updated).await?;
    let movement = ledger_row(&updated, kind, quantity, ctx, now);
    tx.append_movement(&movement).await?;

    let mut new_values = snapshot(&updated);
    new_values["movementType"] = json!(kind.as_str());
    new_values["movementId"] = json!(movement.id);
    tx.append_audit(&AuditEntry::stock_item(
        &ctx.performed_by,
        "STOCK_MOVEMENT",
        updated.id,
        Some(snapshot(current)),
        Some(new_values),
        now,
    ))
    .await?;

    Ok((updated, movement))
}

pub(super) fn ledger_row(
    item: &StockItem,
    kind: MovementKind,
    quantity: i32,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4(),
        stock_item_id: item.id,
        movement_type: kind,
        quantity,
        reference_type: ctx.reference_type.clone(),
        reference_id: ctx.reference_id.clone(),
        reason: ctx.reason.clone(),
        notes: ctx.notes.clone(),
        performed_by: ctx.performed_by.clone(),
        created_at: now,
    }
}

fn with_default_reference(
    ctx: &MovementContext,
    reference_type: &str,
    reference_id: Option<String>,
) -> MovementContext {
    let mut ctx = ctx.clone();
    if ctx.reference_type.is_none() {
        ctx.reference_type = Some(reference_type.to_string());
        if ctx.reference_id.is_none() {
            ctx.reference_id = reference_id;
        }
    }
    ctx
}

fn snapshot(item: &StockItem) -> Value {
    json!({
        "quantity": item.quantity,
        "availableQuantity": item.available_quantity,
        "reservedQuantity": item.reserved_quantity,
    })
}
