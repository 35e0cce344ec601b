// src/store/postgres.rs
// PostgreSQL inventory store.
//
// Row locks are taken with `SELECT ... FOR UPDATE` inside the transaction that
// performs the write, so concurrent movements against one stock item serialise
// on the row rather than racing read-then-write.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{InventoryStore, InventoryTx, Page, PageRequest, StockItemFilter};
use crate::error::AppError;
use crate::models::{
    ApiKey, ApiRequestLog, AuditEntry, MovementKind, Product, StockItem, StockKey, StockMovement,
    Warehouse,
};

const STOCK_ITEM_COLUMNS: &str = "si.id, si.product_id, si.warehouse_id, si.quantity, \
     si.available_quantity, si.reserved_quantity, si.reorder_level, si.max_stock_level, \
     si.batch_number, si.expiry_date, si.cost_price, si.last_stock_in, si.last_stock_out, \
     si.created_at, si.updated_at";

const MOVEMENT_COLUMNS: &str = "id, stock_item_id, movement_type, quantity, reference_type, \
     reference_id, reason, notes, performed_by, created_at";

const PRODUCT_COLUMNS: &str = "id, merchant_id, name, sku, is_active";

const WAREHOUSE_COLUMNS: &str =
    "id, merchant_id, name, code, address, capacity, is_active, created_at";

#[derive(Clone)]
pub struct PgInventoryStore {
    db_pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn push_stock_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &StockItemFilter) {
    if let Some(product_id) = filter.product_id {
        builder.push(" AND si.product_id = ").push_bind(product_id);
    }
    if let Some(warehouse_id) = filter.warehouse_id {
        builder.push(" AND si.warehouse_id = ").push_bind(warehouse_id);
    }
    if let Some(merchant_id) = filter.merchant_id {
        builder.push(" AND p.merchant_id = ").push_bind(merchant_id);
    }
    if filter.low_stock {
        builder.push(" AND si.quantity <= si.reorder_level");
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, AppError> {
        let tx = self.db_pool.begin().await?;
        Ok(Box::new(PgInventoryTx { tx }))
    }

    async fn get_stock_item(&self, id: Uuid) -> Result<Option<StockItem>, AppError> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items si WHERE si.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(item)
    }

    async fn list_stock_items(
        &self,
        filter: &StockItemFilter,
        page: PageRequest,
    ) -> Result<Page<StockItem>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM stock_items si JOIN products p ON p.id = si.product_id WHERE 1=1",
        );
        push_stock_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.db_pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items si \
             JOIN products p ON p.id = si.product_id WHERE 1=1"
        ));
        push_stock_filter(&mut select, filter);
        select
            .push(" ORDER BY si.updated_at DESC, si.id LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let items = select
            .build_query_as::<StockItem>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    async fn list_movements(
        &self,
        stock_item_id: Uuid,
        kind: Option<MovementKind>,
        limit: u32,
    ) -> Result<Vec<StockMovement>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements
             WHERE stock_item_id = $1 AND ($2::stock_movement_type IS NULL OR movement_type = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(stock_item_id)
        .bind(kind)
        .bind(i64::from(limit))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(movements)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(product)
    }

    async fn find_warehouse(&self, id: Uuid) -> Result<Option<Warehouse>, AppError> {
        let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(warehouse)
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT id, merchant_id, name, key_hash, is_active FROM api_keys WHERE key_hash = $1",
        )
        .bind(key_hash)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(key)
    }

    async fn record_api_request(&self, entry: &ApiRequestLog) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO api_request_logs
               (id, api_key_id, endpoint, method, status_code, latency_ms,
                request_body, response_body, error, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(entry.id)
        .bind(entry.api_key_id)
        .bind(&entry.endpoint)
        .bind(&entry.method)
        .bind(entry.status_code)
        .bind(entry.latency_ms)
        .bind(&entry.request_body)
        .bind(&entry.response_body)
        .bind(&entry.error)
        .bind(entry.created_at)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }
}

pub struct PgInventoryTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryTx for PgInventoryTx {
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn find_warehouse(&mut self, id: Uuid) -> Result<Option<Warehouse>, AppError> {
        let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(warehouse)
    }

    async fn earliest_active_warehouse(
        &mut self,
        merchant_id: Option<Uuid>,
    ) -> Result<Option<Warehouse>, AppError> {
        let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses
             WHERE is_active AND ($1::uuid IS NULL OR merchant_id = $1)
             ORDER BY created_at ASC, id ASC
             LIMIT 1"
        ))
        .bind(merchant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(warehouse)
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"INSERT INTO warehouses
               (id, merchant_id, name, code, address, capacity, is_active, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(warehouse.id)
        .bind(warehouse.merchant_id)
        .bind(&warehouse.name)
        .bind(&warehouse.code)
        .bind(&warehouse.address)
        .bind(warehouse.capacity)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_stock_item(&mut self, id: Uuid) -> Result<Option<StockItem>, AppError> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items si WHERE si.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn find_stock_item_by_key(
        &mut self,
        key: &StockKey,
    ) -> Result<Option<StockItem>, AppError> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items si
             WHERE si.product_id = $1 AND si.warehouse_id = $2
               AND si.batch_number IS NOT DISTINCT FROM $3"
        ))
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .bind(&key.batch_number)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn first_stock_item_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Option<StockItem>, AppError> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items si
             WHERE si.product_id = $1
             ORDER BY si.created_at ASC, si.id ASC
             LIMIT 1"
        ))
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn lock_stock_items(&mut self, ids: &[Uuid]) -> Result<Vec<StockItem>, AppError> {
        // ORDER BY id fixes the lock acquisition order across transactions
        let items = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items si
             WHERE si.id = ANY($1)
             ORDER BY si.id
             FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn insert_stock_item(&mut self, item: &StockItem) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"INSERT INTO stock_items
               (id, product_id, warehouse_id, quantity, available_quantity, reserved_quantity,
                reorder_level, max_stock_level, batch_number, expiry_date, cost_price,
                last_stock_in, last_stock_out, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(item.id)
        .bind(item.product_id)
        .bind(item.warehouse_id)
        .bind(item.quantity)
        .bind(item.available_quantity)
        .bind(item.reserved_quantity)
        .bind(item.reorder_level)
        .bind(item.max_stock_level)
        .bind(&item.batch_number)
        .bind(item.expiry_date)
        .bind(item.cost_price)
        .bind(item.last_stock_in)
        .bind(item.last_stock_out)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_stock_item(&mut self, item: &StockItem) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE stock_items
               SET quantity = $2,
                   available_quantity = $3,
                   reserved_quantity = $4,
                   last_stock_in = $5,
                   last_stock_out = $6,
                   updated_at = $7
               WHERE id = $1"#,
        )
        .bind(item.id)
        .bind(item.quantity)
        .bind(item.available_quantity)
        .bind(item.reserved_quantity)
        .bind(item.last_stock_in)
        .bind(item.last_stock_out)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::internal(format!(
                "stock item {} vanished during update",
                item.id
            )));
        }
        Ok(())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO stock_movements
               (id, stock_item_id, movement_type, quantity, reference_type, reference_id,
                reason, notes, performed_by, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(movement.id)
        .bind(movement.stock_item_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(&movement.reference_type)
        .bind(&movement.reference_id)
        .bind(&movement.reason)
        .bind(&movement.notes)
        .bind(&movement.performed_by)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO audit_logs
               (id, user_id, action, entity_type, entity_id, old_values, new_values, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
