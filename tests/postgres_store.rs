//! Store tests against a real PostgreSQL database.
//!
//! Ignored by default. Run with `DATABASE_URL` set:
//! `cargo test --test postgres_store -- --ignored`

use std::sync::Arc;

use sjf_stock_ledger::database::{create_pool, run_migrations};
use sjf_stock_ledger::error::AppError;
use sjf_stock_ledger::inventory::{
    MovementCommand, MovementContext, MovementEngine, ProvisionOrigin, Scope,
};
use sjf_stock_ledger::models::stock_item::NewStockItem;
use sjf_stock_ledger::models::{StockItem, StockKey};
use sjf_stock_ledger::store::{InventoryStore, InventoryTx, PgInventoryStore};
use sqlx::PgPool;
use uuid::Uuid;

struct Seeded {
    pool: PgPool,
    engine: MovementEngine,
    product_id: Uuid,
    main_id: Uuid,
    overflow_id: Uuid,
}

async fn seeded() -> Seeded {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    let pool = create_pool(&url, 20).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let merchant_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, merchant_id, name, sku) VALUES ($1, $2, $3, $4)")
        .bind(product_id)
        .bind(merchant_id)
        .bind("Ceylon Tea 400g")
        .bind(format!("TEA-{product_id}"))
        .execute(&pool)
        .await
        .unwrap();

    // merchant-owned so the shared warehouse code index is left alone
    let mut warehouse_ids = Vec::new();
    for code in ["MAIN", "OVERFLOW"] {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO warehouses (id, merchant_id, name, code, address) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(merchant_id)
        .bind(format!("{code} warehouse"))
        .bind(code)
        .bind("Colombo")
        .execute(&pool)
        .await
        .unwrap();
        warehouse_ids.push(id);
    }

    let engine = MovementEngine::new(Arc::new(PgInventoryStore::new(pool.clone())));
    Seeded {
        pool,
        engine,
        product_id,
        main_id: warehouse_ids[0],
        overflow_id: warehouse_ids[1],
    }
}

impl Seeded {
    async fn stock_item(&self, warehouse_id: Uuid, batch: Option<&str>, quantity: i32) -> StockItem {
        let key = StockKey::new(self.product_id, warehouse_id, batch.map(str::to_string));
        let (item, _) = self
            .engine
            .create_stock_item(&Scope::Global, NewStockItem::new(key, quantity), "pg-test")
            .await
            .unwrap();
        item
    }

    async fn movement_count(&self, stock_item_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements WHERE stock_item_id = $1")
            .bind(stock_item_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn row_locks_serialise_concurrent_issues() {
    let db = seeded().await;
    let item = db.stock_item(db.main_id, None, 100).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let engine = db.engine.clone();
            tokio::spawn(async move {
                engine
                    .apply(
                        &Scope::Global,
                        item.id,
                        MovementCommand::StockOut(10),
                        MovementContext::new("pg-test").reason("order"),
                    )
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(AppError::InsufficientStock(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(applied, 10);
    let after = db.engine.get_stock_item(&Scope::Global, item.id).await.unwrap();
    assert_eq!(after.quantity, 0);
    assert_eq!(after.available_quantity, 0);
    assert_eq!(db.movement_count(item.id).await, 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn opposite_transfers_lock_in_id_order() {
    let db = seeded().await;
    let left = db.stock_item(db.main_id, None, 100).await;
    let right = db.stock_item(db.overflow_id, None, 100).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        for (from, to, quantity) in [(left.id, db.overflow_id, 7), (right.id, db.main_id, 5)] {
            let engine = db.engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .apply(
                        &Scope::Global,
                        from,
                        MovementCommand::Transfer {
                            quantity,
                            target_warehouse_id: to,
                        },
                        MovementContext::new("pg-test").reason("rebalance"),
                    )
                    .await
            }));
        }
    }
    for handle in handles {
        // a lock-order deadlock would surface here as a database error
        handle.await.unwrap().unwrap();
    }

    let left_after = db.engine.get_stock_item(&Scope::Global, left.id).await.unwrap();
    let right_after = db.engine.get_stock_item(&Scope::Global, right.id).await.unwrap();
    assert_eq!(left_after.quantity, 80);
    assert_eq!(right_after.quantity, 120);
    assert_eq!(db.movement_count(left.id).await, 21);
    assert_eq!(db.movement_count(right.id).await, 21);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn blank_and_missing_batch_share_one_key() {
    let db = seeded().await;
    let unbatched = db.stock_item(db.main_id, None, 5).await;

    let store = PgInventoryStore::new(db.pool.clone());
    let mut tx = store.begin().await.unwrap();
    let blank = StockItem {
        id: Uuid::new_v4(),
        batch_number: Some(String::new()),
        ..unbatched.clone()
    };
    assert!(!tx.insert_stock_item(&blank).await.unwrap());
    drop(tx);

    let err = db
        .engine
        .create_stock_item(
            &Scope::Global,
            NewStockItem::new(StockKey::new(db.product_id, db.main_id, None), 1),
            "pg-test",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let lot = db.stock_item(db.main_id, Some("LOT-1"), 3).await;
    assert_eq!(lot.batch_number.as_deref(), Some("LOT-1"));
    assert_ne!(lot.id, unbatched.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_ensures_converge_on_one_item() {
    let db = seeded().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = db.engine.clone();
            let product_id = db.product_id;
            tokio::spawn(async move {
                engine
                    .ensure_product_stock_item(
                        &Scope::Global,
                        product_id,
                        4,
                        ProvisionOrigin::InitialStock,
                        "pg-test",
                    )
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut ids = Vec::new();
    for handle in handles {
        let provisioned = handle.await.unwrap().unwrap();
        created += usize::from(provisioned.created);
        ids.push(provisioned.stock_item.id);
    }
    assert_eq!(created, 1);
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_items WHERE product_id = $1")
        .bind(db.product_id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
