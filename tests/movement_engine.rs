mod common;

use common::{assert_levels_consistent, ctx, fixture, PERFORMER};
use sjf_stock_ledger::error::AppError;
use sjf_stock_ledger::inventory::{MovementCommand, Scope};
use sjf_stock_ledger::models::stock_item::NewStockItem;
use sjf_stock_ledger::models::{MovementKind, StockKey};
use sjf_stock_ledger::store::{PageRequest, StockItemFilter};
use uuid::Uuid;

#[tokio::test]
async fn receive_issue_transfer_then_oversell() {
    let fx = fixture().await;
    let source = fx.stock_item(&fx.main, 100).await;

    let out = fx
        .engine
        .apply(&Scope::Global, source.id, MovementCommand::StockOut(30), ctx("order 1"))
        .await
        .unwrap();
    assert_eq!(out.stock_item.quantity, 70);
    assert_eq!(out.stock_item.available_quantity, 70);
    assert!(out.stock_item.last_stock_out.is_some());

    let transfer = fx
        .engine
        .apply(
            &Scope::Global,
            source.id,
            MovementCommand::Transfer {
                quantity: 20,
                target_warehouse_id: fx.overflow.id,
            },
            ctx("rebalance"),
        )
        .await
        .unwrap();
    assert_eq!(transfer.stock_item.quantity, 50);
    assert_eq!(transfer.movement.movement_type, MovementKind::Transfer);
    assert_eq!(transfer.movement.reference_type.as_deref(), Some("TRANSFER_OUT"));
    assert_eq!(
        transfer.movement.reference_id.as_deref(),
        Some(fx.overflow.id.to_string().as_str())
    );

    let leg = transfer.target.expect("transfer has a destination leg");
    assert!(leg.created);
    assert_eq!(leg.stock_item.warehouse_id, fx.overflow.id);
    assert_eq!(leg.stock_item.quantity, 20);
    assert_eq!(leg.stock_item.available_quantity, 20);
    assert_eq!(leg.stock_item.reorder_level, source.reorder_level);
    assert_eq!(leg.movement.movement_type, MovementKind::StockIn);
    assert_eq!(leg.movement.reference_type.as_deref(), Some("TRANSFER_IN"));
    assert_eq!(
        leg.movement.reference_id.as_deref(),
        Some(transfer.movement.id.to_string().as_str())
    );

    let err = fx
        .engine
        .apply(&Scope::Global, source.id, MovementCommand::StockOut(1000), ctx("order 2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(ref m) if m == "Insufficient available stock"));

    let after = fx.reload(source.id).await;
    assert_eq!(after.quantity, 50);
    assert_levels_consistent(&after);

    let kinds: Vec<_> = fx
        .store
        .movements_for(source.id)
        .await
        .into_iter()
        .map(|m| (m.movement_type, m.quantity))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (MovementKind::StockIn, 100),
            (MovementKind::StockOut, 30),
            (MovementKind::Transfer, 20),
        ]
    );
    assert_eq!(fx.store.movements_for(leg.stock_item.id).await.len(), 1);
}

#[tokio::test]
async fn rejected_movement_writes_nothing() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 5).await;
    let audit_before = fx.store.audit_entries().await.len();

    for command in [MovementCommand::StockOut(6), MovementCommand::Damage(6)] {
        let err = fx
            .engine
            .apply(&Scope::Global, item.id, command, ctx("too many"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));
    }

    assert_eq!(fx.reload(item.id).await, item);
    assert_eq!(fx.store.movements_for(item.id).await.len(), 1);
    assert_eq!(fx.store.audit_entries().await.len(), audit_before);
}

#[tokio::test]
async fn adjustment_sets_absolute_quantity_but_not_below_reserved() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 50).await;
    fx.engine
        .reserve(&Scope::Global, item.id, 10, Some("ORD-9".into()), PERFORMER)
        .await
        .unwrap();

    let down = fx
        .engine
        .apply(&Scope::Global, item.id, MovementCommand::Adjustment(30), ctx("cycle count"))
        .await
        .unwrap();
    assert_eq!(down.stock_item.quantity, 30);
    assert_eq!(down.stock_item.available_quantity, 20);
    assert_eq!(down.movement.quantity, 30);
    assert!(down.stock_item.last_stock_out.is_some());

    let err = fx
        .engine
        .apply(&Scope::Global, item.id, MovementCommand::Adjustment(5), ctx("cycle count"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NegativeAvailableStock));

    let after = fx.reload(item.id).await;
    assert_eq!(after.quantity, 30);
    assert_levels_consistent(&after);
}

#[tokio::test]
async fn transfer_into_existing_item_conserves_units() {
    let fx = fixture().await;
    let source = fx.stock_item(&fx.main, 50).await;
    let target = fx.stock_item(&fx.overflow, 7).await;

    let outcome = fx
        .engine
        .apply(
            &Scope::Global,
            source.id,
            MovementCommand::Transfer {
                quantity: 10,
                target_warehouse_id: fx.overflow.id,
            },
            ctx("rebalance"),
        )
        .await
        .unwrap();

    let leg = outcome.target.unwrap();
    assert!(!leg.created);
    assert_eq!(leg.stock_item.id, target.id);
    assert_eq!(outcome.stock_item.quantity + leg.stock_item.quantity, 57);
    assert_eq!(fx.reload(target.id).await.quantity, 17);
}

#[tokio::test]
async fn transfer_checks_destination() {
    let fx = fixture().await;
    let source = fx.stock_item(&fx.main, 10).await;

    let same = fx
        .engine
        .apply(
            &Scope::Global,
            source.id,
            MovementCommand::Transfer {
                quantity: 1,
                target_warehouse_id: fx.main.id,
            },
            ctx("noop"),
        )
        .await
        .unwrap_err();
    assert!(matches!(same, AppError::ValidationError(_)));

    let unknown = fx
        .engine
        .apply(
            &Scope::Global,
            source.id,
            MovementCommand::Transfer {
                quantity: 1,
                target_warehouse_id: Uuid::new_v4(),
            },
            ctx("lost"),
        )
        .await
        .unwrap_err();
    assert!(matches!(unknown, AppError::NotFound(_)));

    let short = fx
        .engine
        .apply(
            &Scope::Global,
            source.id,
            MovementCommand::Transfer {
                quantity: 11,
                target_warehouse_id: fx.overflow.id,
            },
            ctx("too many"),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(short, AppError::InsufficientStock(ref m) if m == "Insufficient available stock for transfer")
    );
    assert_eq!(fx.store.stock_items().await.len(), 1);
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 10).await;

    for command in [
        MovementCommand::StockIn(0),
        MovementCommand::StockOut(-3),
        MovementCommand::Return(0),
    ] {
        let err = fx
            .engine
            .apply(&Scope::Global, item.id, command, ctx("bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity(_)), "{command:?}");
    }
}

#[tokio::test]
async fn receipt_overflow_is_a_validation_error() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 1).await;
    let err = fx
        .engine
        .apply(&Scope::Global, item.id, MovementCommand::StockIn(i32::MAX), ctx("huge"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn merchant_scope_cannot_move_foreign_stock() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 10).await;

    let foreign = Scope::Merchant(Uuid::new_v4());
    let err = fx
        .engine
        .apply(&foreign, item.id, MovementCommand::StockIn(1), ctx("sneaky"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(matches!(
        fx.engine.get_stock_item(&foreign, item.id).await,
        Err(AppError::Forbidden(_))
    ));

    let own = Scope::Merchant(fx.merchant_id);
    let ok = fx
        .engine
        .apply(&own, item.id, MovementCommand::Return(2), ctx("customer return"))
        .await
        .unwrap();
    assert_eq!(ok.stock_item.quantity, 12);
    assert!(ok.stock_item.last_stock_in.is_some());
}

#[tokio::test]
async fn reservations_hold_available_units_without_ledger_rows() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 40).await;

    let reserved = fx
        .engine
        .reserve(&Scope::Global, item.id, 30, None, PERFORMER)
        .await
        .unwrap();
    assert_eq!(reserved.reserved_quantity, 30);
    assert_eq!(reserved.available_quantity, 10);
    assert_levels_consistent(&reserved);

    let err = fx
        .engine
        .apply(&Scope::Global, item.id, MovementCommand::StockOut(20), ctx("order"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(_)));

    let err = fx
        .engine
        .release(&Scope::Global, item.id, 40, None, PERFORMER)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(ref m) if m == "Cannot release more than reserved quantity"));

    let released = fx
        .engine
        .release(&Scope::Global, item.id, 30, None, PERFORMER)
        .await
        .unwrap();
    assert_eq!(released.available_quantity, 40);
    assert_levels_consistent(&released);

    assert_eq!(fx.store.movements_for(item.id).await.len(), 1);
    let actions: Vec<_> = fx
        .store
        .audit_entries()
        .await
        .into_iter()
        .map(|a| a.action)
        .collect();
    assert!(actions.contains(&"STOCK_RESERVE".to_string()));
    assert!(actions.contains(&"STOCK_RELEASE".to_string()));
}

#[tokio::test]
async fn every_movement_leaves_one_ledger_and_audit_row() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 20).await;
    let commands = [
        MovementCommand::StockIn(5),
        MovementCommand::StockOut(3),
        MovementCommand::Damage(2),
        MovementCommand::Return(1),
        MovementCommand::Adjustment(15),
    ];

    for command in commands {
        let outcome = fx
            .engine
            .apply(&Scope::Global, item.id, command, ctx("sequence"))
            .await
            .unwrap();
        assert_eq!(outcome.movement.quantity, command.quantity());
        assert_eq!(outcome.movement.movement_type, command.kind());
        assert_eq!(outcome.movement.performed_by, PERFORMER);
        assert_levels_consistent(&outcome.stock_item);
    }

    // initial receipt plus one row per command
    assert_eq!(fx.store.movements_for(item.id).await.len(), commands.len() + 1);
    let movement_audits = fx
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|a| a.action == "STOCK_MOVEMENT")
        .count();
    assert_eq!(movement_audits, commands.len());
    assert_eq!(fx.reload(item.id).await.quantity, 15);
}

#[tokio::test]
async fn duplicate_key_is_a_conflict() {
    let fx = fixture().await;
    fx.stock_item(&fx.main, 0).await;

    let key = StockKey::new(fx.product.id, fx.main.id, Some("  ".into()));
    let err = fx
        .engine
        .create_stock_item(&Scope::Global, NewStockItem::new(key, 3), PERFORMER)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let batched = StockKey::new(fx.product.id, fx.main.id, Some("LOT-1".into()));
    let (item, movement) = fx
        .engine
        .create_stock_item(&Scope::Global, NewStockItem::new(batched, 3), PERFORMER)
        .await
        .unwrap();
    assert_eq!(item.batch_number.as_deref(), Some("LOT-1"));
    assert_eq!(movement.unwrap().reference_type.as_deref(), Some("INITIAL_STOCK"));
}

#[tokio::test]
async fn listing_honours_scope_and_low_stock() {
    let fx = fixture().await;
    let low = fx.stock_item(&fx.main, 4).await;
    fx.stock_item(&fx.overflow, 80).await;

    let other_merchant = Uuid::new_v4();
    let foreign = common::product(other_merchant, "SKU-X");
    fx.store.insert_product(foreign.clone()).await;
    fx.engine
        .create_stock_item(
            &Scope::Global,
            NewStockItem::new(StockKey::new(foreign.id, fx.main.id, None), 1),
            PERFORMER,
        )
        .await
        .unwrap();

    let all = fx
        .engine
        .list_stock_items(&Scope::Global, StockItemFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.total, 3);

    let mine = fx
        .engine
        .list_stock_items(
            &Scope::Merchant(fx.merchant_id),
            StockItemFilter::default(),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(mine.total, 2);

    let low_only = fx
        .engine
        .list_stock_items(
            &Scope::Merchant(fx.merchant_id),
            StockItemFilter {
                low_stock: true,
                ..StockItemFilter::default()
            },
            PageRequest::new(Some(1), Some(1)),
        )
        .await
        .unwrap();
    assert_eq!(low_only.total, 1);
    assert_eq!(low_only.items[0].id, low.id);
    assert_eq!(low_only.total_pages, 1);
}

#[tokio::test]
async fn history_is_newest_first_and_filterable() {
    let fx = fixture().await;
    let item = fx.stock_item(&fx.main, 10).await;
    for command in [MovementCommand::StockOut(2), MovementCommand::StockIn(4)] {
        fx.engine
            .apply(&Scope::Global, item.id, command, ctx("history"))
            .await
            .unwrap();
    }

    let history = fx
        .engine
        .movement_history(&Scope::Global, item.id, None, 50)
        .await
        .unwrap();
    let kinds: Vec<_> = history.iter().map(|m| (m.movement_type, m.quantity)).collect();
    assert_eq!(
        kinds,
        vec![
            (MovementKind::StockIn, 4),
            (MovementKind::StockOut, 2),
            (MovementKind::StockIn, 10),
        ]
    );

    let outs = fx
        .engine
        .movement_history(&Scope::Global, item.id, Some(MovementKind::StockOut), 50)
        .await
        .unwrap();
    assert_eq!(outs.len(), 1);

    let missing = fx
        .engine
        .movement_history(&Scope::Global, Uuid::new_v4(), None, 50)
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}
