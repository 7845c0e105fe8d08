mod common;

use std::collections::HashSet;

use stockroom_api::entities::MovementKind;
use stockroom_api::services::adjustments::NewAdjustment;
use stockroom_api::services::deliveries::{NewDelivery, NewDeliveryLine};
use stockroom_api::services::transfers::{NewTransfer, NewTransferLine};
use uuid::Uuid;

/// Runs receipts, a delivery, a transfer, and an adjustment, then checks
/// the two ledger laws on every touched key.
#[tokio::test]
async fn ledger_chains_and_reconciles_after_mixed_workload() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "LEDGER-01").await;
    let main = common::create_warehouse(&ctx, "Main").await;
    let annex = common::create_warehouse(&ctx, "Annex").await;

    common::seed_stock(&ctx, product.id, main.id, &[("A", 40), ("B", 15)]).await;
    common::seed_stock(&ctx, product.id, main.id, &[("A", 10)]).await;

    let delivery = ctx
        .services
        .deliveries
        .create(
            NewDelivery {
                customer_name: "Customer".to_string(),
                warehouse_id: main.id,
                scheduled_date: common::today(),
                notes: None,
                lines: vec![NewDeliveryLine {
                    product_id: product.id,
                    quantity: 42,
                }],
            },
            ctx.actor,
        )
        .await
        .unwrap();
    ctx.services
        .deliveries
        .validate(delivery.id, ctx.actor)
        .await
        .unwrap();

    let transfer = ctx
        .services
        .transfers
        .create(
            NewTransfer {
                from_warehouse_id: main.id,
                to_warehouse_id: annex.id,
                scheduled_date: common::today(),
                notes: None,
                lines: vec![NewTransferLine {
                    product_id: product.id,
                    quantity: 10,
                    to_rack_location: "R-01".to_string(),
                }],
            },
            ctx.actor,
        )
        .await
        .unwrap();
    ctx.services
        .transfers
        .validate(transfer.id, ctx.actor)
        .await
        .unwrap();

    let adjustment = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: annex.id,
                rack_location: "R-01".to_string(),
                actual_quantity: 9,
                reason: Some("one unit damaged in transit".to_string()),
            },
            ctx.actor,
        )
        .await
        .unwrap();
    ctx.services
        .adjustments
        .validate(adjustment.id, ctx.actor)
        .await
        .unwrap();

    // Collect every key the workload touched
    let mut keys: HashSet<(Uuid, Uuid, String)> = HashSet::new();
    for warehouse_id in [main.id, annex.id] {
        for row in ctx
            .services
            .stock
            .query(Some(product.id), Some(warehouse_id))
            .await
            .unwrap()
        {
            keys.insert((row.product_id, row.warehouse_id, row.rack_location));
        }
    }
    assert!(!keys.is_empty());

    for (product_id, warehouse_id, rack) in keys {
        let history = ctx
            .services
            .movements
            .history_for_key(product_id, warehouse_id, &rack, 1000, 0)
            .await
            .unwrap();
        assert!(!history.is_empty());

        // Chaining law: each entry starts where the previous one ended
        let mut expected_before = 0;
        for entry in &history {
            assert_eq!(
                entry.quantity_before, expected_before,
                "broken chain at rack {} entry {}",
                rack, entry.id
            );
            assert_eq!(
                entry.quantity_after,
                entry.quantity_before + entry.quantity_change
            );
            expected_before = entry.quantity_after;
        }

        // Reconciliation law: history sums to the current quantity
        let total: i64 = history.iter().map(|m| m.quantity_change).sum();
        let current = ctx
            .services
            .stock
            .quantity_at(product_id, warehouse_id, &rack)
            .await
            .unwrap();
        assert_eq!(total, current, "ledger does not reconcile for rack {}", rack);
    }
}

#[tokio::test]
async fn query_is_idempotent_and_restartable() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "LEDGER-02").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    for rack in ["A", "B", "C", "D"] {
        common::seed_stock(&ctx, product.id, warehouse.id, &[(rack, 10)]).await;
    }

    let first = ctx.services.movements.query(None, 100, 0).await.unwrap();
    let second = ctx.services.movements.query(None, 100, 0).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);

    // Newest first
    for pair in first.windows(2) {
        assert!(pair[0].id > pair[1].id);
    }

    // Offset pagination covers the feed without overlap
    let page_one = ctx.services.movements.query(None, 2, 0).await.unwrap();
    let page_two = ctx.services.movements.query(None, 2, 2).await.unwrap();
    assert_eq!(page_one.len(), 2);
    assert_eq!(page_two.len(), 2);
    let mut paged: Vec<i64> = page_one.iter().chain(page_two.iter()).map(|m| m.id).collect();
    let mut all: Vec<i64> = first.iter().map(|m| m.id).collect();
    paged.sort();
    all.sort();
    assert_eq!(paged, all);
}

#[tokio::test]
async fn kind_filter_narrows_the_feed() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "LEDGER-03").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    common::seed_stock(&ctx, product.id, warehouse.id, &[("A", 30)]).await;

    let delivery = ctx
        .services
        .deliveries
        .create(
            NewDelivery {
                customer_name: "Customer".to_string(),
                warehouse_id: warehouse.id,
                scheduled_date: common::today(),
                notes: None,
                lines: vec![NewDeliveryLine {
                    product_id: product.id,
                    quantity: 12,
                }],
            },
            ctx.actor,
        )
        .await
        .unwrap();
    ctx.services
        .deliveries
        .validate(delivery.id, ctx.actor)
        .await
        .unwrap();

    let receipts = ctx
        .services
        .movements
        .query(Some(MovementKind::Receipt), 100, 0)
        .await
        .unwrap();
    assert_eq!(receipts.len(), 1);
    assert!(receipts
        .iter()
        .all(|m| m.kind() == Some(MovementKind::Receipt)));

    let deliveries = ctx
        .services
        .movements
        .query(Some(MovementKind::Delivery), 100, 0)
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].quantity_change, -12);

    let adjustments = ctx
        .services
        .movements
        .query(Some(MovementKind::Adjustment), 100, 0)
        .await
        .unwrap();
    assert!(adjustments.is_empty());
}
