mod common;

use assert_matches::assert_matches;
use stockroom_api::entities::{DocumentStatus, MovementKind};
use stockroom_api::errors::ServiceError;
use stockroom_api::services::adjustments::NewAdjustment;

#[tokio::test]
async fn zero_difference_count_still_writes_a_movement() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "BOLT-01").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;
    common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 20)]).await;

    let adjustment = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: warehouse.id,
                rack_location: "A-01".to_string(),
                actual_quantity: 20,
                reason: Some("cycle count".to_string()),
            },
            ctx.actor,
        )
        .await
        .unwrap();
    assert_eq!(adjustment.adjustment_number, "ADJ-00001");
    assert_eq!(adjustment.system_quantity, 20);

    let validated = ctx
        .services
        .adjustments
        .validate(adjustment.id, ctx.actor)
        .await
        .unwrap();
    assert_eq!(validated.status, DocumentStatus::Done.as_str());

    // The count is proven by a zero-change ledger entry
    let movements = ctx
        .services
        .movements
        .for_reference("stock_adjustment", adjustment.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind(), Some(MovementKind::Adjustment));
    assert_eq!(movements[0].quantity_before, 20);
    assert_eq!(movements[0].quantity_change, 0);
    assert_eq!(movements[0].quantity_after, 20);

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("A-01"), Some(&20));
}

#[tokio::test]
async fn counting_down_records_the_negative_difference() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "BOLT-02").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;
    common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 20)]).await;

    let adjustment = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: warehouse.id,
                rack_location: "A-01".to_string(),
                actual_quantity: 8,
                reason: Some("damaged units scrapped".to_string()),
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

    let movements = ctx
        .services
        .movements
        .for_reference("stock_adjustment", adjustment.id)
        .await
        .unwrap();
    assert_eq!(movements[0].quantity_before, 20);
    assert_eq!(movements[0].quantity_change, -12);
    assert_eq!(movements[0].quantity_after, 8);

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("A-01"), Some(&8));
}

#[tokio::test]
async fn counting_an_empty_rack_creates_it() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "BOLT-03").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let adjustment = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: warehouse.id,
                rack_location: "Z-09".to_string(),
                actual_quantity: 15,
                reason: None,
            },
            ctx.actor,
        )
        .await
        .unwrap();
    assert_eq!(adjustment.system_quantity, 0);

    ctx.services
        .adjustments
        .validate(adjustment.id, ctx.actor)
        .await
        .unwrap();

    let movements = ctx
        .services
        .movements
        .for_reference("stock_adjustment", adjustment.id)
        .await
        .unwrap();
    assert_eq!(movements[0].quantity_before, 0);
    assert_eq!(movements[0].quantity_change, 15);

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("Z-09"), Some(&15));
}

#[tokio::test]
async fn stale_draft_recomputes_against_fresh_system_quantity() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "BOLT-04").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;
    common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 20)]).await;

    // Draft sees 20 on record
    let adjustment = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: warehouse.id,
                rack_location: "A-01".to_string(),
                actual_quantity: 20,
                reason: Some("count before restock".to_string()),
            },
            ctx.actor,
        )
        .await
        .unwrap();
    assert_eq!(adjustment.system_quantity, 20);

    // More goods arrive at the same rack before the draft validates
    common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 5)]).await;

    let validated = ctx
        .services
        .adjustments
        .validate(adjustment.id, ctx.actor)
        .await
        .unwrap();

    // The difference is taken against the fresh 25, not the stale 20,
    // keeping the per-key chain unbroken
    let movements = ctx
        .services
        .movements
        .for_reference("stock_adjustment", adjustment.id)
        .await
        .unwrap();
    assert_eq!(movements[0].quantity_before, 25);
    assert_eq!(movements[0].quantity_change, -5);
    assert_eq!(movements[0].quantity_after, 20);
    assert_eq!(validated.system_quantity, 25);

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("A-01"), Some(&20));
}

#[tokio::test]
async fn negative_counts_and_terminal_statuses_are_rejected() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "BOLT-05").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let err = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: warehouse.id,
                rack_location: "A-01".to_string(),
                actual_quantity: -1,
                reason: None,
            },
            ctx.actor,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let adjustment = ctx
        .services
        .adjustments
        .create(
            NewAdjustment {
                product_id: product.id,
                warehouse_id: warehouse.id,
                rack_location: "A-01".to_string(),
                actual_quantity: 4,
                reason: None,
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

    let err = ctx
        .services
        .adjustments
        .validate(adjustment.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    let err = ctx
        .services
        .adjustments
        .cancel(adjustment.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}
