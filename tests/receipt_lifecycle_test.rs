mod common;

use assert_matches::assert_matches;
use stockroom_api::entities::{DocumentStatus, MovementKind};
use stockroom_api::errors::ServiceError;
use stockroom_api::services::receipts::{NewReceipt, NewReceiptLine};
use uuid::Uuid;

fn receipt_input(warehouse_id: Uuid, lines: Vec<NewReceiptLine>) -> NewReceipt {
    NewReceipt {
        supplier_name: "Acme Components".to_string(),
        warehouse_id,
        scheduled_date: common::today(),
        notes: Some("dock 3".to_string()),
        lines,
    }
}

#[tokio::test]
async fn receipt_validation_books_stock_and_ledger() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-01").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let created = ctx
        .services
        .receipts
        .create(
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 40,
                    rack_location: "A-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();

    assert_eq!(created.receipt_number, "REC-00001");
    assert_eq!(created.status, DocumentStatus::Draft.as_str());
    assert!(created.received_date.is_none());

    let validated = ctx
        .services
        .receipts
        .validate(created.id, ctx.actor)
        .await
        .unwrap();
    assert_eq!(validated.status, DocumentStatus::Done.as_str());
    assert!(validated.received_date.is_some());

    let (_, lines) = ctx.services.receipts.get(created.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].received_quantity, 40);

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("A-01"), Some(&40));

    let movements = ctx
        .services
        .movements
        .for_reference("receipt", created.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind(), Some(MovementKind::Receipt));
    assert_eq!(movements[0].reference_number, "REC-00001");
    assert_eq!(movements[0].quantity_before, 0);
    assert_eq!(movements[0].quantity_change, 40);
    assert_eq!(movements[0].quantity_after, 40);
    assert_eq!(movements[0].created_by, ctx.actor);
}

#[tokio::test]
async fn second_receipt_into_same_rack_chains_on_previous_quantity() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-02").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 15)]).await;
    let second = common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 10)]).await;

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("A-01"), Some(&25));

    let movements = ctx
        .services
        .movements
        .for_reference("receipt", second.id)
        .await
        .unwrap();
    assert_eq!(movements[0].quantity_before, 15);
    assert_eq!(movements[0].quantity_after, 25);
}

#[tokio::test]
async fn validating_twice_is_rejected() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-03").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let receipt = common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 5)]).await;

    let err = ctx
        .services
        .receipts
        .validate(receipt.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    // No double booking happened
    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert_eq!(stock.get("A-01"), Some(&5));
}

#[tokio::test]
async fn done_receipt_cannot_be_edited_or_cancelled() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-04").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let receipt = common::seed_stock(&ctx, product.id, warehouse.id, &[("A-01", 5)]).await;

    let err = ctx
        .services
        .receipts
        .update(
            receipt.id,
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 1,
                    rack_location: "A-02".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    let err = ctx
        .services
        .receipts
        .cancel(receipt.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn cancelled_receipt_never_touches_stock() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-05").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let created = ctx
        .services
        .receipts
        .create(
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 9,
                    rack_location: "A-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();

    let cancelled = ctx
        .services
        .receipts
        .cancel(created.id, ctx.actor)
        .await
        .unwrap();
    assert_eq!(cancelled.status, DocumentStatus::Cancelled.as_str());

    let stock = common::stock_map(&ctx, product.id, warehouse.id).await;
    assert!(stock.is_empty());

    let err = ctx
        .services
        .receipts
        .validate(created.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn draft_can_be_edited_and_lines_are_replaced() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-06").await;
    let other = common::create_product(&ctx, "WIDGET-07").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let created = ctx
        .services
        .receipts
        .create(
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 9,
                    rack_location: "A-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();

    ctx.services
        .receipts
        .update(
            created.id,
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: other.id,
                    quantity: 3,
                    rack_location: "B-07".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();

    let (header, lines) = ctx.services.receipts.get(created.id).await.unwrap();
    // Number survives edits
    assert_eq!(header.receipt_number, "REC-00001");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, other.id);
    assert_eq!(lines[0].quantity, 3);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_anything_commits() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "WIDGET-08").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    // Empty line list
    let err = ctx
        .services
        .receipts
        .create(receipt_input(warehouse.id, vec![]), ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Non-positive quantity
    let err = ctx
        .services
        .receipts
        .create(
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 0,
                    rack_location: "A-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Unknown warehouse
    let err = ctx
        .services
        .receipts
        .create(
            receipt_input(
                Uuid::new_v4(),
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 5,
                    rack_location: "A-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // Nothing was numbered: the next document still takes the first ordinal
    let created = ctx
        .services
        .receipts
        .create(
            receipt_input(
                warehouse.id,
                vec![NewReceiptLine {
                    product_id: product.id,
                    quantity: 5,
                    rack_location: "A-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();
    assert_eq!(created.receipt_number, "REC-00001");
}
