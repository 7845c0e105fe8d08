mod common;

use assert_matches::assert_matches;
use stockroom_api::entities::{DocumentStatus, MovementKind};
use stockroom_api::errors::ServiceError;
use stockroom_api::services::transfers::{NewTransfer, NewTransferLine};
use uuid::Uuid;

fn transfer_input(from: Uuid, to: Uuid, lines: Vec<NewTransferLine>) -> NewTransfer {
    NewTransfer {
        from_warehouse_id: from,
        to_warehouse_id: to,
        scheduled_date: common::today(),
        notes: None,
        lines,
    }
}

#[tokio::test]
async fn transfer_moves_stock_as_a_coupled_pair() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "PART-01").await;
    let source = common::create_warehouse(&ctx, "Source").await;
    let destination = common::create_warehouse(&ctx, "Destination").await;
    common::seed_stock(&ctx, product.id, source.id, &[("A", 30), ("B", 10)]).await;

    let transfer = ctx
        .services
        .transfers
        .create(
            transfer_input(
                source.id,
                destination.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    quantity: 35,
                    to_rack_location: "R-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();
    assert_eq!(transfer.transfer_number, "TRF-00001");

    let validated = ctx
        .services
        .transfers
        .validate(transfer.id, ctx.actor)
        .await
        .unwrap();
    assert_eq!(validated.status, DocumentStatus::Done.as_str());
    assert!(validated.completed_date.is_some());

    let source_stock = common::stock_map(&ctx, product.id, source.id).await;
    assert_eq!(source_stock.get("A"), Some(&0));
    assert_eq!(source_stock.get("B"), Some(&5));

    let dest_stock = common::stock_map(&ctx, product.id, destination.id).await;
    assert_eq!(dest_stock.get("R-01"), Some(&35));

    // Two outbound movements (A then B) and one inbound, sharing the number
    let movements = ctx
        .services
        .movements
        .for_reference("internal_transfer", transfer.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);
    assert!(movements
        .iter()
        .all(|m| m.reference_number == "TRF-00001"));

    let outs: Vec<_> = movements
        .iter()
        .filter(|m| m.kind() == Some(MovementKind::TransferOut))
        .collect();
    let ins: Vec<_> = movements
        .iter()
        .filter(|m| m.kind() == Some(MovementKind::TransferIn))
        .collect();
    assert_eq!(outs.len(), 2);
    assert_eq!(ins.len(), 1);
    assert_eq!(outs.iter().map(|m| m.quantity_change).sum::<i64>(), -35);
    assert_eq!(ins[0].quantity_change, 35);
    assert_eq!(ins[0].warehouse_id, destination.id);
    assert_eq!(ins[0].rack_location, "R-01");

    let (_, lines) = ctx.services.transfers.get(transfer.id).await.unwrap();
    assert_eq!(lines[0].transferred_quantity, 35);
}

#[tokio::test]
async fn insufficient_source_stock_fails_without_any_movement() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "PART-02").await;
    let source = common::create_warehouse(&ctx, "Source").await;
    let destination = common::create_warehouse(&ctx, "Destination").await;
    common::seed_stock(&ctx, product.id, source.id, &[("A", 8)]).await;

    let transfer = ctx
        .services
        .transfers
        .create(
            transfer_input(
                source.id,
                destination.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    quantity: 9,
                    to_rack_location: "R-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();

    let err = ctx
        .services
        .transfers
        .validate(transfer.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Neither side moved: no orphan transfer_out, no transfer_in
    let source_stock = common::stock_map(&ctx, product.id, source.id).await;
    assert_eq!(source_stock.get("A"), Some(&8));
    let dest_stock = common::stock_map(&ctx, product.id, destination.id).await;
    assert!(dest_stock.is_empty());

    let movements = ctx
        .services
        .movements
        .for_reference("internal_transfer", transfer.id)
        .await
        .unwrap();
    assert!(movements.is_empty());
}

#[tokio::test]
async fn transfer_between_same_warehouse_is_rejected() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "PART-03").await;
    let warehouse = common::create_warehouse(&ctx, "Main").await;

    let err = ctx
        .services
        .transfers
        .create(
            transfer_input(
                warehouse.id,
                warehouse.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    quantity: 1,
                    to_rack_location: "R-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn cancelled_transfer_is_inert() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "PART-04").await;
    let source = common::create_warehouse(&ctx, "Source").await;
    let destination = common::create_warehouse(&ctx, "Destination").await;
    common::seed_stock(&ctx, product.id, source.id, &[("A", 8)]).await;

    let transfer = ctx
        .services
        .transfers
        .create(
            transfer_input(
                source.id,
                destination.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    quantity: 3,
                    to_rack_location: "R-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();

    let cancelled = ctx
        .services
        .transfers
        .cancel(transfer.id, ctx.actor)
        .await
        .unwrap();
    assert_eq!(cancelled.status, DocumentStatus::Cancelled.as_str());

    let err = ctx
        .services
        .transfers
        .validate(transfer.id, ctx.actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    let source_stock = common::stock_map(&ctx, product.id, source.id).await;
    assert_eq!(source_stock.get("A"), Some(&8));
}

#[tokio::test]
async fn transfer_into_existing_destination_rack_chains_quantities() {
    let ctx = common::setup().await;
    let product = common::create_product(&ctx, "PART-05").await;
    let source = common::create_warehouse(&ctx, "Source").await;
    let destination = common::create_warehouse(&ctx, "Destination").await;
    common::seed_stock(&ctx, product.id, source.id, &[("A", 20)]).await;
    common::seed_stock(&ctx, product.id, destination.id, &[("R-01", 7)]).await;

    let transfer = ctx
        .services
        .transfers
        .create(
            transfer_input(
                source.id,
                destination.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    quantity: 5,
                    to_rack_location: "R-01".to_string(),
                }],
            ),
            ctx.actor,
        )
        .await
        .unwrap();
    ctx.services
        .transfers
        .validate(transfer.id, ctx.actor)
        .await
        .unwrap();

    let dest_stock = common::stock_map(&ctx, product.id, destination.id).await;
    assert_eq!(dest_stock.get("R-01"), Some(&12));

    let movements = ctx
        .services
        .movements
        .for_reference("internal_transfer", transfer.id)
        .await
        .unwrap();
    let transfer_in = movements
        .iter()
        .find(|m| m.kind() == Some(MovementKind::TransferIn))
        .unwrap();
    assert_eq!(transfer_in.quantity_before, 7);
    assert_eq!(transfer_in.quantity_after, 12);
}
