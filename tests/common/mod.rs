#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use stockroom_api::db::{self, DbConfig, DbPool};
use stockroom_api::entities::{product, receipt, warehouse};
use stockroom_api::events::{process_events, EventSender};
use stockroom_api::services::products::NewProduct;
use stockroom_api::services::receipts::{NewReceipt, NewReceiptLine};
use stockroom_api::services::warehouses::NewWarehouse;
use stockroom_api::services::AppServices;

pub struct TestContext {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub actor: Uuid,
}

/// Fresh in-memory database per test. A single pooled connection keeps the
/// database alive for the whole test and sidesteps SQLite shared-cache
/// lock errors; concurrency tests still run their tasks concurrently, the
/// pool just serializes the physical writes like any single-writer store.
pub async fn setup() -> TestContext {
    let config = DbConfig {
        url: format!(
            "sqlite:file:stockroom_test_{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        ),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&config)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(pool);
    let (tx, rx) = mpsc::channel(1024);
    tokio::spawn(process_events(rx));
    let services = AppServices::new(db.clone(), EventSender::new(tx), 3);

    TestContext {
        db,
        services,
        actor: Uuid::new_v4(),
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub async fn create_product(ctx: &TestContext, sku: &str) -> product::Model {
    ctx.services
        .products
        .create(NewProduct {
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            description: None,
            unit_of_measure: "pcs".to_string(),
            reorder_level: 0,
            reorder_quantity: 0,
        })
        .await
        .expect("create product")
}

pub async fn create_warehouse(ctx: &TestContext, name: &str) -> warehouse::Model {
    ctx.services
        .warehouses
        .create(NewWarehouse {
            name: name.to_string(),
        })
        .await
        .expect("create warehouse")
}

/// Books stock in through the front door: a validated receipt, so the
/// ledger stays consistent with the quantities the test observes.
pub async fn seed_stock(
    ctx: &TestContext,
    product_id: Uuid,
    warehouse_id: Uuid,
    racks: &[(&str, i64)],
) -> receipt::Model {
    let input = NewReceipt {
        supplier_name: "Seed Supplier".to_string(),
        warehouse_id,
        scheduled_date: today(),
        notes: None,
        lines: racks
            .iter()
            .map(|(rack, quantity)| NewReceiptLine {
                product_id,
                quantity: *quantity,
                rack_location: rack.to_string(),
            })
            .collect(),
    };
    let receipt = ctx
        .services
        .receipts
        .create(input, ctx.actor)
        .await
        .expect("create seed receipt");
    ctx.services
        .receipts
        .validate(receipt.id, ctx.actor)
        .await
        .expect("validate seed receipt")
}

/// Rack label -> quantity for one product in one warehouse.
pub async fn stock_map(
    ctx: &TestContext,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> HashMap<String, i64> {
    ctx.services
        .stock
        .query(Some(product_id), Some(warehouse_id))
        .await
        .expect("query stock")
        .into_iter()
        .map(|row| (row.rack_location, row.quantity))
        .collect()
}
