// Ledger core
pub mod adjustments;
pub mod allocation;
pub mod deliveries;
pub mod movements;
pub mod receipts;
pub mod sequences;
pub mod stock;
pub mod transfers;

// Catalog and reporting
pub mod products;
pub mod reports;
pub mod warehouses;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sea_orm::EntityTrait;
use tracing::warn;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::warehouse::{self, Entity as Warehouse};
use crate::entities::DocumentStatus;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Services layer that encapsulates the business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<products::ProductService>,
    pub warehouses: Arc<warehouses::WarehouseService>,
    pub stock: Arc<stock::StockService>,
    pub movements: Arc<movements::MovementService>,
    pub receipts: Arc<receipts::ReceiptService>,
    pub deliveries: Arc<deliveries::DeliveryService>,
    pub transfers: Arc<transfers::TransferService>,
    pub adjustments: Arc<adjustments::AdjustmentService>,
    pub reports: Arc<reports::ReportService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, retry_attempts: u32) -> Self {
        Self {
            products: Arc::new(products::ProductService::new(db_pool.clone())),
            warehouses: Arc::new(warehouses::WarehouseService::new(db_pool.clone())),
            stock: Arc::new(stock::StockService::new(db_pool.clone())),
            movements: Arc::new(movements::MovementService::new(db_pool.clone())),
            receipts: Arc::new(receipts::ReceiptService::new(
                db_pool.clone(),
                event_sender.clone(),
                retry_attempts,
            )),
            deliveries: Arc::new(deliveries::DeliveryService::new(
                db_pool.clone(),
                event_sender.clone(),
                retry_attempts,
            )),
            transfers: Arc::new(transfers::TransferService::new(
                db_pool.clone(),
                event_sender.clone(),
                retry_attempts,
            )),
            adjustments: Arc::new(adjustments::AdjustmentService::new(
                db_pool.clone(),
                event_sender,
                retry_attempts,
            )),
            reports: Arc::new(reports::ReportService::new(db_pool)),
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget runs out. Backoff doubles per attempt with a small random
/// jitter so two colliding validations do not retry in lockstep.
pub(crate) async fn with_contention_retry<T, Fut, F>(
    attempts: u32,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt + 1 < attempts.max(1) => {
                attempt += 1;
                let jitter: u64 = rand::thread_rng().gen_range(0..=20);
                let delay = Duration::from_millis((10u64 << attempt.min(4)) + jitter);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after contention");
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

/// Statuses from which a document may still move (validate or cancel).
pub(crate) fn open_statuses() -> [&'static str; 2] {
    [
        DocumentStatus::Draft.as_str(),
        DocumentStatus::Ready.as_str(),
    ]
}

pub(crate) fn parse_status(raw: &str) -> Result<DocumentStatus, ServiceError> {
    DocumentStatus::from_str(raw)
        .ok_or_else(|| ServiceError::InternalError(format!("unknown document status '{}'", raw)))
}

/// Documents may only reference warehouses that exist and are active.
pub(crate) async fn check_warehouse_active(
    db: &DbPool,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    let wh = Warehouse::find_by_id(warehouse_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("warehouse {}", warehouse_id)))?;
    if !wh.is_active {
        return Err(ServiceError::ValidationError(format!(
            "warehouse '{}' is inactive",
            wh.name
        )));
    }
    Ok(wh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ServiceError> = with_contention_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::Contention("lost race".into())) }
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Contention(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_stops_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ServiceError> = with_contention_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::InsufficientStock("short".into())) }
        })
        .await;

        assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_contention_retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ServiceError::Contention("first attempt loses".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
    }
}
