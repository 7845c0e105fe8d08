use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::delivery_order::{self, Entity as DeliveryOrder};
use crate::entities::internal_transfer::{self, Entity as InternalTransfer};
use crate::entities::product::Entity as Product;
use crate::entities::receipt::{self, Entity as Receipt};
use crate::entities::stock_location::Entity as StockLocation;
use crate::entities::DocumentStatus;
use crate::errors::ServiceError;

/// Headline numbers for the landing dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_products: u64,
    pub low_stock_locations: u64,
    pub pending_receipts: u64,
    pub pending_deliveries: u64,
    pub pending_transfers: u64,
}

/// A rack sitting at or below its product's reorder level.
#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockLocation {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub warehouse_id: Uuid,
    pub rack_location: String,
    pub quantity: i64,
    pub reorder_level: i64,
    pub reorder_quantity: i64,
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardSummary, ServiceError> {
        let db = self.db.as_ref();
        let open = [
            DocumentStatus::Draft.as_str(),
            DocumentStatus::Ready.as_str(),
        ];

        let total_products = Product::find().count(db).await?;
        let pending_receipts = Receipt::find()
            .filter(receipt::Column::Status.is_in(open))
            .count(db)
            .await?;
        let pending_deliveries = DeliveryOrder::find()
            .filter(delivery_order::Column::Status.is_in(open))
            .count(db)
            .await?;
        let pending_transfers = InternalTransfer::find()
            .filter(internal_transfer::Column::Status.is_in(open))
            .count(db)
            .await?;
        let low_stock_locations = self.low_stock().await?.len() as u64;

        Ok(DashboardSummary {
            total_products,
            low_stock_locations,
            pending_receipts,
            pending_deliveries,
            pending_transfers,
        })
    }

    /// Racks at or below their product's reorder level. Products with a
    /// reorder level of zero never flag.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<LowStockLocation>, ServiceError> {
        let rows = StockLocation::find()
            .find_also_related(Product)
            .all(self.db.as_ref())
            .await?;

        let mut flagged = Vec::new();
        for (stock, product) in rows {
            let Some(product) = product else { continue };
            if product.reorder_level > 0 && stock.quantity <= product.reorder_level {
                flagged.push(LowStockLocation {
                    product_id: product.id,
                    sku: product.sku,
                    product_name: product.name,
                    warehouse_id: stock.warehouse_id,
                    rack_location: stock.rack_location,
                    quantity: stock.quantity,
                    reorder_level: product.reorder_level,
                    reorder_quantity: product.reorder_quantity,
                });
            }
        }

        flagged.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.sku.cmp(&b.sku)));
        Ok(flagged)
    }
}
