//! The stock location store: current quantity per (product, warehouse,
//! rack) key.
//!
//! Reads are served off the pool; every mutation takes a transaction
//! handle because it must commit together with its ledger entry. Mutations
//! are version-checked so a concurrent writer surfaces as `Contention`
//! instead of silently clobbering a quantity.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::db::{map_insert_race, DbPool};
use crate::entities::stock_location::{self, Entity as StockLocation};
use crate::errors::ServiceError;

/// Read-side access to stock locations for handlers and reports.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DbPool>,
}

impl StockService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Lists stock locations, optionally narrowed to a product and/or
    /// warehouse, largest quantities first.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        product_id: Option<Uuid>,
        warehouse_id: Option<Uuid>,
    ) -> Result<Vec<stock_location::Model>, ServiceError> {
        let mut select = StockLocation::find();
        if let Some(product_id) = product_id {
            select = select.filter(stock_location::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = warehouse_id {
            select = select.filter(stock_location::Column::WarehouseId.eq(warehouse_id));
        }

        let rows = select
            .order_by_desc(stock_location::Column::Quantity)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }

    /// Quantity currently on record at one key; absent means 0.
    #[instrument(skip(self))]
    pub async fn quantity_at(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        rack_location: &str,
    ) -> Result<i64, ServiceError> {
        quantity_at(self.db.as_ref(), product_id, warehouse_id, rack_location).await
    }
}

/// Finds the row for one key, if any.
pub(crate) async fn find_at<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    rack_location: &str,
) -> Result<Option<stock_location::Model>, ServiceError> {
    let row = StockLocation::find()
        .filter(stock_location::Column::ProductId.eq(product_id))
        .filter(stock_location::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_location::Column::RackLocation.eq(rack_location))
        .one(conn)
        .await?;
    Ok(row)
}

/// Quantity at one key, 0 when no row exists.
pub(crate) async fn quantity_at<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    rack_location: &str,
) -> Result<i64, ServiceError> {
    Ok(find_at(conn, product_id, warehouse_id, rack_location)
        .await?
        .map(|row| row.quantity)
        .unwrap_or(0))
}

/// Candidate locations for outbound allocation: quantity > 0, largest
/// first. Rack label breaks ties so allocation order is deterministic.
pub(crate) async fn candidates_for<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Vec<stock_location::Model>, ServiceError> {
    let rows = StockLocation::find()
        .filter(stock_location::Column::ProductId.eq(product_id))
        .filter(stock_location::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_location::Column::Quantity.gt(0))
        .order_by_desc(stock_location::Column::Quantity)
        .order_by_asc(stock_location::Column::RackLocation)
        .all(conn)
        .await?;
    Ok(rows)
}

/// Adds `delta` (may be negative) to the key, creating the row when absent.
/// Returns (quantity_before, quantity_after) for the paired ledger entry.
pub(crate) async fn upsert_add<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    rack_location: &str,
    delta: i64,
) -> Result<(i64, i64), ServiceError> {
    match find_at(conn, product_id, warehouse_id, rack_location).await? {
        Some(row) => {
            let after = row.quantity + delta;
            if after < 0 {
                error!(
                    product = %product_id,
                    warehouse = %warehouse_id,
                    rack = %rack_location,
                    quantity = row.quantity,
                    delta,
                    "stock mutation would go negative"
                );
                return Err(ServiceError::NegativeQuantity(format!(
                    "quantity {} + delta {} at rack '{}' would be negative",
                    row.quantity, delta, rack_location
                )));
            }
            apply_versioned(conn, &row, after).await?;
            Ok((row.quantity, after))
        }
        None => {
            if delta < 0 {
                error!(
                    product = %product_id,
                    warehouse = %warehouse_id,
                    rack = %rack_location,
                    delta,
                    "deduction from a key with no stock row"
                );
                return Err(ServiceError::NegativeQuantity(format!(
                    "no stock at rack '{}' to deduct {} from",
                    rack_location, -delta
                )));
            }
            insert_row(conn, product_id, warehouse_id, rack_location, delta).await?;
            Ok((0, delta))
        }
    }
}

/// Sets the key to an exact non-negative value (adjustment path). Returns
/// (quantity_before, quantity_after). An absent key counted at zero is left
/// absent; the ledger entry alone proves the count.
pub(crate) async fn set_absolute<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    rack_location: &str,
    value: i64,
) -> Result<(i64, i64), ServiceError> {
    if value < 0 {
        return Err(ServiceError::NegativeQuantity(format!(
            "cannot set rack '{}' to negative quantity {}",
            rack_location, value
        )));
    }

    match find_at(conn, product_id, warehouse_id, rack_location).await? {
        Some(row) => {
            apply_versioned(conn, &row, value).await?;
            Ok((row.quantity, value))
        }
        None => {
            if value > 0 {
                insert_row(conn, product_id, warehouse_id, rack_location, value).await?;
            }
            Ok((0, value))
        }
    }
}

/// Version-checked write. Zero rows affected means another transaction got
/// there first since our read.
async fn apply_versioned<C: ConnectionTrait>(
    conn: &C,
    row: &stock_location::Model,
    new_quantity: i64,
) -> Result<(), ServiceError> {
    let result = StockLocation::update_many()
        .col_expr(stock_location::Column::Quantity, Expr::value(new_quantity))
        .col_expr(stock_location::Column::Version, Expr::value(row.version + 1))
        .col_expr(stock_location::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_location::Column::Id.eq(row.id))
        .filter(stock_location::Column::Version.eq(row.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Contention(format!(
            "stock row {} changed underneath (version {})",
            row.id, row.version
        )));
    }
    Ok(())
}

async fn insert_row<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    rack_location: &str,
    quantity: i64,
) -> Result<(), ServiceError> {
    let model = stock_location::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        warehouse_id: Set(warehouse_id),
        rack_location: Set(rack_location.to_string()),
        quantity: Set(quantity),
        version: Set(1),
        updated_at: Set(Utc::now()),
    };
    model.insert(conn).await.map_err(map_insert_race)?;
    Ok(())
}
