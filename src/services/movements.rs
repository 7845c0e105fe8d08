//! The movement ledger: append-only history of every stock change.
//!
//! There is deliberately no update or delete anywhere in this module; a
//! movement row, once written, is permanent. The sum of `quantity_change`
//! over a key's history always equals the current stock location quantity
//! for that key.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::stock_movement::{self, Entity as StockMovement};
use crate::entities::MovementKind;
use crate::errors::ServiceError;

/// A movement about to be appended. `quantity_after` is derived, never
/// supplied, so a malformed before/change/after triple cannot be recorded.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub rack_location: String,
    pub kind: MovementKind,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub reference_number: String,
    pub quantity_before: i64,
    pub quantity_change: i64,
    pub created_by: Uuid,
}

impl NewMovement {
    pub fn quantity_after(&self) -> i64 {
        self.quantity_before + self.quantity_change
    }
}

/// Appends one entry within the caller's transaction.
pub(crate) async fn record<C: ConnectionTrait>(
    conn: &C,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    let quantity_after = movement.quantity_after();
    let model = stock_movement::ActiveModel {
        id: NotSet,
        product_id: Set(movement.product_id),
        warehouse_id: Set(movement.warehouse_id),
        rack_location: Set(movement.rack_location),
        movement_kind: Set(movement.kind.as_str().to_string()),
        reference_type: Set(movement.reference_type),
        reference_id: Set(movement.reference_id),
        reference_number: Set(movement.reference_number),
        quantity_change: Set(movement.quantity_change),
        quantity_before: Set(movement.quantity_before),
        quantity_after: Set(quantity_after),
        created_by: Set(movement.created_by),
        created_at: NotSet,
    };
    let inserted = model.insert(conn).await?;
    Ok(inserted)
}

/// Read-side queries over the ledger.
#[derive(Clone)]
pub struct MovementService {
    db: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Newest-first audit feed, optionally filtered by kind. Restartable
    /// via offset: the ordering key (created_at, then id) is total, so the
    /// same query yields the same pages while nothing is being written.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        kind: Option<MovementKind>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let mut select = StockMovement::find();
        if let Some(kind) = kind {
            select = select.filter(stock_movement::Column::MovementKind.eq(kind.as_str()));
        }

        let rows = select
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }

    /// Chronological history for one (product, warehouse, rack) key, the
    /// audit/reconciliation view.
    #[instrument(skip(self))]
    pub async fn history_for_key(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        rack_location: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let rows = StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_movement::Column::RackLocation.eq(rack_location))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .order_by_asc(stock_movement::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }

    /// Everything one document did to the ledger.
    #[instrument(skip(self))]
    pub async fn for_reference(
        &self,
        reference_type: &str,
        reference_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let rows = StockMovement::find()
            .filter(stock_movement::Column::ReferenceType.eq(reference_type))
            .filter(stock_movement::Column::ReferenceId.eq(reference_id))
            .order_by_asc(stock_movement::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_after_is_derived() {
        let movement = NewMovement {
            product_id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            rack_location: "A-01".into(),
            kind: MovementKind::Delivery,
            reference_type: "delivery_order".into(),
            reference_id: Uuid::new_v4(),
            reference_number: "DEL-00001".into(),
            quantity_before: 30,
            quantity_change: -12,
            created_by: Uuid::new_v4(),
        };
        assert_eq!(movement.quantity_after(), 18);
    }
}
