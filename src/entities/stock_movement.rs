use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of stock movement the ledger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    Receipt,
    Delivery,
    TransferIn,
    TransferOut,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receipt => "receipt",
            MovementKind::Delivery => "delivery",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::TransferOut => "transfer_out",
            MovementKind::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(MovementKind::Receipt),
            "delivery" => Some(MovementKind::Delivery),
            "transfer_in" => Some(MovementKind::TransferIn),
            "transfer_out" => Some(MovementKind::TransferOut),
            "adjustment" => Some(MovementKind::Adjustment),
            _ => None,
        }
    }
}

/// One immutable ledger entry. Rows are only ever inserted; there is no
/// update or delete path anywhere in the crate.
///
/// Invariant: `quantity_after == quantity_before + quantity_change`, and per
/// (product, warehouse, rack) key each row's `quantity_before` equals the
/// previous row's `quantity_after` (0 when the key is new).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub rack_location: String,
    pub movement_kind: String,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub reference_number: String,
    pub quantity_change: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<MovementKind> {
        MovementKind::from_str(&self.movement_kind)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_kind_round_trip() {
        for kind in [
            MovementKind::Receipt,
            MovementKind::Delivery,
            MovementKind::TransferIn,
            MovementKind::TransferOut,
            MovementKind::Adjustment,
        ] {
            assert_eq!(MovementKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::from_str("teleport"), None);
    }
}
