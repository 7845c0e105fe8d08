use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Document kinds that draw numbers from the sequence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "receipt",
            DocumentKind::Delivery => "delivery",
            DocumentKind::Transfer => "transfer",
            DocumentKind::Adjustment => "adjustment",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "REC",
            DocumentKind::Delivery => "DEL",
            DocumentKind::Transfer => "TRF",
            DocumentKind::Adjustment => "ADJ",
        }
    }

    /// Value stored in `stock_movements.reference_type` for movements this
    /// kind of document produces.
    pub fn reference_type(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "receipt",
            DocumentKind::Delivery => "delivery_order",
            DocumentKind::Transfer => "internal_transfer",
            DocumentKind::Adjustment => "stock_adjustment",
        }
    }

    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Receipt,
        DocumentKind::Delivery,
        DocumentKind::Transfer,
        DocumentKind::Adjustment,
    ];
}

/// Per-kind monotonic counter. One row per document kind, seeded by the
/// migration, mutated only via an in-transaction atomic increment. Counting
/// existing documents is deliberately not how numbers are produced: two
/// concurrent creations would read the same count and collide.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub document_type: String,
    pub next_value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
