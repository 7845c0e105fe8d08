use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewProduct {
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub unit_of_measure: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub reorder_level: i64,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub reorder_quantity: i64,
}

/// Everything on a product may change except the SKU, which is fixed at
/// creation.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub unit_of_measure: String,
    #[validate(range(min = 0))]
    pub reorder_level: i64,
    #[validate(range(min = 0))]
    pub reorder_quantity: i64,
}

/// Catalog management. Products referenced by ledger history are never
/// deleted, only deactivated.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: NewProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let sku = input.sku.clone();
        let result = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(input.sku),
            name: Set(input.name),
            description: Set(input.description),
            unit_of_measure: Set(input.unit_of_measure),
            reorder_level: Set(input.reorder_level),
            reorder_quantity: Set(input.reorder_quantity),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await;

        let created = result.map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::ValidationError(format!("SKU '{}' is already in use", sku))
            }
            _ => ServiceError::DatabaseError(err),
        })?;

        info!(sku = %created.sku, "product created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProduct,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let existing = self.get(id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.unit_of_measure = Set(input.unit_of_measure);
        active.reorder_level = Set(input.reorder_level);
        active.reorder_quantity = Set(input.reorder_quantity);
        active.updated_at = Set(Utc::now());

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated)
    }

    /// Soft delete: the row stays because movement history points at it.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());

        let updated = active.update(self.db.as_ref()).await?;
        info!(sku = %updated.sku, "product deactivated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<product::Model>, ServiceError> {
        let mut select = Product::find();
        if !include_inactive {
            select = select.filter(product::Column::IsActive.eq(true));
        }
        let rows = select
            .order_by_asc(product::Column::Name)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }
}
