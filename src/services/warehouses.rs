use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::warehouse::{self, Entity as Warehouse};
use crate::errors::ServiceError;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewWarehouse {
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateWarehouse {
    #[validate(length(min = 1))]
    pub name: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct WarehouseService {
    db: Arc<DbPool>,
}

impl WarehouseService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: NewWarehouse) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;

        let created = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(name = %created.name, "warehouse created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateWarehouse,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;

        let existing = self.get(id).await?;
        let mut active: warehouse::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.is_active = Set(input.is_active);

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<warehouse::Model, ServiceError> {
        Warehouse::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {}", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<warehouse::Model>, ServiceError> {
        let mut select = Warehouse::find();
        if !include_inactive {
            select = select.filter(warehouse::Column::IsActive.eq(true));
        }
        let rows = select
            .order_by_asc(warehouse::Column::Name)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }
}
