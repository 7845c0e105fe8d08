use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::product::Entity as Product;
use crate::entities::stock_adjustment::{self, Entity as StockAdjustment};
use crate::entities::stock_movement;
use crate::entities::{DocumentKind, DocumentStatus, MovementKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{
    check_warehouse_active, movements, open_statuses, parse_status, sequences, stock,
    with_contention_retry,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewAdjustment {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(length(min = 1))]
    pub rack_location: String,
    #[validate(range(min = 0))]
    pub actual_quantity: i64,
    pub reason: Option<String>,
}

/// Physical count corrections. A draft snapshots the quantity on record
/// for display; validation recomputes it, sets the rack to the counted
/// value, and writes exactly one `adjustment` movement. A count matching
/// the system still produces a zero-change movement: it proves the count
/// happened.
#[derive(Clone)]
pub struct AdjustmentService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    retry_attempts: u32,
}

impl AdjustmentService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, retry_attempts: u32) -> Self {
        Self {
            db,
            event_sender,
            retry_attempts,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: NewAdjustment,
        actor: Uuid,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        input.validate()?;
        check_warehouse_active(self.db.as_ref(), input.warehouse_id).await?;
        let product = Product::find_by_id(input.product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", input.product_id)))?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "product '{}' is inactive",
                product.sku
            )));
        }

        let created = self
            .db
            .transaction::<_, stock_adjustment::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let number = sequences::next_number(txn, DocumentKind::Adjustment).await?;
                    let system_quantity = stock::quantity_at(
                        txn,
                        input.product_id,
                        input.warehouse_id,
                        &input.rack_location,
                    )
                    .await?;
                    let now = Utc::now();

                    let model = stock_adjustment::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        adjustment_number: Set(number),
                        product_id: Set(input.product_id),
                        warehouse_id: Set(input.warehouse_id),
                        rack_location: Set(input.rack_location),
                        system_quantity: Set(system_quantity),
                        actual_quantity: Set(input.actual_quantity),
                        reason: Set(input.reason),
                        status: Set(DocumentStatus::Draft.as_str().to_string()),
                        created_by: Set(actor),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    Ok(model)
                })
            })
            .await
            .map_err(ServiceError::from_txn)?;

        info!(number = %created.adjustment_number, "adjustment created");
        self.event_sender
            .send(Event::DocumentCreated {
                kind: DocumentKind::Adjustment,
                document_id: created.id,
                document_number: created.adjustment_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }

    /// Updates the counted quantity or reason. Drafts only.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: NewAdjustment,
        _actor: Uuid,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        input.validate()?;
        check_warehouse_active(self.db.as_ref(), input.warehouse_id).await?;

        self.db
            .transaction::<_, stock_adjustment::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let model = StockAdjustment::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("adjustment {}", id)))?;
                    let status = parse_status(&model.status)?;
                    if !status.is_editable() {
                        return Err(ServiceError::InvalidStatus(format!(
                            "adjustment {} is {} and can no longer be edited",
                            model.adjustment_number, model.status
                        )));
                    }

                    let system_quantity = stock::quantity_at(
                        txn,
                        input.product_id,
                        input.warehouse_id,
                        &input.rack_location,
                    )
                    .await?;

                    let mut active: stock_adjustment::ActiveModel = model.into();
                    active.product_id = Set(input.product_id);
                    active.warehouse_id = Set(input.warehouse_id);
                    active.rack_location = Set(input.rack_location);
                    active.system_quantity = Set(system_quantity);
                    active.actual_quantity = Set(input.actual_quantity);
                    active.reason = Set(input.reason);
                    active.updated_at = Set(Utc::now());
                    let model = active.update(txn).await?;
                    Ok(model)
                })
            })
            .await
            .map_err(ServiceError::from_txn)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<stock_adjustment::Model, ServiceError> {
        StockAdjustment::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("adjustment {}", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_adjustment::Model>, u64), ServiceError> {
        let paginator = StockAdjustment::find()
            .order_by_desc(stock_adjustment::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Applies the count. The system quantity is re-read inside the
    /// transaction; the difference recorded is against that fresh value,
    /// never the possibly stale draft snapshot.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let (model, movement) =
            with_contention_retry(self.retry_attempts, || self.try_validate(id, actor)).await?;

        info!(
            number = %model.adjustment_number,
            change = movement.quantity_change,
            "adjustment validated"
        );
        self.event_sender
            .send(Event::DocumentValidated {
                kind: DocumentKind::Adjustment,
                document_id: model.id,
                document_number: model.adjustment_number.clone(),
                movements_recorded: 1,
            })
            .await
            .map_err(ServiceError::EventError)?;
        self.event_sender
            .send(Event::StockLevelChanged {
                product_id: movement.product_id,
                warehouse_id: movement.warehouse_id,
                rack_location: movement.rack_location.clone(),
                new_quantity: movement.quantity_after,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(model)
    }

    async fn try_validate(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<(stock_adjustment::Model, stock_movement::Model), ServiceError> {
        self.db
            .transaction::<_, (stock_adjustment::Model, stock_movement::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let model = StockAdjustment::find_by_id(id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| ServiceError::NotFound(format!("adjustment {}", id)))?;
                        let status = parse_status(&model.status)?;
                        if !status.can_validate() {
                            return Err(ServiceError::InvalidStatus(format!(
                                "adjustment {} is {} and cannot be validated",
                                model.adjustment_number, model.status
                            )));
                        }

                        let (system_quantity, _after) = stock::set_absolute(
                            txn,
                            model.product_id,
                            model.warehouse_id,
                            &model.rack_location,
                            model.actual_quantity,
                        )
                        .await?;
                        let difference = model.actual_quantity - system_quantity;

                        let movement = movements::record(
                            txn,
                            movements::NewMovement {
                                product_id: model.product_id,
                                warehouse_id: model.warehouse_id,
                                rack_location: model.rack_location.clone(),
                                kind: MovementKind::Adjustment,
                                reference_type: DocumentKind::Adjustment
                                    .reference_type()
                                    .to_string(),
                                reference_id: model.id,
                                reference_number: model.adjustment_number.clone(),
                                quantity_before: system_quantity,
                                quantity_change: difference,
                                created_by: actor,
                            },
                        )
                        .await?;

                        let model = finish_document(txn, &model, system_quantity).await?;
                        Ok((model, movement))
                    })
                },
            )
            .await
            .map_err(ServiceError::from_txn)
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: Uuid,
        _actor: Uuid,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let model = StockAdjustment::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("adjustment {}", id)))?;
        let status = parse_status(&model.status)?;
        if !status.can_cancel() {
            return Err(ServiceError::InvalidStatus(format!(
                "adjustment {} is {} and cannot be cancelled",
                model.adjustment_number, model.status
            )));
        }

        let updated = StockAdjustment::update_many()
            .col_expr(
                stock_adjustment::Column::Status,
                Expr::value(DocumentStatus::Cancelled.as_str()),
            )
            .col_expr(stock_adjustment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(stock_adjustment::Column::Id.eq(id))
            .filter(stock_adjustment::Column::Status.is_in(open_statuses()))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::Contention(format!(
                "adjustment {} changed status concurrently",
                model.adjustment_number
            )));
        }

        let model = StockAdjustment::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("adjustment {}", id)))?;
        self.event_sender
            .send(Event::DocumentCancelled {
                kind: DocumentKind::Adjustment,
                document_id: model.id,
                document_number: model.adjustment_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        Ok(model)
    }
}

/// Compare-and-swap to `done`, also freezing the system quantity the
/// movement was computed against.
async fn finish_document<C: sea_orm::ConnectionTrait>(
    conn: &C,
    model: &stock_adjustment::Model,
    system_quantity: i64,
) -> Result<stock_adjustment::Model, ServiceError> {
    let updated = StockAdjustment::update_many()
        .col_expr(
            stock_adjustment::Column::Status,
            Expr::value(DocumentStatus::Done.as_str()),
        )
        .col_expr(
            stock_adjustment::Column::SystemQuantity,
            Expr::value(system_quantity),
        )
        .col_expr(stock_adjustment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_adjustment::Column::Id.eq(model.id))
        .filter(stock_adjustment::Column::Status.is_in(open_statuses()))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::Contention(format!(
            "adjustment {} was validated or cancelled concurrently",
            model.adjustment_number
        )));
    }

    StockAdjustment::find_by_id(model.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("adjustment {}", model.id)))
}
