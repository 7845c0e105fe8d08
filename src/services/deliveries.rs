use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
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
use crate::entities::delivery_line::{self, Entity as DeliveryLine};
use crate::entities::delivery_order::{self, Entity as DeliveryOrder};
use crate::entities::product::Entity as Product;
use crate::entities::stock_movement;
use crate::entities::{DocumentKind, DocumentStatus, MovementKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocation::plan_allocation;
use crate::services::{
    check_warehouse_active, movements, open_statuses, parse_status, sequences, stock,
    with_contention_retry,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewDelivery {
    #[validate(length(min = 1))]
    pub customer_name: String,
    pub warehouse_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<NewDeliveryLine>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewDeliveryLine {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
}

/// Outbound documents. Validation is the hardest path in the crate: each
/// line is covered by deducting from one or more racks, chosen largest
/// first, and the whole document commits or none of it does.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    retry_attempts: u32,
}

impl DeliveryService {
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
        input: NewDelivery,
        actor: Uuid,
    ) -> Result<delivery_order::Model, ServiceError> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        check_warehouse_active(self.db.as_ref(), input.warehouse_id).await?;

        let created = self
            .db
            .transaction::<_, delivery_order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let number = sequences::next_number(txn, DocumentKind::Delivery).await?;
                    let now = Utc::now();
                    let header = delivery_order::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        delivery_number: Set(number),
                        customer_name: Set(input.customer_name),
                        warehouse_id: Set(input.warehouse_id),
                        status: Set(DocumentStatus::Draft.as_str().to_string()),
                        scheduled_date: Set(input.scheduled_date),
                        delivered_date: Set(None),
                        notes: Set(input.notes),
                        created_by: Set(actor),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    insert_lines(txn, header.id, &input.lines).await?;
                    Ok(header)
                })
            })
            .await
            .map_err(ServiceError::from_txn)?;

        info!(number = %created.delivery_number, "delivery created");
        self.event_sender
            .send(Event::DocumentCreated {
                kind: DocumentKind::Delivery,
                document_id: created.id,
                document_number: created.delivery_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }

    /// Replaces header fields and lines. Drafts only.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: NewDelivery,
        _actor: Uuid,
    ) -> Result<delivery_order::Model, ServiceError> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        check_warehouse_active(self.db.as_ref(), input.warehouse_id).await?;

        self.db
            .transaction::<_, delivery_order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let header = DeliveryOrder::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("delivery {}", id)))?;
                    let status = parse_status(&header.status)?;
                    if !status.is_editable() {
                        return Err(ServiceError::InvalidStatus(format!(
                            "delivery {} is {} and can no longer be edited",
                            header.delivery_number, header.status
                        )));
                    }

                    let mut active: delivery_order::ActiveModel = header.into();
                    active.customer_name = Set(input.customer_name);
                    active.warehouse_id = Set(input.warehouse_id);
                    active.scheduled_date = Set(input.scheduled_date);
                    active.notes = Set(input.notes);
                    active.updated_at = Set(Utc::now());
                    let header = active.update(txn).await?;

                    DeliveryLine::delete_many()
                        .filter(delivery_line::Column::DeliveryId.eq(id))
                        .exec(txn)
                        .await?;
                    insert_lines(txn, header.id, &input.lines).await?;

                    Ok(header)
                })
            })
            .await
            .map_err(ServiceError::from_txn)
    }

    #[instrument(skip(self))]
    pub async fn get(
        &self,
        id: Uuid,
    ) -> Result<(delivery_order::Model, Vec<delivery_line::Model>), ServiceError> {
        let header = DeliveryOrder::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("delivery {}", id)))?;
        let lines = DeliveryLine::find()
            .filter(delivery_line::Column::DeliveryId.eq(id))
            .all(self.db.as_ref())
            .await?;
        Ok((header, lines))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<delivery_order::Model>, u64), ServiceError> {
        let paginator = DeliveryOrder::find()
            .order_by_desc(delivery_order::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Deducts stock for every line or nothing at all. `InsufficientStock`
    /// aborts the whole document even when earlier lines were coverable.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<delivery_order::Model, ServiceError> {
        let (header, recorded) =
            with_contention_retry(self.retry_attempts, || self.try_validate(id, actor)).await?;

        info!(
            number = %header.delivery_number,
            movements = recorded.len(),
            "delivery validated"
        );
        self.event_sender
            .send(Event::DocumentValidated {
                kind: DocumentKind::Delivery,
                document_id: header.id,
                document_number: header.delivery_number.clone(),
                movements_recorded: recorded.len(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        for movement in &recorded {
            self.event_sender
                .send(Event::StockLevelChanged {
                    product_id: movement.product_id,
                    warehouse_id: movement.warehouse_id,
                    rack_location: movement.rack_location.clone(),
                    new_quantity: movement.quantity_after,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }
        self.emit_low_stock(&recorded).await?;

        Ok(header)
    }

    async fn try_validate(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<(delivery_order::Model, Vec<stock_movement::Model>), ServiceError> {
        self.db
            .transaction::<_, (delivery_order::Model, Vec<stock_movement::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let header = DeliveryOrder::find_by_id(id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| ServiceError::NotFound(format!("delivery {}", id)))?;
                        let status = parse_status(&header.status)?;
                        if !status.can_validate() {
                            return Err(ServiceError::InvalidStatus(format!(
                                "delivery {} is {} and cannot be validated",
                                header.delivery_number, header.status
                            )));
                        }

                        let lines = DeliveryLine::find()
                            .filter(delivery_line::Column::DeliveryId.eq(id))
                            .all(txn)
                            .await?;
                        if lines.is_empty() {
                            return Err(ServiceError::ValidationError(
                                "delivery has no lines".into(),
                            ));
                        }

                        let mut recorded = Vec::new();
                        for line in &lines {
                            let candidates =
                                stock::candidates_for(txn, line.product_id, header.warehouse_id)
                                    .await?;
                            let slices = plan_allocation(&candidates, line.quantity).map_err(
                                |shortfall| {
                                    ServiceError::InsufficientStock(format!(
                                        "product {} short by {} for delivery {} (requested {}, available {})",
                                        line.product_id,
                                        shortfall.missing(),
                                        header.delivery_number,
                                        shortfall.requested,
                                        shortfall.available
                                    ))
                                },
                            )?;

                            for slice in slices {
                                let (before, _after) = stock::upsert_add(
                                    txn,
                                    line.product_id,
                                    header.warehouse_id,
                                    &slice.location.rack_location,
                                    -slice.take,
                                )
                                .await?;

                                let movement = movements::record(
                                    txn,
                                    movements::NewMovement {
                                        product_id: line.product_id,
                                        warehouse_id: header.warehouse_id,
                                        rack_location: slice.location.rack_location.clone(),
                                        kind: MovementKind::Delivery,
                                        reference_type: DocumentKind::Delivery
                                            .reference_type()
                                            .to_string(),
                                        reference_id: header.id,
                                        reference_number: header.delivery_number.clone(),
                                        quantity_before: before,
                                        quantity_change: -slice.take,
                                        created_by: actor,
                                    },
                                )
                                .await?;
                                recorded.push(movement);
                            }

                            let mut line_active: delivery_line::ActiveModel = line.clone().into();
                            line_active.delivered_quantity = Set(line.quantity);
                            line_active.update(txn).await?;
                        }

                        let header =
                            finish_document(txn, &header, Utc::now().date_naive()).await?;
                        Ok((header, recorded))
                    })
                },
            )
            .await
            .map_err(ServiceError::from_txn)
    }

    /// Flags racks the delivery pushed to or below their product's reorder
    /// level. Runs after commit; purely advisory.
    async fn emit_low_stock(
        &self,
        recorded: &[stock_movement::Model],
    ) -> Result<(), ServiceError> {
        let product_ids: HashSet<Uuid> = recorded.iter().map(|m| m.product_id).collect();
        for product_id in product_ids {
            let Some(product) = Product::find_by_id(product_id).one(self.db.as_ref()).await? else {
                continue;
            };
            if product.reorder_level <= 0 {
                continue;
            }
            for movement in recorded.iter().filter(|m| m.product_id == product_id) {
                if movement.quantity_after <= product.reorder_level {
                    self.event_sender
                        .send(Event::LowStockDetected {
                            product_id,
                            warehouse_id: movement.warehouse_id,
                            rack_location: movement.rack_location.clone(),
                            quantity: movement.quantity_after,
                            reorder_level: product.reorder_level,
                        })
                        .await
                        .map_err(ServiceError::EventError)?;
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: Uuid,
        _actor: Uuid,
    ) -> Result<delivery_order::Model, ServiceError> {
        let header = DeliveryOrder::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("delivery {}", id)))?;
        let status = parse_status(&header.status)?;
        if !status.can_cancel() {
            return Err(ServiceError::InvalidStatus(format!(
                "delivery {} is {} and cannot be cancelled",
                header.delivery_number, header.status
            )));
        }

        let updated = DeliveryOrder::update_many()
            .col_expr(
                delivery_order::Column::Status,
                Expr::value(DocumentStatus::Cancelled.as_str()),
            )
            .col_expr(delivery_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(delivery_order::Column::Id.eq(id))
            .filter(delivery_order::Column::Status.is_in(open_statuses()))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::Contention(format!(
                "delivery {} changed status concurrently",
                header.delivery_number
            )));
        }

        let header = DeliveryOrder::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("delivery {}", id)))?;
        self.event_sender
            .send(Event::DocumentCancelled {
                kind: DocumentKind::Delivery,
                document_id: header.id,
                document_number: header.delivery_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        Ok(header)
    }
}

async fn insert_lines<C: sea_orm::ConnectionTrait>(
    conn: &C,
    delivery_id: Uuid,
    lines: &[NewDeliveryLine],
) -> Result<(), ServiceError> {
    for line in lines {
        delivery_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(delivery_id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            delivered_quantity: Set(0),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn finish_document<C: sea_orm::ConnectionTrait>(
    conn: &C,
    header: &delivery_order::Model,
    delivered: NaiveDate,
) -> Result<delivery_order::Model, ServiceError> {
    let updated = DeliveryOrder::update_many()
        .col_expr(
            delivery_order::Column::Status,
            Expr::value(DocumentStatus::Done.as_str()),
        )
        .col_expr(delivery_order::Column::DeliveredDate, Expr::value(delivered))
        .col_expr(delivery_order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(delivery_order::Column::Id.eq(header.id))
        .filter(delivery_order::Column::Status.is_in(open_statuses()))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::Contention(format!(
            "delivery {} was validated or cancelled concurrently",
            header.delivery_number
        )));
    }

    DeliveryOrder::find_by_id(header.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("delivery {}", header.id)))
}
