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
use crate::entities::internal_transfer::{self, Entity as InternalTransfer};
use crate::entities::stock_movement;
use crate::entities::transfer_line::{self, Entity as TransferLine};
use crate::entities::{DocumentKind, DocumentStatus, MovementKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocation::plan_allocation;
use crate::services::{
    check_warehouse_active, movements, open_statuses, parse_status, sequences, stock,
    with_contention_retry,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewTransfer {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<NewTransferLine>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewTransferLine {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(length(min = 1))]
    pub to_rack_location: String,
}

/// Warehouse-to-warehouse moves. Validation produces a coupled pair of
/// movements per line: `transfer_out` at the source racks allocation picks
/// and a single `transfer_in` at the destination rack, all sharing the
/// transfer's number. Either the whole pair lands or none of it does.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    retry_attempts: u32,
}

impl TransferService {
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
        input: NewTransfer,
        actor: Uuid,
    ) -> Result<internal_transfer::Model, ServiceError> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "transfer source and destination warehouses must differ".into(),
            ));
        }
        check_warehouse_active(self.db.as_ref(), input.from_warehouse_id).await?;
        check_warehouse_active(self.db.as_ref(), input.to_warehouse_id).await?;

        let created = self
            .db
            .transaction::<_, internal_transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let number = sequences::next_number(txn, DocumentKind::Transfer).await?;
                    let now = Utc::now();
                    let header = internal_transfer::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        transfer_number: Set(number),
                        from_warehouse_id: Set(input.from_warehouse_id),
                        to_warehouse_id: Set(input.to_warehouse_id),
                        status: Set(DocumentStatus::Draft.as_str().to_string()),
                        scheduled_date: Set(input.scheduled_date),
                        completed_date: Set(None),
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

        info!(number = %created.transfer_number, "transfer created");
        self.event_sender
            .send(Event::DocumentCreated {
                kind: DocumentKind::Transfer,
                document_id: created.id,
                document_number: created.transfer_number.clone(),
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
        input: NewTransfer,
        _actor: Uuid,
    ) -> Result<internal_transfer::Model, ServiceError> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "transfer source and destination warehouses must differ".into(),
            ));
        }
        check_warehouse_active(self.db.as_ref(), input.from_warehouse_id).await?;
        check_warehouse_active(self.db.as_ref(), input.to_warehouse_id).await?;

        self.db
            .transaction::<_, internal_transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let header = InternalTransfer::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("transfer {}", id)))?;
                    let status = parse_status(&header.status)?;
                    if !status.is_editable() {
                        return Err(ServiceError::InvalidStatus(format!(
                            "transfer {} is {} and can no longer be edited",
                            header.transfer_number, header.status
                        )));
                    }

                    let mut active: internal_transfer::ActiveModel = header.into();
                    active.from_warehouse_id = Set(input.from_warehouse_id);
                    active.to_warehouse_id = Set(input.to_warehouse_id);
                    active.scheduled_date = Set(input.scheduled_date);
                    active.notes = Set(input.notes);
                    active.updated_at = Set(Utc::now());
                    let header = active.update(txn).await?;

                    TransferLine::delete_many()
                        .filter(transfer_line::Column::TransferId.eq(id))
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
    ) -> Result<(internal_transfer::Model, Vec<transfer_line::Model>), ServiceError> {
        let header = InternalTransfer::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer {}", id)))?;
        let lines = TransferLine::find()
            .filter(transfer_line::Column::TransferId.eq(id))
            .all(self.db.as_ref())
            .await?;
        Ok((header, lines))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<internal_transfer::Model>, u64), ServiceError> {
        let paginator = InternalTransfer::find()
            .order_by_desc(internal_transfer::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Moves every line from source to destination warehouse, atomically.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<internal_transfer::Model, ServiceError> {
        let (header, recorded) =
            with_contention_retry(self.retry_attempts, || self.try_validate(id, actor)).await?;

        info!(
            number = %header.transfer_number,
            movements = recorded.len(),
            "transfer validated"
        );
        self.event_sender
            .send(Event::DocumentValidated {
                kind: DocumentKind::Transfer,
                document_id: header.id,
                document_number: header.transfer_number.clone(),
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

        Ok(header)
    }

    async fn try_validate(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<(internal_transfer::Model, Vec<stock_movement::Model>), ServiceError> {
        self.db
            .transaction::<_, (internal_transfer::Model, Vec<stock_movement::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let header = InternalTransfer::find_by_id(id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| ServiceError::NotFound(format!("transfer {}", id)))?;
                        let status = parse_status(&header.status)?;
                        if !status.can_validate() {
                            return Err(ServiceError::InvalidStatus(format!(
                                "transfer {} is {} and cannot be validated",
                                header.transfer_number, header.status
                            )));
                        }

                        let lines = TransferLine::find()
                            .filter(transfer_line::Column::TransferId.eq(id))
                            .all(txn)
                            .await?;
                        if lines.is_empty() {
                            return Err(ServiceError::ValidationError(
                                "transfer has no lines".into(),
                            ));
                        }

                        let mut recorded = Vec::new();
                        for line in &lines {
                            // Outbound side: same allocation rule as deliveries,
                            // scoped to the source warehouse.
                            let candidates = stock::candidates_for(
                                txn,
                                line.product_id,
                                header.from_warehouse_id,
                            )
                            .await?;
                            let slices = plan_allocation(&candidates, line.quantity).map_err(
                                |shortfall| {
                                    ServiceError::InsufficientStock(format!(
                                        "product {} short by {} for transfer {} (requested {}, available {})",
                                        line.product_id,
                                        shortfall.missing(),
                                        header.transfer_number,
                                        shortfall.requested,
                                        shortfall.available
                                    ))
                                },
                            )?;

                            for slice in slices {
                                let (before, _after) = stock::upsert_add(
                                    txn,
                                    line.product_id,
                                    header.from_warehouse_id,
                                    &slice.location.rack_location,
                                    -slice.take,
                                )
                                .await?;

                                let movement = movements::record(
                                    txn,
                                    movements::NewMovement {
                                        product_id: line.product_id,
                                        warehouse_id: header.from_warehouse_id,
                                        rack_location: slice.location.rack_location.clone(),
                                        kind: MovementKind::TransferOut,
                                        reference_type: DocumentKind::Transfer
                                            .reference_type()
                                            .to_string(),
                                        reference_id: header.id,
                                        reference_number: header.transfer_number.clone(),
                                        quantity_before: before,
                                        quantity_change: -slice.take,
                                        created_by: actor,
                                    },
                                )
                                .await?;
                                recorded.push(movement);
                            }

                            // Inbound side: the full line quantity lands at the
                            // destination rack in one movement.
                            let (before, _after) = stock::upsert_add(
                                txn,
                                line.product_id,
                                header.to_warehouse_id,
                                &line.to_rack_location,
                                line.quantity,
                            )
                            .await?;

                            let movement = movements::record(
                                txn,
                                movements::NewMovement {
                                    product_id: line.product_id,
                                    warehouse_id: header.to_warehouse_id,
                                    rack_location: line.to_rack_location.clone(),
                                    kind: MovementKind::TransferIn,
                                    reference_type: DocumentKind::Transfer
                                        .reference_type()
                                        .to_string(),
                                    reference_id: header.id,
                                    reference_number: header.transfer_number.clone(),
                                    quantity_before: before,
                                    quantity_change: line.quantity,
                                    created_by: actor,
                                },
                            )
                            .await?;
                            recorded.push(movement);

                            let mut line_active: transfer_line::ActiveModel = line.clone().into();
                            line_active.transferred_quantity = Set(line.quantity);
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

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: Uuid,
        _actor: Uuid,
    ) -> Result<internal_transfer::Model, ServiceError> {
        let header = InternalTransfer::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer {}", id)))?;
        let status = parse_status(&header.status)?;
        if !status.can_cancel() {
            return Err(ServiceError::InvalidStatus(format!(
                "transfer {} is {} and cannot be cancelled",
                header.transfer_number, header.status
            )));
        }

        let updated = InternalTransfer::update_many()
            .col_expr(
                internal_transfer::Column::Status,
                Expr::value(DocumentStatus::Cancelled.as_str()),
            )
            .col_expr(internal_transfer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(internal_transfer::Column::Id.eq(id))
            .filter(internal_transfer::Column::Status.is_in(open_statuses()))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::Contention(format!(
                "transfer {} changed status concurrently",
                header.transfer_number
            )));
        }

        let header = InternalTransfer::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer {}", id)))?;
        self.event_sender
            .send(Event::DocumentCancelled {
                kind: DocumentKind::Transfer,
                document_id: header.id,
                document_number: header.transfer_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        Ok(header)
    }
}

async fn insert_lines<C: sea_orm::ConnectionTrait>(
    conn: &C,
    transfer_id: Uuid,
    lines: &[NewTransferLine],
) -> Result<(), ServiceError> {
    for line in lines {
        transfer_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            transfer_id: Set(transfer_id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            transferred_quantity: Set(0),
            to_rack_location: Set(line.to_rack_location.clone()),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn finish_document<C: sea_orm::ConnectionTrait>(
    conn: &C,
    header: &internal_transfer::Model,
    completed: NaiveDate,
) -> Result<internal_transfer::Model, ServiceError> {
    let updated = InternalTransfer::update_many()
        .col_expr(
            internal_transfer::Column::Status,
            Expr::value(DocumentStatus::Done.as_str()),
        )
        .col_expr(
            internal_transfer::Column::CompletedDate,
            Expr::value(completed),
        )
        .col_expr(internal_transfer::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(internal_transfer::Column::Id.eq(header.id))
        .filter(internal_transfer::Column::Status.is_in(open_statuses()))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::Contention(format!(
            "transfer {} was validated or cancelled concurrently",
            header.transfer_number
        )));
    }

    InternalTransfer::find_by_id(header.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("transfer {}", header.id)))
}
