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
use crate::entities::receipt::{self, Entity as Receipt};
use crate::entities::receipt_line::{self, Entity as ReceiptLine};
use crate::entities::stock_movement;
use crate::entities::{DocumentKind, DocumentStatus, MovementKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{
    check_warehouse_active, movements, open_statuses, parse_status, sequences, stock,
    with_contention_retry,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewReceipt {
    #[validate(length(min = 1))]
    pub supplier_name: String,
    pub warehouse_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<NewReceiptLine>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewReceiptLine {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(length(min = 1))]
    pub rack_location: String,
}

/// Inbound documents: drafts accumulate lines, validation books the goods
/// into stock and writes one `receipt` movement per line.
#[derive(Clone)]
pub struct ReceiptService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    retry_attempts: u32,
}

impl ReceiptService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, retry_attempts: u32) -> Self {
        Self {
            db,
            event_sender,
            retry_attempts,
        }
    }

    /// Creates a draft receipt, allocating its number from the receipt
    /// sequence in the same transaction as the insert.
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: NewReceipt,
        actor: Uuid,
    ) -> Result<receipt::Model, ServiceError> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        check_warehouse_active(self.db.as_ref(), input.warehouse_id).await?;

        let created = self
            .db
            .transaction::<_, receipt::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let number = sequences::next_number(txn, DocumentKind::Receipt).await?;
                    let now = Utc::now();
                    let header = receipt::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        receipt_number: Set(number),
                        supplier_name: Set(input.supplier_name),
                        warehouse_id: Set(input.warehouse_id),
                        status: Set(DocumentStatus::Draft.as_str().to_string()),
                        scheduled_date: Set(input.scheduled_date),
                        received_date: Set(None),
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

        info!(number = %created.receipt_number, "receipt created");
        self.event_sender
            .send(Event::DocumentCreated {
                kind: DocumentKind::Receipt,
                document_id: created.id,
                document_number: created.receipt_number.clone(),
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
        input: NewReceipt,
        _actor: Uuid,
    ) -> Result<receipt::Model, ServiceError> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        check_warehouse_active(self.db.as_ref(), input.warehouse_id).await?;

        self.db
            .transaction::<_, receipt::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let header = Receipt::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("receipt {}", id)))?;
                    let status = parse_status(&header.status)?;
                    if !status.is_editable() {
                        return Err(ServiceError::InvalidStatus(format!(
                            "receipt {} is {} and can no longer be edited",
                            header.receipt_number, header.status
                        )));
                    }

                    let mut active: receipt::ActiveModel = header.into();
                    active.supplier_name = Set(input.supplier_name);
                    active.warehouse_id = Set(input.warehouse_id);
                    active.scheduled_date = Set(input.scheduled_date);
                    active.notes = Set(input.notes);
                    active.updated_at = Set(Utc::now());
                    let header = active.update(txn).await?;

                    ReceiptLine::delete_many()
                        .filter(receipt_line::Column::ReceiptId.eq(id))
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
    ) -> Result<(receipt::Model, Vec<receipt_line::Model>), ServiceError> {
        let header = Receipt::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("receipt {}", id)))?;
        let lines = ReceiptLine::find()
            .filter(receipt_line::Column::ReceiptId.eq(id))
            .all(self.db.as_ref())
            .await?;
        Ok((header, lines))
    }

    /// Newest-first listing with total count for pagination.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<receipt::Model>, u64), ServiceError> {
        let paginator = Receipt::find()
            .order_by_desc(receipt::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Books the receipt into stock. Retries internally when another
    /// validation races on the same stock rows.
    #[instrument(skip(self))]
    pub async fn validate(&self, id: Uuid, actor: Uuid) -> Result<receipt::Model, ServiceError> {
        let (header, recorded) =
            with_contention_retry(self.retry_attempts, || self.try_validate(id, actor)).await?;

        info!(
            number = %header.receipt_number,
            movements = recorded.len(),
            "receipt validated"
        );
        self.event_sender
            .send(Event::DocumentValidated {
                kind: DocumentKind::Receipt,
                document_id: header.id,
                document_number: header.receipt_number.clone(),
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
    ) -> Result<(receipt::Model, Vec<stock_movement::Model>), ServiceError> {
        self.db
            .transaction::<_, (receipt::Model, Vec<stock_movement::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let header = Receipt::find_by_id(id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| ServiceError::NotFound(format!("receipt {}", id)))?;
                        let status = parse_status(&header.status)?;
                        if !status.can_validate() {
                            return Err(ServiceError::InvalidStatus(format!(
                                "receipt {} is {} and cannot be validated",
                                header.receipt_number, header.status
                            )));
                        }

                        let lines = ReceiptLine::find()
                            .filter(receipt_line::Column::ReceiptId.eq(id))
                            .all(txn)
                            .await?;
                        if lines.is_empty() {
                            return Err(ServiceError::ValidationError(
                                "receipt has no lines".into(),
                            ));
                        }

                        let mut recorded = Vec::with_capacity(lines.len());
                        for line in &lines {
                            let (before, _after) = stock::upsert_add(
                                txn,
                                line.product_id,
                                header.warehouse_id,
                                &line.rack_location,
                                line.quantity,
                            )
                            .await?;

                            let movement = movements::record(
                                txn,
                                movements::NewMovement {
                                    product_id: line.product_id,
                                    warehouse_id: header.warehouse_id,
                                    rack_location: line.rack_location.clone(),
                                    kind: MovementKind::Receipt,
                                    reference_type: DocumentKind::Receipt
                                        .reference_type()
                                        .to_string(),
                                    reference_id: header.id,
                                    reference_number: header.receipt_number.clone(),
                                    quantity_before: before,
                                    quantity_change: line.quantity,
                                    created_by: actor,
                                },
                            )
                            .await?;
                            recorded.push(movement);

                            let mut line_active: receipt_line::ActiveModel = line.clone().into();
                            line_active.received_quantity = Set(line.quantity);
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

    /// Cancels a draft/ready receipt. Nothing ever touched the ledger, so
    /// there is nothing to reverse.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid, _actor: Uuid) -> Result<receipt::Model, ServiceError> {
        let header = Receipt::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("receipt {}", id)))?;
        let status = parse_status(&header.status)?;
        if !status.can_cancel() {
            return Err(ServiceError::InvalidStatus(format!(
                "receipt {} is {} and cannot be cancelled",
                header.receipt_number, header.status
            )));
        }

        let updated = Receipt::update_many()
            .col_expr(
                receipt::Column::Status,
                Expr::value(DocumentStatus::Cancelled.as_str()),
            )
            .col_expr(receipt::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(receipt::Column::Id.eq(id))
            .filter(receipt::Column::Status.is_in(open_statuses()))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::Contention(format!(
                "receipt {} changed status concurrently",
                header.receipt_number
            )));
        }

        let header = Receipt::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("receipt {}", id)))?;
        self.event_sender
            .send(Event::DocumentCancelled {
                kind: DocumentKind::Receipt,
                document_id: header.id,
                document_number: header.receipt_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        Ok(header)
    }
}

async fn insert_lines<C: sea_orm::ConnectionTrait>(
    conn: &C,
    receipt_id: Uuid,
    lines: &[NewReceiptLine],
) -> Result<(), ServiceError> {
    for line in lines {
        receipt_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            receipt_id: Set(receipt_id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            received_quantity: Set(0),
            rack_location: Set(line.rack_location.clone()),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

/// Compare-and-swap the header to `done`. Zero rows affected means a
/// concurrent transition won since our read.
async fn finish_document<C: sea_orm::ConnectionTrait>(
    conn: &C,
    header: &receipt::Model,
    received: NaiveDate,
) -> Result<receipt::Model, ServiceError> {
    let updated = Receipt::update_many()
        .col_expr(
            receipt::Column::Status,
            Expr::value(DocumentStatus::Done.as_str()),
        )
        .col_expr(receipt::Column::ReceivedDate, Expr::value(received))
        .col_expr(receipt::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(receipt::Column::Id.eq(header.id))
        .filter(receipt::Column::Status.is_in(open_statuses()))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::Contention(format!(
            "receipt {} was validated or cancelled concurrently",
            header.receipt_number
        )));
    }

    Receipt::find_by_id(header.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("receipt {}", header.id)))
}

