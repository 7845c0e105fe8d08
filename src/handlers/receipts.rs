use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{receipt, receipt_line};
use crate::errors::ServiceError;
use crate::handlers::{actor_from_headers, AppState};
use crate::services::receipts::NewReceipt;
use crate::{ListQuery, Paginated};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_receipts).post(create_receipt))
        .route("/:id", get(get_receipt).put(update_receipt))
        .route("/:id/validate", post(validate_receipt))
        .route("/:id/cancel", post(cancel_receipt))
}

#[derive(Debug, Serialize)]
pub struct ReceiptWithLines {
    #[serde(flatten)]
    pub receipt: receipt::Model,
    pub lines: Vec<receipt_line::Model>,
}

/// Create a draft receipt
#[utoipa::path(
    post,
    path = "/api/v1/receipts",
    request_body = NewReceipt,
    responses(
        (status = 201, description = "Receipt draft created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn create_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewReceipt>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let created = state.services.receipts.create(input, actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List receipts, newest first
#[utoipa::path(
    get,
    path = "/api/v1/receipts",
    responses(
        (status = 200, description = "Receipt list returned")
    ),
    tag = "receipts"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state.services.receipts.list(query.page, query.limit).await?;
    Ok(Json(Paginated::new(items, total, &query)))
}

/// Fetch one receipt with its lines
#[utoipa::path(
    get,
    path = "/api/v1/receipts/{id}",
    responses(
        (status = 200, description = "Receipt returned"),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (receipt, lines) = state.services.receipts.get(id).await?;
    Ok(Json(ReceiptWithLines { receipt, lines }))
}

/// Replace a draft receipt's header and lines
#[utoipa::path(
    put,
    path = "/api/v1/receipts/{id}",
    request_body = NewReceipt,
    responses(
        (status = 200, description = "Receipt updated"),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(input): Json<NewReceipt>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let updated = state.services.receipts.update(id, input, actor).await?;
    Ok(Json(updated))
}

/// Validate a receipt: books every line into stock and appends ledger
/// entries, atomically
#[utoipa::path(
    post,
    path = "/api/v1/receipts/{id}/validate",
    responses(
        (status = 200, description = "Receipt validated"),
        (status = 400, description = "Not in a validatable status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent validation conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn validate_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let validated = state.services.receipts.validate(id, actor).await?;
    Ok(Json(validated))
}

/// Cancel a draft or ready receipt
#[utoipa::path(
    post,
    path = "/api/v1/receipts/{id}/cancel",
    responses(
        (status = 200, description = "Receipt cancelled"),
        (status = 400, description = "Already terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn cancel_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let cancelled = state.services.receipts.cancel(id, actor).await?;
    Ok(Json(cancelled))
}
