use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{internal_transfer, transfer_line};
use crate::errors::ServiceError;
use crate::handlers::{actor_from_headers, AppState};
use crate::services::transfers::NewTransfer;
use crate::{ListQuery, Paginated};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route("/:id", get(get_transfer).put(update_transfer))
        .route("/:id/validate", post(validate_transfer))
        .route("/:id/cancel", post(cancel_transfer))
}

#[derive(Debug, Serialize)]
pub struct TransferWithLines {
    #[serde(flatten)]
    pub transfer: internal_transfer::Model,
    pub lines: Vec<transfer_line::Model>,
}

/// Create a draft internal transfer
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = NewTransfer,
    responses(
        (status = 201, description = "Transfer draft created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewTransfer>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let created = state.services.transfers.create(input, actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List internal transfers, newest first
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    responses(
        (status = 200, description = "Transfer list returned")
    ),
    tag = "transfers"
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state
        .services
        .transfers
        .list(query.page, query.limit)
        .await?;
    Ok(Json(Paginated::new(items, total, &query)))
}

/// Fetch one transfer with its lines
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    responses(
        (status = 200, description = "Transfer returned"),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (transfer, lines) = state.services.transfers.get(id).await?;
    Ok(Json(TransferWithLines { transfer, lines }))
}

/// Replace a draft transfer's header and lines
#[utoipa::path(
    put,
    path = "/api/v1/transfers/{id}",
    request_body = NewTransfer,
    responses(
        (status = 200, description = "Transfer updated"),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn update_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(input): Json<NewTransfer>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let updated = state.services.transfers.update(id, input, actor).await?;
    Ok(Json(updated))
}

/// Validate a transfer: deducts from the source warehouse and books into
/// the destination as one atomic pair
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/validate",
    responses(
        (status = 200, description = "Transfer validated"),
        (status = 400, description = "Not in a validatable status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent validation conflict", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock at source", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn validate_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let validated = state.services.transfers.validate(id, actor).await?;
    Ok(Json(validated))
}

/// Cancel a draft or ready transfer
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    responses(
        (status = 200, description = "Transfer cancelled"),
        (status = 400, description = "Already terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn cancel_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let cancelled = state.services.transfers.cancel(id, actor).await?;
    Ok(Json(cancelled))
}
