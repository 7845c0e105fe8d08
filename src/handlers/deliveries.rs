use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{delivery_line, delivery_order};
use crate::errors::ServiceError;
use crate::handlers::{actor_from_headers, AppState};
use crate::services::deliveries::NewDelivery;
use crate::{ListQuery, Paginated};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_deliveries).post(create_delivery))
        .route("/:id", get(get_delivery).put(update_delivery))
        .route("/:id/validate", post(validate_delivery))
        .route("/:id/cancel", post(cancel_delivery))
}

#[derive(Debug, Serialize)]
pub struct DeliveryWithLines {
    #[serde(flatten)]
    pub delivery: delivery_order::Model,
    pub lines: Vec<delivery_line::Model>,
}

/// Create a draft delivery order
#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = NewDelivery,
    responses(
        (status = 201, description = "Delivery draft created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewDelivery>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let created = state.services.deliveries.create(input, actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List delivery orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    responses(
        (status = 200, description = "Delivery list returned")
    ),
    tag = "deliveries"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state
        .services
        .deliveries
        .list(query.page, query.limit)
        .await?;
    Ok(Json(Paginated::new(items, total, &query)))
}

/// Fetch one delivery with its lines
#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    responses(
        (status = 200, description = "Delivery returned"),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (delivery, lines) = state.services.deliveries.get(id).await?;
    Ok(Json(DeliveryWithLines { delivery, lines }))
}

/// Replace a draft delivery's header and lines
#[utoipa::path(
    put,
    path = "/api/v1/deliveries/{id}",
    request_body = NewDelivery,
    responses(
        (status = 200, description = "Delivery updated"),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn update_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(input): Json<NewDelivery>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let updated = state.services.deliveries.update(id, input, actor).await?;
    Ok(Json(updated))
}

/// Validate a delivery: allocates racks largest-first and deducts stock,
/// all lines or none
#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/validate",
    responses(
        (status = 200, description = "Delivery validated"),
        (status = 400, description = "Not in a validatable status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent validation conflict", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn validate_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let validated = state.services.deliveries.validate(id, actor).await?;
    Ok(Json(validated))
}

/// Cancel a draft or ready delivery
#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/cancel",
    responses(
        (status = 200, description = "Delivery cancelled"),
        (status = 400, description = "Already terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn cancel_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let cancelled = state.services.deliveries.cancel(id, actor).await?;
    Ok(Json(cancelled))
}
