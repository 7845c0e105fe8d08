use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::{actor_from_headers, AppState};
use crate::services::adjustments::NewAdjustment;
use crate::{ListQuery, Paginated};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_adjustments).post(create_adjustment))
        .route("/:id", get(get_adjustment).put(update_adjustment))
        .route("/:id/validate", post(validate_adjustment))
        .route("/:id/cancel", post(cancel_adjustment))
}

/// Create a draft stock adjustment for one rack
#[utoipa::path(
    post,
    path = "/api/v1/adjustments",
    request_body = NewAdjustment,
    responses(
        (status = 201, description = "Adjustment draft created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "adjustments"
)]
pub async fn create_adjustment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewAdjustment>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let created = state.services.adjustments.create(input, actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List adjustments, newest first
#[utoipa::path(
    get,
    path = "/api/v1/adjustments",
    responses(
        (status = 200, description = "Adjustment list returned")
    ),
    tag = "adjustments"
)]
pub async fn list_adjustments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state
        .services
        .adjustments
        .list(query.page, query.limit)
        .await?;
    Ok(Json(Paginated::new(items, total, &query)))
}

/// Fetch one adjustment
#[utoipa::path(
    get,
    path = "/api/v1/adjustments/{id}",
    responses(
        (status = 200, description = "Adjustment returned"),
        (status = 404, description = "Adjustment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "adjustments"
)]
pub async fn get_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let adjustment = state.services.adjustments.get(id).await?;
    Ok(Json(adjustment))
}

/// Update a draft adjustment's count or reason
#[utoipa::path(
    put,
    path = "/api/v1/adjustments/{id}",
    request_body = NewAdjustment,
    responses(
        (status = 200, description = "Adjustment updated"),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Adjustment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "adjustments"
)]
pub async fn update_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(input): Json<NewAdjustment>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let updated = state.services.adjustments.update(id, input, actor).await?;
    Ok(Json(updated))
}

/// Validate an adjustment: sets the rack to the counted quantity and
/// records the difference, even when it is zero
#[utoipa::path(
    post,
    path = "/api/v1/adjustments/{id}/validate",
    responses(
        (status = 200, description = "Adjustment validated"),
        (status = 400, description = "Not in a validatable status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Adjustment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent validation conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "adjustments"
)]
pub async fn validate_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let validated = state.services.adjustments.validate(id, actor).await?;
    Ok(Json(validated))
}

/// Cancel a draft or ready adjustment
#[utoipa::path(
    post,
    path = "/api/v1/adjustments/{id}/cancel",
    responses(
        (status = 200, description = "Adjustment cancelled"),
        (status = 400, description = "Already terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Adjustment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "adjustments"
)]
pub async fn cancel_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_from_headers(&headers);
    let cancelled = state.services.adjustments.cancel(id, actor).await?;
    Ok(Json(cancelled))
}
