use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::warehouses::{NewWarehouse, UpdateWarehouse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/:id", get(get_warehouse).put(update_warehouse))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WarehouseFilters {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Create a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/warehouses",
    request_body = NewWarehouse,
    responses(
        (status = 201, description = "Warehouse created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(input): Json<NewWarehouse>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.warehouses.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List warehouses ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/warehouses",
    responses(
        (status = 200, description = "Warehouse list returned")
    ),
    tag = "warehouses"
)]
pub async fn list_warehouses(
    State(state): State<AppState>,
    Query(filters): Query<WarehouseFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouses = state
        .services
        .warehouses
        .list(filters.include_inactive)
        .await?;
    Ok(Json(warehouses))
}

/// Fetch one warehouse
#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}",
    responses(
        (status = 200, description = "Warehouse returned"),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.warehouses.get(id).await?;
    Ok(Json(warehouse))
}

/// Rename or (de)activate a warehouse
#[utoipa::path(
    put,
    path = "/api/v1/warehouses/{id}",
    request_body = UpdateWarehouse,
    responses(
        (status = 200, description = "Warehouse updated"),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWarehouse>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.warehouses.update(id, input).await?;
    Ok(Json(updated))
}
