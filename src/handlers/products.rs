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
use crate::services::products::{NewProduct, UpdateProduct};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(low_stock_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductFilters {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid input or duplicate SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.products.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List products ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses(
        (status = 200, description = "Product list returned")
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.products.list(filters.include_inactive).await?;
    Ok(Json(products))
}

/// Racks at or below their product's reorder level
#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    responses(
        (status = 200, description = "Low stock locations returned")
    ),
    tag = "products"
)]
pub async fn low_stock_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let flagged = state.services.reports.low_stock().await?;
    Ok(Json(flagged))
}

/// Fetch one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    responses(
        (status = 200, description = "Product returned"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.get(id).await?;
    Ok(Json(product))
}

/// Update a product (the SKU is immutable)
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProduct>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.products.update(id, input).await?;
    Ok(Json(updated))
}

/// Deactivate a product (soft delete; history keeps referencing it)
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    responses(
        (status = 200, description = "Product deactivated"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let deactivated = state.services.products.deactivate(id).await?;
    Ok(Json(deactivated))
}
