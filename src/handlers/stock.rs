use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(query_stock))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockFilters {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

/// Current stock per (product, warehouse, rack), largest quantities first
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    responses(
        (status = 200, description = "Stock locations returned")
    ),
    tag = "stock"
)]
pub async fn query_stock(
    State(state): State<AppState>,
    Query(filters): Query<StockFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .stock
        .query(filters.product_id, filters.warehouse_id)
        .await?;
    Ok(Json(rows))
}
