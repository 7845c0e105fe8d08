use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::MovementKind;
use crate::errors::ServiceError;
use crate::handlers::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(query_movements))
        .route("/by-key", get(history_for_key))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MovementFilters {
    /// One of: receipt, delivery, transfer_in, transfer_out, adjustment
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    100
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KeyQuery {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub rack_location: String,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// Movement audit feed, newest first
#[utoipa::path(
    get,
    path = "/api/v1/movements",
    responses(
        (status = 200, description = "Movements returned"),
        (status = 400, description = "Unknown movement kind", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn query_movements(
    State(state): State<AppState>,
    Query(filters): Query<MovementFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let kind = match filters.kind.as_deref() {
        None | Some("all") => None,
        Some(raw) => Some(MovementKind::from_str(raw).ok_or_else(|| {
            ServiceError::ValidationError(format!("unknown movement kind '{}'", raw))
        })?),
    };

    let rows = state
        .services
        .movements
        .query(kind, filters.limit, filters.offset)
        .await?;
    Ok(Json(rows))
}

/// Chronological ledger history for one (product, warehouse, rack) key
#[utoipa::path(
    get,
    path = "/api/v1/movements/by-key",
    responses(
        (status = 200, description = "Key history returned")
    ),
    tag = "movements"
)]
pub async fn history_for_key(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .movements
        .history_for_key(
            query.product_id,
            query.warehouse_id,
            &query.rack_location,
            query.limit,
            query.offset,
        )
        .await?;
    Ok(Json(rows))
}
