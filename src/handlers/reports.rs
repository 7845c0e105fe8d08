use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use crate::errors::ServiceError;
use crate::handlers::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/low-stock", get(low_stock))
}

/// Headline counts for the landing dashboard
#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    responses(
        (status = 200, description = "Dashboard summary returned", body = crate::services::reports::DashboardSummary)
    ),
    tag = "reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.reports.dashboard().await?;
    Ok(Json(summary))
}

/// Racks at or below their product's reorder level
#[utoipa::path(
    get,
    path = "/api/v1/reports/low-stock",
    responses(
        (status = 200, description = "Low stock locations returned", body = [crate::services::reports::LowStockLocation])
    ),
    tag = "reports"
)]
pub async fn low_stock(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let flagged = state.services.reports.low_stock().await?;
    Ok(Json(flagged))
}
