use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use utoipa::OpenApi;

use stockroom_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Business services used by HTTP handlers
    let services = api::services::AppServices::new(
        db_arc.clone(),
        event_sender.clone(),
        cfg.validation_retry_attempts,
    );

    let request_timeout = Duration::from_secs(cfg.request_timeout_secs);
    let addr = cfg.server_addr();

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc,
        config: cfg,
        event_sender,
        services,
    };

    let app = Router::new()
        .route("/", get(service_info))
        .route("/api-docs/openapi.json", get(openapi_spec))
        .nest("/health", api::handlers::health::router())
        .nest("/api/v1", api::handlers::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state);

    info!("stockroom-api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "stockroom-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(api::openapi::ApiDoc::openapi())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown signal received, draining connections");
}
