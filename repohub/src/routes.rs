use axum::{
    Router,
    response::Json,
    routing::get,
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::handlers;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/platforms",
            get(handlers::platforms::list_platforms).post(handlers::platforms::create_platform),
        )
        .route(
            "/api/platforms/{id}",
            get(handlers::platforms::get_platform)
                .patch(handlers::platforms::update_platform)
                .delete(handlers::platforms::delete_platform),
        )
        .route("/api/packages", get(handlers::packages::list_packages))
        .route(
            "/api/packages/{platform}/{id}",
            get(handlers::packages::get_package),
        )
        .route(
            "/api/sync",
            get(handlers::sync::sync_info).post(handlers::sync::trigger_sync),
        )
        .route(
            "/api/sync-status",
            get(handlers::sync::get_sync_status).post(handlers::sync::update_sync_status),
        )
        .route(
            "/api/support/status",
            get(handlers::support::support_status),
        )
        .route(
            "/api/scripts",
            axum::routing::post(handlers::scripts::generate_script),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "repohub"
    }))
}
