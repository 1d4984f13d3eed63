use crate::api::recommendations::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    services: ServiceStatus,
}

#[derive(Debug, Serialize)]
struct ServiceStatus {
    gemini_configured: bool,
    spotify_api_base: String,
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        services: ServiceStatus {
            gemini_configured: !state.config.gemini_api_key.is_empty(),
            spotify_api_base: state.config.spotify_api_base.clone(),
        },
    })
}
