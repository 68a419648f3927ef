/// Health check API routes
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tracks: usize,
    pub workers: usize,
    pub enhancement_enabled: bool,
}

/// GET /api/health - Health check endpoint
pub async fn health(State(app_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracks: app_state.library.tracks().len(),
        workers: app_state.engine.config().workers,
        enhancement_enabled: app_state.engine.controls().enabled,
    })
}
