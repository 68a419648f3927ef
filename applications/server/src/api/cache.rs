/// Cache API routes
use crate::state::AppState;
use axum::{extract::State, Json};
use contour_engine::{CacheStats, Invalidation};
use serde::Serialize;

/// GET /api/cache
pub async fn cache_stats(State(app_state): State<AppState>) -> Json<CacheStats> {
    Json(app_state.engine.cache_stats())
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// DELETE /api/cache
/// Drop every cached chunk from both tiers
pub async fn clear_cache(State(app_state): State<AppState>) -> Json<ClearResponse> {
    let removed = app_state.engine.invalidate(&Invalidation::All);
    tracing::info!(removed, "Cache cleared");
    Json(ClearResponse { removed })
}
