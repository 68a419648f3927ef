/// Tracks API routes
use crate::{
    error::{Result, ServerError},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use contour_core::{TrackId, TrackLibrary};
use contour_engine::TrackAnalysis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct TrackSummary {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct TracksResponse {
    pub tracks: Vec<TrackSummary>,
    pub total: usize,
}

/// GET /api/tracks
pub async fn list_tracks(State(app_state): State<AppState>) -> Json<TracksResponse> {
    let tracks: Vec<TrackSummary> = app_state
        .library
        .tracks()
        .into_iter()
        .map(|(id, path)| TrackSummary {
            id: id.to_string(),
            path: path.display().to_string(),
        })
        .collect();

    Json(TracksResponse {
        total: tracks.len(),
        tracks,
    })
}

#[derive(Debug, Serialize)]
pub struct TrackDetails {
    pub id: String,
    pub path: String,
    pub duration_s: f64,
    pub size: u64,
    pub modified: String,
    pub signature: String,
}

/// GET /api/tracks/:id
pub async fn get_track(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<Json<TrackDetails>> {
    let track_id = TrackId::new(id);
    let info = app_state
        .library
        .track(&track_id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Track not found".to_string()))?;

    Ok(Json(TrackDetails {
        id: info.track_id.to_string(),
        path: info.file_path.display().to_string(),
        duration_s: info.duration_s,
        size: info.size,
        modified: info.mtime.to_rfc3339(),
        signature: info.signature().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub intensity: Option<f32>,
}

/// GET /api/tracks/:id/analysis
/// Content profile, spectrum position, anchor weights and parameters
pub async fn analyze_track(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<TrackAnalysis>> {
    let analysis = app_state
        .engine
        .analyze(&TrackId::new(id), query.preset.as_deref(), query.intensity)
        .await?;
    Ok(Json(analysis))
}
