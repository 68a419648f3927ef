/// Transport control API routes
///
/// Each change reports how many cached chunks it invalidated.
use crate::{error::Result, state::AppState};
use axum::{extract::State, Json};
use contour_analysis::preset_names;
use contour_engine::ControlState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ControlsResponse {
    #[serde(flatten)]
    pub controls: ControlState,
    pub presets: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ChangeResponse {
    #[serde(flatten)]
    pub controls: ControlState,
    pub invalidated: usize,
}

fn changed(app_state: &AppState, invalidated: usize) -> Json<ChangeResponse> {
    Json(ChangeResponse {
        controls: app_state.engine.controls(),
        invalidated,
    })
}

/// GET /api/mastering
pub async fn get_controls(State(app_state): State<AppState>) -> Json<ControlsResponse> {
    Json(ControlsResponse {
        controls: app_state.engine.controls(),
        presets: preset_names(),
    })
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

/// PUT /api/mastering/enabled
pub async fn set_enabled(
    State(app_state): State<AppState>,
    Json(req): Json<EnabledRequest>,
) -> Json<ChangeResponse> {
    let invalidated = app_state.engine.set_enabled(req.enabled);
    changed(&app_state, invalidated)
}

#[derive(Debug, Deserialize)]
pub struct PresetRequest {
    pub preset: String,
}

/// PUT /api/mastering/preset
pub async fn set_preset(
    State(app_state): State<AppState>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<ChangeResponse>> {
    let invalidated = app_state.engine.set_preset(&req.preset)?;
    Ok(changed(&app_state, invalidated))
}

#[derive(Debug, Deserialize)]
pub struct IntensityRequest {
    pub intensity: f32,
}

/// PUT /api/mastering/intensity
pub async fn set_intensity(
    State(app_state): State<AppState>,
    Json(req): Json<IntensityRequest>,
) -> Result<Json<ChangeResponse>> {
    let invalidated = app_state.engine.set_intensity(req.intensity)?;
    Ok(changed(&app_state, invalidated))
}
