//! Contour Server Library
//!
//! HTTP adapter over the mastering engine: track listing, mastered WAV
//! streaming with byte ranges, transport controls and cache statistics.
//!
//! This library exposes the router and state so tests can drive the API
//! without binding a socket.

pub mod api;
pub mod config;
pub mod error;
pub mod state;

use axum::{
    routing::{get, put},
    Router,
};
use contour_audio::SymphoniaDecoder;
use contour_core::TrackId;
use contour_engine::{FsTrackLibrary, MasteringEngine};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

// Re-export commonly used types for convenience
pub use config::{LibrarySettings, ServerConfig, TrackEntry};
pub use error::{Result, ServerError};
pub use state::AppState;

/// Build the track library described by `settings`
pub fn build_library(settings: &LibrarySettings) -> Result<FsTrackLibrary> {
    let library = FsTrackLibrary::new();
    if let Some(dir) = &settings.music_dir {
        library.scan_directory(dir)?;
    }
    for entry in &settings.tracks {
        library.add(TrackId::new(entry.id.clone()), entry.path.clone());
    }
    Ok(library)
}

/// Build the library and engine for a validated configuration
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let library = Arc::new(build_library(&config.library)?);
    let engine = MasteringEngine::new(
        config.engine.clone(),
        library.clone(),
        Arc::new(SymphoniaDecoder::new()),
    )?;
    Ok(AppState::new(Arc::new(engine), library))
}

/// All API routes under `/api`
pub fn create_router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(api::health::health))
        // Tracks
        .route("/tracks", get(api::tracks::list_tracks))
        .route("/tracks/:id", get(api::tracks::get_track))
        .route("/tracks/:id/analysis", get(api::tracks::analyze_track))
        // Streaming
        .route("/stream/:track_id", get(api::stream::stream_track))
        // Transport controls
        .route("/mastering", get(api::mastering::get_controls))
        .route("/mastering/enabled", put(api::mastering::set_enabled))
        .route("/mastering/preset", put(api::mastering::set_preset))
        .route("/mastering/intensity", put(api::mastering::set_intensity))
        // Cache
        .route(
            "/cache",
            get(api::cache::cache_stats).delete(api::cache::clear_cache),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
