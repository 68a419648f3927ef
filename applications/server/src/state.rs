/// Shared application state
use contour_engine::{FsTrackLibrary, MasteringEngine};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MasteringEngine>,
    pub library: Arc<FsTrackLibrary>,
}

impl AppState {
    pub fn new(engine: Arc<MasteringEngine>, library: Arc<FsTrackLibrary>) -> Self {
        Self { engine, library }
    }
}
