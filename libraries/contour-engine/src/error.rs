//! Error types for the mastering engine

use contour_analysis::AnalysisError;
use contour_core::{ContourError, FileSignature, TrackId};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors
///
/// Cache misses are not errors, and analysis or per-chunk DSP failures are
/// recovered inside the engine (conservative profile, unprocessed audio).
/// What reaches the caller is either a bad request or a terminal stream
/// failure.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Track is not known to the library
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Source file missing or unreadable
    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Preset name does not match any anchor
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Intensity outside [0, 1] or not finite
    #[error("Invalid intensity: {0}")]
    InvalidIntensity(f32),

    /// The file changed while its chunks were being processed
    #[error("Track {track_id} changed on disk (was {signature})")]
    StaleSignature {
        track_id: TrackId,
        signature: FileSignature,
    },

    /// Parameter interpolation failed
    #[error("Interpolation failed: {0}")]
    Interpolation(#[from] AnalysisError),

    /// Cached chunk had the wrong length
    #[error("Cache corruption for chunk {index}: expected {expected} samples, found {actual}")]
    CacheCorruption {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Byte range cannot be served
    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Decoding or other audio failure
    #[error("Audio error: {0}")]
    Audio(String),

    /// Disk cache I/O
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Disk cache WAV encoding
    #[error("Cache file error: {0}")]
    CacheFile(#[from] hound::Error),

    /// Background task failed to run
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl EngineError {
    /// Terminal errors end a stream; everything else is a bad request
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::StaleSignature { .. } | Self::Worker(_)
        )
    }
}

impl From<ContourError> for EngineError {
    fn from(err: ContourError) -> Self {
        match err {
            ContourError::TrackNotFound(id) => Self::TrackNotFound(id),
            ContourError::SourceUnavailable { path, reason } => {
                Self::SourceUnavailable { path, reason }
            }
            ContourError::Io(e) => Self::Io(e),
            other => Self::Audio(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_unavailable_maps_through() {
        let err: EngineError = ContourError::source_unavailable("/x.flac", "gone").into();
        assert!(matches!(err, EngineError::SourceUnavailable { .. }));
        assert!(err.is_terminal());
    }

    #[test]
    fn bad_requests_are_not_terminal() {
        assert!(!EngineError::UnknownPreset("x".into()).is_terminal());
        assert!(!EngineError::InvalidIntensity(2.0).is_terminal());
    }
}
