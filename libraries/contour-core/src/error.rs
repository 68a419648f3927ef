/// Core error types for Contour
use crate::types::TrackId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ContourError`
pub type Result<T> = std::result::Result<T, ContourError>;

/// Core error type for Contour
#[derive(Error, Debug)]
pub enum ContourError {
    /// Audio decoding errors
    #[error("Audio error: {0}")]
    Audio(String),

    /// Content analysis errors
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Track is not known to the library
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Source file missing or unreadable
    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ContourError {
    /// Create an audio error
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    /// Create a source unavailable error
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
