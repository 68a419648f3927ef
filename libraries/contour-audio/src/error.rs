/// Audio-specific errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AudioError> for contour_core::ContourError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::FileNotFound(path) => {
                contour_core::ContourError::source_unavailable(path, "file not found")
            }
            AudioError::Io(e) => contour_core::ContourError::Io(e),
            other => contour_core::ContourError::audio(other.to_string()),
        }
    }
}
