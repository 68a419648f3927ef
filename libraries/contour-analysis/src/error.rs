//! Error types for analysis and interpolation

use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors from the analyzer and the parameter interpolator
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// No samples were provided for analysis
    #[error("No audio samples provided for analysis")]
    NoSamples,

    /// Buffer format cannot be analyzed
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// EBU R128 measurement error
    #[error("EBU R128 analysis failed: {0}")]
    Loudness(String),

    /// Interpolation was asked to blend zero anchors
    #[error("Anchor table is empty")]
    EmptyAnchorTable,

    /// Hint names an anchor that does not exist
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Position contains NaN or infinity
    #[error("Spectrum position is not finite")]
    NonFinitePosition,
}

impl From<ebur128::Error> for AnalysisError {
    fn from(err: ebur128::Error) -> Self {
        Self::Loudness(format!("{:?}", err))
    }
}

impl From<AnalysisError> for contour_core::ContourError {
    fn from(err: AnalysisError) -> Self {
        contour_core::ContourError::analysis(err.to_string())
    }
}
