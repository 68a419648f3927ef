/// Server error types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contour_engine::EngineError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TrackNotFound(id) => ServerError::NotFound(format!("Track not found: {}", id)),
            EngineError::UnknownPreset(_) | EngineError::InvalidIntensity(_) => {
                ServerError::BadRequest(err.to_string())
            }
            EngineError::RangeNotSatisfiable(msg) => ServerError::RangeNotSatisfiable(msg),
            EngineError::SourceUnavailable { .. } | EngineError::StaleSignature { .. } => {
                ServerError::Unavailable(err.to_string())
            }
            EngineError::Config(msg) => ServerError::Config(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<contour_core::ContourError> for ServerError {
    fn from(err: contour_core::ContourError) -> Self {
        EngineError::from(err).into()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ServerError::RangeNotSatisfiable(msg) => (StatusCode::RANGE_NOT_SATISFIABLE, msg),
            ServerError::Unavailable(msg) => {
                tracing::warn!("Source unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ServerError::Config(ref msg) => {
                tracing::error!("Config error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                )
            }
            ServerError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ServerError::Io(ref e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
