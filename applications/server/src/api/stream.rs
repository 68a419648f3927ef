/// Mastered audio streaming API
use crate::{
    error::{Result, ServerError},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use contour_core::TrackId;
use contour_engine::{ByteRange, MasteredStream};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub intensity: Option<f32>,
}

/// GET /api/stream/:track_id
/// Stream the mastered track as 16-bit WAV with range request support
pub async fn stream_track(
    Path(track_id): Path<String>,
    State(app_state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let track_id = TrackId::new(track_id);
    let range = parse_range_header(&headers)?;

    let stream = app_state
        .engine
        .get_stream(&track_id, query.preset.as_deref(), query.intensity, range)
        .await?;

    tracing::debug!(
        track = %track_id,
        enhanced = stream.enhanced,
        range = ?stream.range,
        bytes = stream.content_length(),
        "Streaming"
    );
    build_response(stream)
}

/// `Range` header, if present and well formed
///
/// Syntactically invalid ranges are ignored and the whole file is served.
fn parse_range_header(headers: &HeaderMap) -> Result<Option<ByteRange>> {
    let Some(value) = headers.get(header::RANGE) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ServerError::BadRequest("Invalid Range header".to_string()))?;
    Ok(ByteRange::parse(value))
}

fn build_response(stream: MasteredStream) -> Result<Response> {
    let total_len = stream.total_len();
    let content_length = stream.content_length();
    let range = stream.range;
    let enhanced = if stream.enhanced { "true" } else { "false" };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header("x-contour-enhanced", HeaderValue::from_static(enhanced));

    builder = match range {
        Some((start, end)) => builder.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, total_len),
        ),
        None => builder.status(StatusCode::OK),
    };

    builder
        .body(Body::from_stream(stream.into_body()))
        .map_err(|e| ServerError::Internal(format!("Failed to build response: {}", e)))
}
