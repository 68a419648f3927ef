/// Collaborator traits consumed by the engine
use crate::error::Result;
use crate::types::{AudioBuffer, TrackId, TrackInfo};
use async_trait::async_trait;
use std::path::Path;

/// Library/metadata service
///
/// Resolves a track id to the file facts the engine needs: where the file lives,
/// how long it is, and the modification time and size used for the file signature.
///
/// Implementations must re-read file facts on every call so that a replaced file
/// is noticed on the next lookup.
#[async_trait]
pub trait TrackLibrary: Send + Sync {
    /// Look up a track
    ///
    /// Returns `Ok(None)` if the track is not (or no longer) in the library.
    async fn track(&self, id: &TrackId) -> Result<Option<TrackInfo>>;
}

/// Audio loader trait
///
/// Implementers decode an audio file into an interleaved `AudioBuffer`.
pub trait AudioLoader: Send + Sync {
    /// Decode the whole file at `path`
    ///
    /// # Errors
    /// Returns `ContourError::SourceUnavailable` if the file is missing or
    /// unreadable, `ContourError::Audio` if it cannot be decoded.
    fn load(&self, path: &Path) -> Result<AudioBuffer>;
}
