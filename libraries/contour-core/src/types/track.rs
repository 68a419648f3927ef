/// Library boundary types: track facts and file signatures
use crate::error::{ContourError, Result};
use crate::types::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Cheap, non-cryptographic fingerprint of a file
///
/// Built from the file's modification time, size and path. Replacing the file
/// (or touching it) changes the signature, which makes every cache entry keyed
/// to the old signature unreachable. Re-reading an unchanged file yields the
/// same signature.
///
/// The textual form only contains hex digits and `-`, so it can be used as a
/// directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSignature(String);

impl FileSignature {
    /// Compute the signature for a file
    pub fn compute(path: &Path, mtime: DateTime<Utc>, size: u64) -> Self {
        // DefaultHasher::new() uses fixed keys, so this is stable within a build
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let path_hash = hasher.finish();

        Self(format!(
            "{:x}-{:x}-{:016x}",
            size,
            mtime.timestamp_micros(),
            path_hash
        ))
    }

    /// Rebuild a signature from its textual form (e.g. a cache directory name)
    pub fn from_string(signature: String) -> Self {
        Self(signature)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Facts the library service provides for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track identity
    pub track_id: TrackId,

    /// Location of the source file
    pub file_path: PathBuf,

    /// Track duration in seconds
    pub duration_s: f64,

    /// File modification time
    pub mtime: DateTime<Utc>,

    /// File size in bytes
    pub size: u64,
}

impl TrackInfo {
    /// Build track info by reading the file's metadata from disk
    ///
    /// # Errors
    /// Returns `ContourError::SourceUnavailable` if the file cannot be stat'ed.
    pub fn stat(track_id: TrackId, file_path: impl Into<PathBuf>, duration_s: f64) -> Result<Self> {
        let file_path = file_path.into();
        let metadata = std::fs::metadata(&file_path)
            .map_err(|e| ContourError::source_unavailable(&file_path, e.to_string()))?;
        let modified = metadata
            .modified()
            .map_err(|e| ContourError::source_unavailable(&file_path, e.to_string()))?;

        Ok(Self {
            track_id,
            file_path,
            duration_s,
            mtime: DateTime::<Utc>::from(modified),
            size: metadata.len(),
        })
    }

    /// File signature for the current file facts
    pub fn signature(&self) -> FileSignature {
        FileSignature::compute(&self.file_path, self.mtime, self.size)
    }
}
