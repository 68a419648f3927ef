//! Filesystem-backed track library
//!
//! Maps track ids to files. Every lookup stats the file again, so a replaced
//! or touched file shows up with a new signature on the next request and a
//! deleted file is reported as gone. Durations are probed once per signature.

use async_trait::async_trait;
use contour_audio::SymphoniaDecoder;
use contour_core::{ContourError, FileSignature, TrackId, TrackInfo, TrackLibrary};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use walkdir::WalkDir;

/// Track library over plain files
#[derive(Default)]
pub struct FsTrackLibrary {
    tracks: RwLock<HashMap<TrackId, PathBuf>>,
    durations: Mutex<HashMap<FileSignature, f64>>,
}

impl FsTrackLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under `id`, replacing any previous mapping
    pub fn add(&self, id: TrackId, path: impl Into<PathBuf>) {
        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, path.into());
    }

    pub fn remove(&self, id: &TrackId) -> Option<PathBuf> {
        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Register every supported audio file under `dir`, recursively
    ///
    /// Track ids are paths relative to `dir` with `/` separators. Symlinks
    /// are followed; loops are skipped.
    pub fn scan_directory(&self, dir: &Path) -> contour_core::Result<usize> {
        let mut found = collect_audio_files(dir)?;
        found.sort();

        let count = found.len();
        for path in found {
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            self.add(TrackId::new(id), path);
        }
        tracing::info!(dir = %dir.display(), tracks = count, "Scanned music directory");
        Ok(count)
    }

    /// Registered tracks, sorted by id
    pub fn tracks(&self) -> Vec<(TrackId, PathBuf)> {
        let mut tracks: Vec<_> = self
            .tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, path)| (id.clone(), path.clone()))
            .collect();
        tracks.sort();
        tracks
    }

    pub fn path(&self, id: &TrackId) -> Option<PathBuf> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    async fn duration(&self, path: &Path, signature: &FileSignature) -> contour_core::Result<f64> {
        if let Some(&duration) = self
            .durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signature)
        {
            return Ok(duration);
        }

        let owned = path.to_path_buf();
        let duration = tokio::task::spawn_blocking(move || SymphoniaDecoder::new().probe_duration(&owned))
            .await
            .map_err(|e| ContourError::Other(e.to_string()))??;

        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature.clone(), duration);
        Ok(duration)
    }
}

#[async_trait]
impl TrackLibrary for FsTrackLibrary {
    async fn track(&self, id: &TrackId) -> contour_core::Result<Option<TrackInfo>> {
        let Some(path) = self.path(id) else {
            return Ok(None);
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(track = %id, path = %path.display(), "Track file is gone");
                return Ok(None);
            }
            Err(e) => return Err(ContourError::source_unavailable(&path, e.to_string())),
        };
        let mtime = metadata
            .modified()
            .map_err(|e| ContourError::source_unavailable(&path, e.to_string()))?;
        let mtime = DateTime::<Utc>::from(mtime);
        let size = metadata.len();

        let signature = FileSignature::compute(&path, mtime, size);
        let duration_s = self.duration(&path, &signature).await?;

        Ok(Some(TrackInfo {
            track_id: id.clone(),
            file_path: path,
            duration_s,
            mtime,
            size,
        }))
    }
}

fn collect_audio_files(dir: &Path) -> contour_core::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ContourError::InvalidInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let files = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable library entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| SymphoniaDecoder::supports_format(path))
        .collect();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, frames: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn unknown_track_is_none() {
        let library = FsTrackLibrary::new();
        assert!(library.track(&TrackId::new("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_file_and_probes_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 16_000);

        let library = FsTrackLibrary::new();
        library.add(TrackId::new("a"), &path);
        let info = library.track(&TrackId::new("a")).await.unwrap().unwrap();
        assert!((info.duration_s - 2.0).abs() < 1e-6);
        assert_eq!(info.size, std::fs::metadata(&path).unwrap().len());

        let again = library.track(&TrackId::new("a")).await.unwrap().unwrap();
        assert_eq!(info.signature(), again.signature());
    }

    #[tokio::test]
    async fn replaced_file_gets_new_signature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 16_000);

        let library = FsTrackLibrary::new();
        library.add(TrackId::new("a"), &path);
        let before = library.track(&TrackId::new("a")).await.unwrap().unwrap();

        write_wav(&path, 24_000);
        let after = library.track(&TrackId::new("a")).await.unwrap().unwrap();
        assert_ne!(before.signature(), after.signature());
        assert!((after.duration_s - 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn deleted_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 800);

        let library = FsTrackLibrary::new();
        library.add(TrackId::new("a"), &path);
        std::fs::remove_file(&path).unwrap();
        assert!(library.track(&TrackId::new("a")).await.unwrap().is_none());
    }

    #[test]
    fn scan_uses_relative_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("album")).unwrap();
        write_wav(&dir.path().join("album").join("one.wav"), 800);
        write_wav(&dir.path().join("two.wav"), 800);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let library = FsTrackLibrary::new();
        assert_eq!(library.scan_directory(dir.path()).unwrap(), 2);
        let ids: Vec<String> = library.tracks().into_iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["album/one.wav", "two.wav"]);
    }

    #[test]
    fn scan_of_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let library = FsTrackLibrary::new();
        assert!(library.scan_directory(&dir.path().join("nope")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn scan_survives_symlink_loops() {
        let dir = tempfile::tempdir().unwrap();
        let album = dir.path().join("album");
        std::fs::create_dir(&album).unwrap();
        write_wav(&album.join("one.wav"), 800);
        std::os::unix::fs::symlink(dir.path(), album.join("loop")).unwrap();

        let library = FsTrackLibrary::new();
        assert_eq!(library.scan_directory(dir.path()).unwrap(), 1);
        assert_eq!(library.tracks()[0].0.to_string(), "album/one.wav");
    }
}
