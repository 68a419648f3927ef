//! Chunk cache
//!
//! Content-addressed store of processed chunks. The key carries everything
//! that determines a chunk's content (track, file signature, preset,
//! intensity, index), so a stale entry can never be returned for a changed
//! file or changed settings: it simply misses.
//!
//! Two tiers:
//! - memory: `LruCache` of `Arc`'d buffers, bounded by chunk count and by
//!   payload bytes; the lock only covers metadata
//! - disk (optional): 32-bit float WAV files under
//!   `<dir>/<hex track id>/<signature>/<preset>-<intensity>-<index>.wav`,
//!   written to a temp file and renamed into place

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use contour_core::{AudioBuffer, AudioFormat, FileSignature, PresetName, SampleRate, TrackId};
use lru::LruCache;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub track_id: TrackId,
    pub signature: FileSignature,
    pub preset: PresetName,
    /// Intensity in thousandths
    pub intensity_milli: u16,
    pub chunk_index: usize,
}

impl CacheKey {
    pub fn new(
        track_id: TrackId,
        signature: FileSignature,
        preset: PresetName,
        intensity: f32,
        chunk_index: usize,
    ) -> Self {
        Self {
            track_id,
            signature,
            preset,
            intensity_milli: quantize_intensity(intensity),
            chunk_index,
        }
    }

    /// Same key for another chunk of the track
    pub fn with_index(&self, chunk_index: usize) -> Self {
        Self {
            chunk_index,
            ..self.clone()
        }
    }

    /// Intensity as a fraction
    pub fn intensity(&self) -> f32 {
        f32::from(self.intensity_milli) / 1000.0
    }
}

/// Quantize an intensity in [0, 1] to thousandths
pub fn quantize_intensity(intensity: f32) -> u16 {
    if intensity.is_finite() {
        (intensity.clamp(0.0, 1.0) * 1000.0).round() as u16
    } else {
        0
    }
}

/// A processed chunk
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub processed: Arc<AudioBuffer>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, processed: Arc<AudioBuffer>) -> Self {
        Self {
            key,
            processed,
            created_at: Utc::now(),
        }
    }
}

/// Which entries to drop
#[derive(Debug, Clone, PartialEq)]
pub enum Invalidation {
    All,
    Track(TrackId),
    Preset(PresetName),
    TrackPreset(TrackId, PresetName),
    TrackIntensity(TrackId, f32),
    /// Every entry for the track whose signature differs from the current one
    StaleSignature(TrackId, FileSignature),
}

impl Invalidation {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Self::All => true,
            Self::Track(id) => key.track_id == *id,
            Self::Preset(preset) => key.preset == *preset,
            Self::TrackPreset(id, preset) => key.track_id == *id && key.preset == *preset,
            Self::TrackIntensity(id, intensity) => {
                key.track_id == *id && key.intensity_milli == quantize_intensity(*intensity)
            }
            Self::StaleSignature(id, current) => key.track_id == *id && key.signature != *current,
        }
    }
}

/// Default memory budget of a cache built with `ChunkCache::new`
pub const DEFAULT_MEMORY_BUDGET: usize = 512 * 1024 * 1024;

/// Payload size of a buffer in memory
fn payload_bytes(buffer: &AudioBuffer) -> usize {
    buffer.len() * std::mem::size_of::<f32>()
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    /// Payload bytes held in memory
    pub bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub corruptions: u64,
    pub disk_enabled: bool,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    corruptions: AtomicU64,
}

/// Memory tier: LRU order plus a running byte total
struct MemoryTier {
    entries: LruCache<CacheKey, CacheEntry>,
    bytes: usize,
    capacity: usize,
    max_bytes: usize,
}

impl MemoryTier {
    fn get(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).cloned()
    }

    /// Insert `entry`, then evict least recently used entries until both
    /// limits hold. The new entry itself is never evicted. Returns the
    /// evicted keys.
    fn insert(&mut self, entry: CacheEntry) -> Vec<CacheKey> {
        self.bytes += payload_bytes(&entry.processed);
        if let Some(old) = self.entries.put(entry.key.clone(), entry) {
            self.bytes -= payload_bytes(&old.processed);
        }

        let mut evicted = Vec::new();
        while self.entries.len() > 1
            && (self.entries.len() > self.capacity || self.bytes > self.max_bytes)
        {
            let Some((key, old)) = self.entries.pop_lru() else {
                break;
            };
            self.bytes -= payload_bytes(&old.processed);
            evicted.push(key);
        }
        evicted
    }

    fn pop(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.bytes -= payload_bytes(&entry.processed);
        Some(entry)
    }

    fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        self.bytes = 0;
        n
    }
}

/// Two-tier chunk cache
pub struct ChunkCache {
    memory: Mutex<MemoryTier>,
    disk: Option<DiskTier>,
    counters: Counters,
}

impl ChunkCache {
    /// Memory-only cache holding up to `capacity` chunks within
    /// `DEFAULT_MEMORY_BUDGET` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: Mutex::new(MemoryTier {
                entries: LruCache::unbounded(),
                bytes: 0,
                capacity: capacity.max(1),
                max_bytes: DEFAULT_MEMORY_BUDGET,
            }),
            disk: None,
            counters: Counters::default(),
        }
    }

    /// Bound the memory tier by payload bytes as well
    pub fn with_memory_budget(self, max_bytes: usize) -> Self {
        self.memory().max_bytes = max_bytes.max(1);
        self
    }

    /// Add a disk tier rooted at `dir`
    pub fn with_disk(mut self, dir: impl Into<PathBuf>) -> Self {
        self.disk = Some(DiskTier::new(dir.into()));
        self
    }

    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a chunk, falling back to the disk tier
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.memory().get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry);
        }

        if let Some(disk) = &self.disk {
            match disk.read(key) {
                Ok(Some(buffer)) => {
                    let entry = CacheEntry::new(key.clone(), Arc::new(buffer));
                    self.insert_memory(entry.clone());
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, chunk = key.chunk_index, "Unreadable disk cache entry");
                    disk.remove(key);
                }
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Look up a chunk and verify its shape
    ///
    /// An entry with the wrong number of samples is counted as corrupt,
    /// evicted from both tiers, and reported as a miss.
    pub fn get_checked(
        &self,
        key: &CacheKey,
        expected_frames: usize,
        channels: usize,
    ) -> Option<CacheEntry> {
        let entry = self.get(key)?;
        let expected = expected_frames * channels;
        let actual = entry.processed.len();
        if actual == expected && entry.processed.channels() == channels {
            return Some(entry);
        }

        let err = EngineError::CacheCorruption {
            index: key.chunk_index,
            expected,
            actual,
        };
        tracing::warn!(track = %key.track_id, error = %err, "Evicting corrupt cache entry");
        self.counters.corruptions.fetch_add(1, Ordering::Relaxed);
        self.counters.hits.fetch_sub(1, Ordering::Relaxed);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.remove(key);
        None
    }

    /// True if either tier holds `key`; does not touch statistics or recency
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.memory().entries.contains(key) || self.disk.as_ref().is_some_and(|d| d.path(key).exists())
    }

    /// Store a chunk, replacing any previous entry for the key
    pub fn put(&self, key: CacheKey, processed: Arc<AudioBuffer>) {
        let entry = CacheEntry::new(key, processed);
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.write(&entry.key, &entry.processed) {
                tracing::warn!(error = %e, chunk = entry.key.chunk_index, "Disk cache write failed");
            }
        }
        self.insert_memory(entry);
    }

    fn insert_memory(&self, entry: CacheEntry) {
        let evicted = self.memory().insert(entry);
        for key in evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(track = %key.track_id, chunk = key.chunk_index, "Evicted chunk");
        }
    }

    fn remove(&self, key: &CacheKey) {
        self.memory().pop(key);
        if let Some(disk) = &self.disk {
            disk.remove(key);
        }
    }

    /// Drop every entry matching `scope`; returns the number of entries
    /// removed from the memory tier (or from disk when only there)
    pub fn invalidate(&self, scope: &Invalidation) -> usize {
        let removed_memory = {
            let mut memory = self.memory();
            let doomed: Vec<CacheKey> = memory
                .entries
                .iter()
                .filter(|(key, _)| scope.matches(key))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &doomed {
                memory.pop(key);
            }
            doomed.len()
        };

        let removed_disk = match &self.disk {
            Some(disk) => disk.invalidate(scope),
            None => 0,
        };

        let removed = removed_memory.max(removed_disk);
        if removed > 0 {
            tracing::debug!(?scope, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Empty both tiers (the disk tier is removed and recreated)
    pub fn purge(&self) -> Result<usize> {
        let removed = self.memory().clear();
        match &self.disk {
            Some(disk) => Ok(removed.max(disk.purge()?)),
            None => Ok(removed),
        }
    }

    pub fn len(&self) -> usize {
        self.memory().entries.len()
    }

    /// Payload bytes held in memory
    pub fn memory_bytes(&self) -> usize {
        self.memory().bytes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently in memory, most recently used first
    pub fn keys(&self) -> Vec<CacheKey> {
        self.memory().entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, capacity, bytes, max_bytes) = {
            let memory = self.memory();
            (memory.entries.len(), memory.capacity, memory.bytes, memory.max_bytes)
        };
        CacheStats {
            entries,
            capacity,
            bytes,
            max_bytes,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            corruptions: self.counters.corruptions.load(Ordering::Relaxed),
            disk_enabled: self.disk.is_some(),
        }
    }
}

/// On-disk tier
struct DiskTier {
    root: PathBuf,
}

impl DiskTier {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn track_dir(&self, track_id: &TrackId) -> PathBuf {
        self.root.join(hex::encode(track_id.as_str()))
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.track_dir(&key.track_id)
            .join(key.signature.as_str())
            .join(file_name(&key.preset, key.intensity_milli, key.chunk_index))
    }

    fn read(&self, key: &CacheKey) -> Result<Option<AudioBuffer>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = hound::WavReader::open(&path)?;
        let spec = reader.spec();
        let samples = reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()?;
        let format = AudioFormat::new(SampleRate::new(spec.sample_rate), spec.channels, 32);
        Ok(Some(AudioBuffer::new(samples, format)))
    }

    fn write(&self, key: &CacheKey, buffer: &AudioBuffer) -> Result<()> {
        let path = self.path(key);
        let dir = path
            .parent()
            .ok_or_else(|| EngineError::Config(format!("bad cache path {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let spec = hound::WavSpec {
            channels: buffer.format.channels,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let tmp = path.with_extension("wav.tmp");
        {
            let mut writer = hound::WavWriter::create(&tmp, spec)?;
            for &sample in &buffer.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &CacheKey) {
        let path = self.path(key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            }
        }
    }

    fn invalidate(&self, scope: &Invalidation) -> usize {
        match self.entries() {
            Ok(entries) => entries
                .into_iter()
                .filter(|(key, _)| scope.matches(key))
                .filter(|(_, path)| fs::remove_file(path).is_ok())
                .count(),
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "Failed to scan disk cache");
                0
            }
        }
    }

    /// Every complete entry on disk with its parsed key
    fn entries(&self) -> Result<Vec<(CacheKey, PathBuf)>> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }
        for track_dir in fs::read_dir(&self.root)? {
            let track_dir = track_dir?.path();
            let Some(track_id) = track_dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|name| hex::decode(name).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                continue;
            };
            if !track_dir.is_dir() {
                continue;
            }
            for sig_dir in fs::read_dir(&track_dir)? {
                let sig_dir = sig_dir?.path();
                let Some(signature) = sig_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !sig_dir.is_dir() {
                    continue;
                }
                let signature = FileSignature::from_string(signature.to_string());
                for file in fs::read_dir(&sig_dir)? {
                    let file = file?.path();
                    if let Some((preset, intensity_milli, chunk_index)) =
                        file.file_name().and_then(|n| n.to_str()).and_then(parse_file_name)
                    {
                        found.push((
                            CacheKey {
                                track_id: TrackId::new(track_id.clone()),
                                signature: signature.clone(),
                                preset,
                                intensity_milli,
                                chunk_index,
                            },
                            file,
                        ));
                    }
                }
            }
        }
        Ok(found)
    }

    fn purge(&self) -> Result<usize> {
        let count = self.entries().map(|e| e.len()).unwrap_or(0);
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.root)?;
        tracing::info!(root = %self.root.display(), removed = count, "Purged disk cache");
        Ok(count)
    }
}

fn file_name(preset: &PresetName, intensity_milli: u16, chunk_index: usize) -> String {
    format!("{}-{:04}-{:05}.wav", preset.as_str(), intensity_milli, chunk_index)
}

fn parse_file_name(name: &str) -> Option<(PresetName, u16, usize)> {
    let stem = name.strip_suffix(".wav")?;
    let mut parts = stem.rsplitn(3, '-');
    let chunk_index = parts.next()?.parse().ok()?;
    let intensity_milli = parts.next()?.parse().ok()?;
    let preset = parts.next()?;
    Some((PresetName::new(preset), intensity_milli, chunk_index))
}

/// Disk location of `key` under `root`
pub fn disk_path_for(root: &Path, key: &CacheKey) -> PathBuf {
    DiskTier::new(root.to_path_buf()).path(key)
}
