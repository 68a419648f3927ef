/// Engine configuration
use crate::error::{EngineError, Result};
use contour_analysis::DEFAULT_PRESET;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Nominal chunk length (seconds)
    #[serde(default = "default_target_chunk_s")]
    pub target_chunk_s: f64,

    /// Overlap between adjacent chunks, crossfaded when stitching (seconds)
    #[serde(default = "default_overlap_s")]
    pub overlap_s: f64,

    /// Shortest chunk the planner will emit (seconds)
    #[serde(default = "default_min_chunk_s")]
    pub min_chunk_s: f64,

    /// Source audio processed ahead of each chunk to settle filters and the
    /// compressor, then discarded (seconds)
    #[serde(default = "default_preroll_s")]
    pub preroll_s: f64,

    /// Concurrent DSP jobs
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// In-memory chunk cache capacity (chunks)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// In-memory chunk cache budget (MiB of sample data)
    ///
    /// A 31 s stereo chunk at 44.1 kHz holds about 10.9 MB of f32 samples,
    /// so the default budget keeps roughly 47 such chunks.
    #[serde(default = "default_cache_memory_mb")]
    pub cache_memory_mb: usize,

    /// Optional on-disk cache tier, purged at startup
    #[serde(default)]
    pub disk_cache_dir: Option<PathBuf>,

    /// Decoded and analyzed tracks kept in memory
    #[serde(default = "default_prepared_tracks")]
    pub prepared_tracks: usize,

    /// Length of the excerpt analyzed per track, centred in the track;
    /// 0 analyzes the whole track (seconds)
    #[serde(default = "default_analysis_window_s")]
    pub analysis_window_s: f64,

    /// Preset used until the transport picks one
    #[serde(default = "default_preset")]
    pub default_preset: String,

    /// Intensity used until the transport picks one
    #[serde(default = "default_intensity")]
    pub default_intensity: f32,
}

fn default_target_chunk_s() -> f64 {
    30.0
}

fn default_overlap_s() -> f64 {
    1.0
}

fn default_min_chunk_s() -> f64 {
    15.0
}

fn default_preroll_s() -> f64 {
    0.5
}

/// Available cores clamped to 2..=8
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(2, 8)
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_memory_mb() -> usize {
    512
}

fn default_prepared_tracks() -> usize {
    4
}

fn default_analysis_window_s() -> f64 {
    60.0
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}

fn default_intensity() -> f32 {
    1.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_chunk_s: default_target_chunk_s(),
            overlap_s: default_overlap_s(),
            min_chunk_s: default_min_chunk_s(),
            preroll_s: default_preroll_s(),
            workers: default_workers(),
            cache_capacity: default_cache_capacity(),
            cache_memory_mb: default_cache_memory_mb(),
            disk_cache_dir: None,
            prepared_tracks: default_prepared_tracks(),
            analysis_window_s: default_analysis_window_s(),
            default_preset: default_preset(),
            default_intensity: default_intensity(),
        }
    }
}

impl EngineConfig {
    /// Memory budget of the chunk cache in bytes
    pub fn cache_memory_bytes(&self) -> usize {
        self.cache_memory_mb.saturating_mul(1024 * 1024)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.target_chunk_s,
            self.overlap_s,
            self.min_chunk_s,
            self.preroll_s,
            self.analysis_window_s,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0);
        if !finite {
            return Err(EngineError::Config(
                "durations must be finite and non-negative".to_string(),
            ));
        }

        if self.target_chunk_s <= 0.0 || self.min_chunk_s <= 0.0 {
            return Err(EngineError::Config(
                "target_chunk_s and min_chunk_s must be positive".to_string(),
            ));
        }

        if self.min_chunk_s > self.target_chunk_s {
            return Err(EngineError::Config(format!(
                "min_chunk_s ({}) cannot exceed target_chunk_s ({})",
                self.min_chunk_s, self.target_chunk_s
            )));
        }

        if self.overlap_s >= self.min_chunk_s {
            return Err(EngineError::Config(format!(
                "overlap_s ({}) must be shorter than min_chunk_s ({})",
                self.overlap_s, self.min_chunk_s
            )));
        }

        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".to_string()));
        }

        if self.cache_capacity == 0 || self.cache_memory_mb == 0 || self.prepared_tracks == 0 {
            return Err(EngineError::Config(
                "cache_capacity, cache_memory_mb and prepared_tracks must be at least 1"
                    .to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.default_intensity) {
            return Err(EngineError::InvalidIntensity(self.default_intensity));
        }

        if contour_analysis::find_anchor(contour_analysis::anchor_table(), &self.default_preset)
            .is_none()
        {
            return Err(EngineError::UnknownPreset(self.default_preset.clone()));
        }

        Ok(())
    }
}
