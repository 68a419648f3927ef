//! Content descriptors produced by the analyzer

use serde::{Deserialize, Serialize};

/// Coarse energy classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    /// Quiet, sparse material
    Low,
    /// Typical levels
    Medium,
    /// Loud, driven material
    High,
}

impl EnergyLevel {
    /// Classify by RMS level (dBFS)
    ///
    /// Above -14 dB is high, above -22 dB is medium, anything else is low.
    pub fn from_rms_db(rms_db: f32) -> Self {
        if rms_db > -14.0 {
            Self::High
        } else if rms_db > -22.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Score used by the spectrum mapper
    pub fn score(&self) -> f32 {
        match self {
            Self::Low => 0.2,
            Self::Medium => 0.5,
            Self::High => 0.85,
        }
    }
}

/// Scalar descriptors of one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentProfile {
    /// RMS level across all channels (dBFS)
    pub rms_db: f32,

    /// Sample peak (dBFS)
    pub peak_db: f32,

    /// Peak minus RMS (dB)
    pub crest_db: f32,

    /// Magnitude-weighted mean frequency (Hz)
    pub spectral_centroid_hz: f32,

    /// Frequency below which 85% of the spectral energy lies (Hz)
    pub spectral_rolloff_hz: f32,

    /// Coarse energy class
    pub energy_level: EnergyLevel,

    /// Spread of short-term levels, 0 (flat) to 1 (highly varied)
    pub dynamic_complexity: f32,

    /// Detected onsets per second
    pub onset_density: f32,

    /// EBU R128 integrated loudness (LUFS), when measurable
    pub integrated_lufs: Option<f64>,

    /// EBU R128 loudness range (LU), when measurable
    pub loudness_range_lu: Option<f64>,

    /// Seconds of audio the profile was computed from
    pub analyzed_seconds: f64,
}

impl ContentProfile {
    /// Middle-of-the-road profile used when analysis fails
    ///
    /// Maps to a position near the centre of the characteristic space, so the
    /// interpolator leans on the `adaptive` anchor and no content rule fires.
    pub fn conservative() -> Self {
        Self {
            rms_db: -18.0,
            peak_db: -4.0,
            crest_db: 14.0,
            spectral_centroid_hz: 1600.0,
            spectral_rolloff_hz: 4000.0,
            energy_level: EnergyLevel::Medium,
            dynamic_complexity: 0.5,
            onset_density: 3.0,
            integrated_lufs: None,
            loudness_range_lu: None,
            analyzed_seconds: 0.0,
        }
    }
}
