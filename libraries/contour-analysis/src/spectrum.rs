//! Spectrum position: a track's place in the 5-D characteristic space
//!
//! Every dimension is an independent, monotonic, clamped mapping from one or
//! two analyzer descriptors. Non-finite descriptors map to the lower endpoint,
//! so no input can produce a coordinate outside [0, 1].
//!
//! | dimension        | source                                   | endpoints                              |
//! |------------------|------------------------------------------|----------------------------------------|
//! | input_level      | rms_db                                   | -30 dB -> 0, -10 dB -> 1               |
//! | dynamic_range    | crest_db                                 | 6 dB -> 0, 20 dB -> 1                  |
//! | spectral_balance | 70% centroid, 30% rolloff (log freq)     | 500 Hz..5 kHz, 1 kHz..12 kHz           |
//! | energy           | 70% energy level score, 30% peak_db      | low/medium/high 0.2/0.5/0.85, -24..0 dB |
//! | density          | 60% onset density, 40% complexity        | 0..8 onsets/s, 0..1                    |

use crate::profile::ContentProfile;
use serde::{Deserialize, Serialize};

/// Mapping endpoints; tune here
pub mod endpoints {
    /// RMS range for `input_level` (dBFS)
    pub const RMS_DB: (f32, f32) = (-30.0, -10.0);
    /// Crest factor range for `dynamic_range` (dB)
    pub const CREST_DB: (f32, f32) = (6.0, 20.0);
    /// Centroid range for `spectral_balance` (Hz, log-mapped)
    pub const CENTROID_HZ: (f32, f32) = (500.0, 5000.0);
    /// Rolloff range for `spectral_balance` (Hz, log-mapped)
    pub const ROLLOFF_HZ: (f32, f32) = (1000.0, 12_000.0);
    /// Peak range for `energy` (dBFS)
    pub const PEAK_DB: (f32, f32) = (-24.0, 0.0);
    /// Onset density range for `density` (onsets per second)
    pub const ONSETS_PER_S: (f32, f32) = (0.0, 8.0);
    /// Centroid share of `spectral_balance`
    pub const CENTROID_WEIGHT: f32 = 0.7;
    /// Energy-level share of `energy`
    pub const ENERGY_LEVEL_WEIGHT: f32 = 0.7;
    /// Onset share of `density`
    pub const ONSET_WEIGHT: f32 = 0.6;
}

/// Point in the characteristic space, every coordinate in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPosition {
    /// How loud the source is
    pub input_level: f32,

    /// How much headroom between peaks and average level (high = dynamic)
    pub dynamic_range: f32,

    /// Dark (0) to bright (1)
    pub spectral_balance: f32,

    /// Perceived drive
    pub energy: f32,

    /// Event density and level variation
    pub density: f32,
}

impl SpectrumPosition {
    /// Build a position, clamping every coordinate into [0, 1]
    pub fn new(
        input_level: f32,
        dynamic_range: f32,
        spectral_balance: f32,
        energy: f32,
        density: f32,
    ) -> Self {
        Self {
            input_level: unit(input_level),
            dynamic_range: unit(dynamic_range),
            spectral_balance: unit(spectral_balance),
            energy: unit(energy),
            density: unit(density),
        }
    }

    /// Centre of the space
    pub const fn centre() -> Self {
        Self {
            input_level: 0.5,
            dynamic_range: 0.5,
            spectral_balance: 0.5,
            energy: 0.5,
            density: 0.5,
        }
    }

    /// Coordinates as an array, in declaration order
    pub fn as_array(&self) -> [f32; 5] {
        [
            self.input_level,
            self.dynamic_range,
            self.spectral_balance,
            self.energy,
            self.density,
        ]
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Self) -> f32 {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }

    /// True when every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}

/// Map an analyzer profile onto the characteristic space
pub fn map(profile: &ContentProfile) -> SpectrumPosition {
    use endpoints::*;

    let input_level = linear(profile.rms_db, RMS_DB);
    let dynamic_range = linear(profile.crest_db, CREST_DB);

    let spectral_balance = CENTROID_WEIGHT * logarithmic(profile.spectral_centroid_hz, CENTROID_HZ)
        + (1.0 - CENTROID_WEIGHT) * logarithmic(profile.spectral_rolloff_hz, ROLLOFF_HZ);

    let energy = ENERGY_LEVEL_WEIGHT * profile.energy_level.score()
        + (1.0 - ENERGY_LEVEL_WEIGHT) * linear(profile.peak_db, PEAK_DB);

    let density = ONSET_WEIGHT * linear(profile.onset_density, ONSETS_PER_S)
        + (1.0 - ONSET_WEIGHT) * unit(profile.dynamic_complexity);

    SpectrumPosition::new(input_level, dynamic_range, spectral_balance, energy, density)
}

/// Clamp into [0, 1]; non-finite becomes 0
#[inline]
fn unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[inline]
fn linear(value: f32, (lo, hi): (f32, f32)) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    unit((value - lo) / (hi - lo))
}

#[inline]
fn logarithmic(value_hz: f32, (lo, hi): (f32, f32)) -> f32 {
    if !value_hz.is_finite() || value_hz <= 0.0 {
        return 0.0;
    }
    linear(value_hz.log10(), (lo.log10(), hi.log10()))
}
