//! Processing parameters consumed by the DSP chain
//!
//! A `ProcessingParameters` value is the complete, concrete configuration for
//! one segment. It is produced by the parameter interpolator and never edited
//! by the chain itself.

use serde::{Deserialize, Serialize};

/// Number of equalizer bands
pub const EQ_BAND_COUNT: usize = 24;

/// Critical band (Bark scale) centre frequencies in Hz
///
/// The 24 bands cover 20 Hz to roughly 15.5 kHz at their edges; the top band
/// also governs the air region up to 20 kHz.
pub const CRITICAL_BAND_FREQUENCIES: [f32; EQ_BAND_COUNT] = [
    50.0, 150.0, 250.0, 350.0, 450.0, 570.0, 700.0, 840.0, 1000.0, 1170.0, 1370.0, 1600.0,
    1850.0, 2150.0, 2500.0, 2900.0, 3400.0, 4000.0, 4800.0, 5800.0, 7000.0, 8500.0, 10500.0,
    13500.0,
];

/// Hard safe bounds for every parameter
///
/// Nothing downstream of the interpolator may see a value outside these ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    pub compression_ratio: (f32, f32),
    pub compression_amount: (f32, f32),
    pub dynamics_intensity: (f32, f32),
    pub eq_gain_db: (f32, f32),
    pub target_rms_db: (f32, f32),
    pub limiter_threshold_db: (f32, f32),
    pub stereo_width: (f32, f32),
    pub makeup_gain_db: (f32, f32),
    pub loudness_amount: (f32, f32),
}

impl ParameterBounds {
    /// The bounds enforced by the interpolator
    pub const SAFE: Self = Self {
        compression_ratio: (1.0, 4.0),
        compression_amount: (0.0, 1.0),
        dynamics_intensity: (0.0, 1.0),
        eq_gain_db: (-12.0, 12.0),
        target_rms_db: (-24.0, -8.0),
        limiter_threshold_db: (-6.0, -0.1),
        stereo_width: (0.5, 1.5),
        makeup_gain_db: (-6.0, 9.0),
        loudness_amount: (0.0, 1.0),
    };
}

/// Complete DSP configuration for one segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    /// Compressor ratio (1.0 = no compression)
    pub compression_ratio: f32,

    /// How hard the compressor works (0..1); drives the threshold
    pub compression_amount: f32,

    /// Scales the effective ratio (0 = ratio 1:1, 1 = full ratio)
    pub dynamics_intensity: f32,

    /// Per-critical-band gains in dB
    pub eq_band_gains: [f32; EQ_BAND_COUNT],

    /// Loudness normalization target (RMS, dBFS)
    pub target_rms_db: f32,

    /// Limiter ceiling (dBFS)
    pub limiter_threshold_db: f32,

    /// Stereo width (1.0 = unchanged)
    pub stereo_width: f32,

    /// Final trim applied after normalization (dB)
    pub makeup_gain_db: f32,

    /// Share of the normalization gain that is applied (0 = none, 1 = full)
    pub loudness_amount: f32,
}

impl ProcessingParameters {
    /// Transparent configuration: no EQ, no compression, unchanged width, no
    /// normalization, limiter at the highest allowed ceiling
    pub const fn neutral() -> Self {
        Self {
            compression_ratio: 1.0,
            compression_amount: 0.0,
            dynamics_intensity: 0.0,
            eq_band_gains: [0.0; EQ_BAND_COUNT],
            target_rms_db: -18.0,
            limiter_threshold_db: -0.1,
            stereo_width: 1.0,
            makeup_gain_db: 0.0,
            loudness_amount: 0.0,
        }
    }

    /// Blend from neutral (intensity 0) to these parameters (intensity 1)
    ///
    /// Intensity is clamped to [0, 1]; non-finite intensity is treated as 0.
    pub fn at_intensity(&self, intensity: f32) -> Self {
        let t = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let n = Self::neutral();

        let mut eq_band_gains = [0.0; EQ_BAND_COUNT];
        for (out, (&a, &b)) in eq_band_gains
            .iter_mut()
            .zip(n.eq_band_gains.iter().zip(self.eq_band_gains.iter()))
        {
            *out = lerp(a, b, t);
        }

        Self {
            compression_ratio: lerp(n.compression_ratio, self.compression_ratio, t),
            compression_amount: lerp(n.compression_amount, self.compression_amount, t),
            dynamics_intensity: lerp(n.dynamics_intensity, self.dynamics_intensity, t),
            eq_band_gains,
            target_rms_db: lerp(n.target_rms_db, self.target_rms_db, t),
            limiter_threshold_db: lerp(n.limiter_threshold_db, self.limiter_threshold_db, t),
            stereo_width: lerp(n.stereo_width, self.stereo_width, t),
            makeup_gain_db: lerp(n.makeup_gain_db, self.makeup_gain_db, t),
            loudness_amount: lerp(n.loudness_amount, self.loudness_amount, t),
        }
    }

    /// Clamp every field into `bounds`
    pub fn clamped(&self, bounds: &ParameterBounds) -> Self {
        let clamp = |v: f32, (lo, hi): (f32, f32)| v.clamp(lo, hi);
        let mut eq_band_gains = self.eq_band_gains;
        for gain in &mut eq_band_gains {
            *gain = clamp(*gain, bounds.eq_gain_db);
        }

        Self {
            compression_ratio: clamp(self.compression_ratio, bounds.compression_ratio),
            compression_amount: clamp(self.compression_amount, bounds.compression_amount),
            dynamics_intensity: clamp(self.dynamics_intensity, bounds.dynamics_intensity),
            eq_band_gains,
            target_rms_db: clamp(self.target_rms_db, bounds.target_rms_db),
            limiter_threshold_db: clamp(self.limiter_threshold_db, bounds.limiter_threshold_db),
            stereo_width: clamp(self.stereo_width, bounds.stereo_width),
            makeup_gain_db: clamp(self.makeup_gain_db, bounds.makeup_gain_db),
            loudness_amount: clamp(self.loudness_amount, bounds.loudness_amount),
        }
    }

    /// Check that every field is finite
    pub fn is_finite(&self) -> bool {
        self.compression_ratio.is_finite()
            && self.compression_amount.is_finite()
            && self.dynamics_intensity.is_finite()
            && self.eq_band_gains.iter().all(|g| g.is_finite())
            && self.target_rms_db.is_finite()
            && self.limiter_threshold_db.is_finite()
            && self.stereo_width.is_finite()
            && self.makeup_gain_db.is_finite()
            && self.loudness_amount.is_finite()
    }

    /// Check that every field lies within `bounds`
    pub fn within(&self, bounds: &ParameterBounds) -> bool {
        self.is_finite() && *self == self.clamped(bounds)
    }
}

impl Default for ProcessingParameters {
    fn default() -> Self {
        Self::neutral()
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
