//! Content analyzer
//!
//! Extracts the scalar descriptors the spectrum mapper needs from a decoded
//! track:
//! - level: RMS, sample peak, crest factor
//! - spectrum: centroid and 85% rolloff from an averaged, Hann-windowed FFT
//!   over frames spread evenly across the track
//! - activity: onset density from 10 ms energy jumps, dynamic complexity from
//!   the spread of 400 ms block levels
//! - EBU R128 integrated loudness and loudness range (optional)

use crate::error::{AnalysisError, Result};
use crate::profile::{ContentProfile, EnergyLevel};
use contour_core::{linear_to_db, AudioBuffer};
use ebur128::{EbuR128, Mode};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Analyzer settings
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// FFT length in samples
    pub fft_size: usize,

    /// Maximum number of FFT frames averaged per track
    pub spectral_frames: usize,

    /// Energy fraction that defines the rolloff frequency
    pub rolloff_fraction: f32,

    /// Rise over the recent average (dB) that counts as an onset
    pub onset_threshold_db: f32,

    /// Measure EBU R128 loudness
    pub measure_loudness: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            spectral_frames: 64,
            rolloff_fraction: 0.85,
            onset_threshold_db: 6.0,
            measure_loudness: true,
        }
    }
}

/// Energy below this is ignored for onsets and block statistics (dBFS)
const ACTIVITY_FLOOR_DB: f32 = -50.0;

/// Hop of the onset detector (seconds)
const ONSET_HOP_S: f32 = 0.01;

/// Number of previous hops averaged as the onset reference
const ONSET_HISTORY: usize = 8;

/// Minimum spacing between two onsets, in hops
const ONSET_REFRACTORY_HOPS: usize = 5;

/// Block length for dynamic complexity (seconds)
const BLOCK_S: f32 = 0.4;

/// Block level spread (dB) that maps to complexity 1.0
const FULL_COMPLEXITY_SPREAD_DB: f32 = 10.0;

/// Content analyzer
pub struct ContentAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl ContentAnalyzer {
    /// Create an analyzer with default settings
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    /// Create an analyzer with custom settings
    pub fn with_config(config: AnalyzerConfig) -> Self {
        let n = config.fft_size.max(16);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        let window = (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
            .collect();

        Self {
            config: AnalyzerConfig {
                fft_size: n,
                ..config
            },
            fft,
            window,
        }
    }

    /// Analyze a decoded track
    ///
    /// # Errors
    /// `NoSamples` for an empty buffer, `InvalidFormat` for zero channels or a
    /// zero sample rate. Loudness measurement failures are not errors; they
    /// leave the R128 fields as `None`.
    pub fn analyze(&self, buffer: &AudioBuffer) -> Result<ContentProfile> {
        if buffer.channels() == 0 {
            return Err(AnalysisError::InvalidFormat("zero channels".to_string()));
        }
        if buffer.sample_rate() == 0 {
            return Err(AnalysisError::InvalidFormat("zero sample rate".to_string()));
        }
        if buffer.frames() == 0 {
            return Err(AnalysisError::NoSamples);
        }

        let sample_rate = buffer.sample_rate() as f32;
        let mono = downmix(buffer);

        let rms_db = linear_to_db(buffer.rms());
        let peak_db = linear_to_db(buffer.peak());
        let crest_db = (peak_db - rms_db).max(0.0);

        let (spectral_centroid_hz, spectral_rolloff_hz) = self.spectral_shape(&mono, sample_rate);
        let onset_density = self.onset_density(&mono, sample_rate);
        let dynamic_complexity = dynamic_complexity(&mono, sample_rate);

        let (integrated_lufs, loudness_range_lu) = if self.config.measure_loudness {
            match measure_loudness(buffer) {
                Ok(values) => values,
                Err(e) => {
                    tracing::debug!(error = %e, "Loudness measurement unavailable");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        Ok(ContentProfile {
            rms_db,
            peak_db,
            crest_db,
            spectral_centroid_hz,
            spectral_rolloff_hz,
            energy_level: EnergyLevel::from_rms_db(rms_db),
            dynamic_complexity,
            onset_density,
            integrated_lufs,
            loudness_range_lu,
            analyzed_seconds: buffer.duration_secs(),
        })
    }

    /// Analyze, falling back to `ContentProfile::conservative()` on failure
    pub fn analyze_or_conservative(&self, buffer: &AudioBuffer) -> ContentProfile {
        match self.analyze(buffer) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "Content analysis failed, using conservative profile");
                ContentProfile::conservative()
            }
        }
    }

    /// Spectral centroid and rolloff (Hz) of the averaged power spectrum
    fn spectral_shape(&self, mono: &[f32], sample_rate: f32) -> (f32, f32) {
        let n = self.config.fft_size;
        let bins = n / 2 + 1;
        let mut power = vec![0.0_f64; bins];

        let span = mono.len().saturating_sub(n);
        let frames = self
            .config
            .spectral_frames
            .max(1)
            .min(span / (n / 2) + 1);
        let step = if frames > 1 { span / (frames - 1) } else { 0 };

        let mut scratch = vec![Complex::new(0.0_f32, 0.0); n];
        for f in 0..frames {
            let start = f * step;
            for (i, slot) in scratch.iter_mut().enumerate() {
                let s = mono.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(s * self.window[i], 0.0);
            }
            self.fft.process(&mut scratch);
            for (p, c) in power.iter_mut().zip(scratch.iter()) {
                *p += f64::from(c.norm_sqr());
            }
        }

        let bin_hz = f64::from(sample_rate) / n as f64;
        let total_power: f64 = power.iter().sum();
        if total_power <= f64::EPSILON {
            return (0.0, 0.0);
        }

        let mut weighted = 0.0;
        let mut magnitude_sum = 0.0;
        for (k, &p) in power.iter().enumerate() {
            let magnitude = p.sqrt();
            weighted += k as f64 * bin_hz * magnitude;
            magnitude_sum += magnitude;
        }
        let centroid = weighted / magnitude_sum;

        let target = total_power * f64::from(self.config.rolloff_fraction);
        let mut cumulative = 0.0;
        let mut rolloff_bin = bins - 1;
        for (k, &p) in power.iter().enumerate() {
            cumulative += p;
            if cumulative >= target {
                rolloff_bin = k;
                break;
            }
        }

        (centroid as f32, (rolloff_bin as f64 * bin_hz) as f32)
    }

    /// Onsets per second
    fn onset_density(&self, mono: &[f32], sample_rate: f32) -> f32 {
        let hop = ((sample_rate * ONSET_HOP_S) as usize).max(1);
        let levels = block_levels_db(mono, hop);
        let duration = mono.len() as f32 / sample_rate;
        if levels.len() <= ONSET_HISTORY || duration <= 0.0 {
            return 0.0;
        }

        let mut onsets = 0usize;
        let mut last_onset: Option<usize> = None;
        for k in ONSET_HISTORY..levels.len() {
            let reference = levels[k - ONSET_HISTORY..k].iter().sum::<f32>() / ONSET_HISTORY as f32;
            let rising = levels[k] - reference > self.config.onset_threshold_db;
            let audible = levels[k] > ACTIVITY_FLOOR_DB;
            let spaced = last_onset.map_or(true, |last| k - last >= ONSET_REFRACTORY_HOPS);
            if rising && audible && spaced {
                onsets += 1;
                last_onset = Some(k);
            }
        }

        onsets as f32 / duration
    }
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Average channels into one finite mono signal
fn downmix(buffer: &AudioBuffer) -> Vec<f32> {
    let channels = buffer.channels();
    let scale = 1.0 / channels as f32;
    buffer
        .samples
        .chunks_exact(channels)
        .map(|frame| {
            frame
                .iter()
                .map(|s| if s.is_finite() { *s } else { 0.0 })
                .sum::<f32>()
                * scale
        })
        .collect()
}

/// Mean-square level of consecutive blocks (dB)
fn block_levels_db(mono: &[f32], block: usize) -> Vec<f32> {
    mono.chunks(block)
        .map(|chunk| {
            let energy = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
            10.0 * (energy + 1e-12).log10()
        })
        .collect()
}

/// Standard deviation of audible 400 ms block levels, scaled to 0..1
fn dynamic_complexity(mono: &[f32], sample_rate: f32) -> f32 {
    let block = ((sample_rate * BLOCK_S) as usize).max(1);
    let levels: Vec<f32> = block_levels_db(mono, block)
        .into_iter()
        .filter(|db| *db > ACTIVITY_FLOOR_DB)
        .collect();
    if levels.len() < 2 {
        return 0.0;
    }

    let mean = levels.iter().sum::<f32>() / levels.len() as f32;
    let variance = levels.iter().map(|db| (db - mean).powi(2)).sum::<f32>() / levels.len() as f32;
    (variance.sqrt() / FULL_COMPLEXITY_SPREAD_DB).clamp(0.0, 1.0)
}

/// EBU R128 integrated loudness and loudness range
fn measure_loudness(buffer: &AudioBuffer) -> Result<(Option<f64>, Option<f64>)> {
    let mut meter = EbuR128::new(
        u32::from(buffer.format.channels),
        buffer.sample_rate(),
        Mode::I | Mode::LRA,
    )?;
    meter.add_frames_f32(&buffer.samples)?;

    // Silence measures as -inf
    let integrated = meter.loudness_global()?;
    let integrated = integrated.is_finite().then_some(integrated);
    let range = meter.loudness_range().ok().filter(|lra| lra.is_finite());

    Ok((integrated, range))
}
