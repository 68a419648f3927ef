//! 24-band critical-band equalizer
//!
//! One peaking biquad per Bark band, cascaded. Band bandwidths follow the
//! Zwicker critical bandwidth approximation, so low bands are wide in
//! relative terms and mid bands are narrower.

use contour_core::{AudioBuffer, CRITICAL_BAND_FREQUENCIES, EQ_BAND_COUNT};
use std::f32::consts::PI;

/// Gains smaller than this are treated as flat and skipped
const FLAT_GAIN_DB: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    /// RBJ peaking filter
    fn peaking(frequency: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        // Near-Nyquist centre frequencies make the filter unstable
        let freq = frequency.min(sample_rate * 0.45);
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_omega) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_omega) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }
}

/// Direct form I state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct FilterState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl FilterState {
    #[inline]
    fn process(&mut self, c: &Coefficients, x: f32) -> f32 {
        let mut y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        // Flush denormals
        if y.abs() < 1e-15 {
            y = 0.0;
        }
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Critical-band equalizer
#[derive(Debug, Clone)]
pub struct CriticalBandEq {
    q: [f32; EQ_BAND_COUNT],
}

impl CriticalBandEq {
    /// Create the equalizer with Q values derived from critical bandwidths
    pub fn new() -> Self {
        let mut q = [1.0; EQ_BAND_COUNT];
        for (q, &f) in q.iter_mut().zip(CRITICAL_BAND_FREQUENCIES.iter()) {
            *q = (f / critical_bandwidth(f)).clamp(0.4, 6.0);
        }
        Self { q }
    }

    /// Q of each band
    pub fn q_factors(&self) -> &[f32; EQ_BAND_COUNT] {
        &self.q
    }

    /// Apply `gains_db` (one per band) and return a new buffer
    ///
    /// Filter state starts at rest for every call. Gains are clamped to
    /// +/-12 dB. Length and channel count are preserved.
    pub fn apply(&self, input: &AudioBuffer, gains_db: &[f32; EQ_BAND_COUNT]) -> AudioBuffer {
        let channels = input.channels();
        let sample_rate = input.sample_rate() as f32;
        if channels == 0 || sample_rate < 1.0 || input.is_empty() {
            return input.clone();
        }

        let bands: Vec<Coefficients> = CRITICAL_BAND_FREQUENCIES
            .iter()
            .zip(gains_db.iter())
            .zip(self.q.iter())
            .filter(|((_, gain), _)| gain.is_finite() && gain.abs() >= FLAT_GAIN_DB)
            .map(|((&freq, &gain), &q)| {
                Coefficients::peaking(freq, gain.clamp(-12.0, 12.0), q, sample_rate)
            })
            .collect();

        if bands.is_empty() {
            return input.clone();
        }

        let mut states = vec![FilterState::default(); bands.len() * channels];
        let mut samples = input.samples.clone();

        for frame in samples.chunks_exact_mut(channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let mut y = *sample;
                for (b, coeffs) in bands.iter().enumerate() {
                    y = states[b * channels + ch].process(coeffs, y);
                }
                *sample = y;
            }
        }

        input.with_samples(samples)
    }
}

impl Default for CriticalBandEq {
    fn default() -> Self {
        Self::new()
    }
}

/// Zwicker critical bandwidth in Hz at centre frequency `f`
fn critical_bandwidth(f: f32) -> f32 {
    let khz = f / 1000.0;
    25.0 + 75.0 * (1.0 + 1.4 * khz * khz).powf(0.69)
}
