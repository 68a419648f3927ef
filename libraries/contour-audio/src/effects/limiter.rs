//! Lookahead peak limiter
//!
//! Works on a whole chunk at once, so "lookahead" is exact rather than a
//! delay line: the gain curve is computed from the chunk's frame peaks before
//! any sample is scaled.
//!
//! 1. Required gain per frame: `min(1, ceiling / frame_peak)`
//! 2. Backward pass: gain may fall at most `1 / lookahead` per frame, so it
//!    ramps down ahead of each peak
//! 3. Forward pass: exponential release back toward unity, never above the
//!    required gain
//! 4. Hard clamp at the ceiling for float rounding
//!
//! No output sample exceeds the ceiling.

use contour_core::{db_to_linear, AudioBuffer};

/// Default lookahead (ms)
pub const DEFAULT_LOOKAHEAD_MS: f32 = 5.0;

/// Default release (ms)
pub const DEFAULT_RELEASE_MS: f32 = 80.0;

/// Lookahead peak limiter
#[derive(Debug, Clone, Copy)]
pub struct LookaheadLimiter {
    lookahead_ms: f32,
    release_ms: f32,
}

impl LookaheadLimiter {
    /// Create a limiter with 5 ms lookahead and 80 ms release
    pub fn new() -> Self {
        Self {
            lookahead_ms: DEFAULT_LOOKAHEAD_MS,
            release_ms: DEFAULT_RELEASE_MS,
        }
    }

    /// Create a limiter with custom timing
    pub fn with_timing(lookahead_ms: f32, release_ms: f32) -> Self {
        Self {
            lookahead_ms: lookahead_ms.max(0.0),
            release_ms: release_ms.max(1.0),
        }
    }

    /// Limit `input` so that no sample exceeds `ceiling_db`
    pub fn apply(&self, input: &AudioBuffer, ceiling_db: f32) -> AudioBuffer {
        let channels = input.channels();
        let frames = input.frames();
        if channels == 0 || frames == 0 {
            return input.clone();
        }

        let ceiling = db_to_linear(ceiling_db.min(0.0));
        if input.peak() <= ceiling {
            return input.clone();
        }

        let sr = input.sample_rate().max(1) as f32;
        let lookahead = (self.lookahead_ms * sr / 1000.0).ceil().max(1.0);
        let attack_step = 1.0 / lookahead;
        let release_coeff = 1.0 - (-1.0 / (self.release_ms * sr / 1000.0)).exp();

        let required: Vec<f32> = input
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let peak = frame.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
                if peak > ceiling {
                    ceiling / peak
                } else {
                    1.0
                }
            })
            .collect();

        let mut gain = required.clone();
        for i in (0..frames - 1).rev() {
            gain[i] = gain[i].min(gain[i + 1] + attack_step);
        }

        for i in 1..frames {
            let released = gain[i - 1] + (1.0 - gain[i - 1]) * release_coeff;
            gain[i] = gain[i].min(released);
        }

        let mut samples = input.samples.clone();
        for (frame, &g) in samples.chunks_exact_mut(channels).zip(gain.iter()) {
            for sample in frame.iter_mut() {
                *sample = (*sample * g).clamp(-ceiling, ceiling);
            }
        }

        input.with_samples(samples)
    }
}

impl Default for LookaheadLimiter {
    fn default() -> Self {
        Self::new()
    }
}
