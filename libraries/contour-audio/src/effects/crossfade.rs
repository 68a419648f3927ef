//! Crossfade curves for joining processed chunks

use contour_core::AudioBuffer;
use std::f32::consts::PI;

/// Fade curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeCurve {
    /// Linear fade: gains sum to one
    ///
    /// Correct for correlated material (two renderings of the same audio),
    /// which is what chunk seams are.
    #[default]
    Linear,

    /// Equal power fade: squared gains sum to one
    ///
    /// Uses `sin(t * pi / 2)`, which keeps perceived loudness constant for
    /// uncorrelated material. On correlated material the middle of the fade
    /// is about 3 dB louder.
    EqualPower,
}

impl FadeCurve {
    /// Gain at `position` (0.0 to 1.0) of the fade
    ///
    /// `fade_out` selects the outgoing side of the crossfade.
    #[inline]
    pub fn calculate_gain(&self, position: f32, fade_out: bool) -> f32 {
        let position = position.clamp(0.0, 1.0);
        let t = if fade_out { 1.0 - position } else { position };

        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * PI * 0.5).sin(),
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::EqualPower => "Equal Power",
        }
    }
}

/// Blend the tail of one chunk into the head of the next
///
/// Both buffers must cover the same stretch of source audio. The result has
/// the length of the shorter buffer; frame `i` is
/// `outgoing[i] * fade_out(i) + incoming[i] * fade_in(i)`.
pub fn crossfade(outgoing: &AudioBuffer, incoming: &AudioBuffer, curve: FadeCurve) -> AudioBuffer {
    let channels = incoming.channels();
    let frames = outgoing.frames().min(incoming.frames());
    if channels == 0 || frames == 0 || outgoing.channels() != channels {
        return incoming.slice_frames(0, frames);
    }

    let denom = frames as f32;
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        // Sample at frame centres so neither endpoint is exactly 0 or 1
        let position = (i as f32 + 0.5) / denom;
        let g_out = curve.calculate_gain(position, true);
        let g_in = curve.calculate_gain(position, false);
        for ch in 0..channels {
            let idx = i * channels + ch;
            samples.push(outgoing.samples[idx] * g_out + incoming.samples[idx] * g_in);
        }
    }

    incoming.with_samples(samples)
}
