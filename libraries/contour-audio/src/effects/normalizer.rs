//! Loudness normalization toward a target RMS
//!
//! When the track-level RMS of the source is known, every chunk of a track
//! receives (nearly) the same normalization gain: the chunk's own level change
//! through the chain is added to the track level, instead of measuring each
//! chunk in isolation. Quiet passages therefore stay quiet relative to loud
//! ones. Without a track level the chunk's own RMS is used.
//!
//! The normalization gain is scaled by `loudness_amount`, the makeup trim is
//! added on top and the total is bounded to +/-12 dB. The gain ignores the
//! chunk's peaks; the limiter that follows in the chain keeps the result
//! under the ceiling.

use contour_core::{db_to_linear, linear_to_db, AudioBuffer, ProcessingParameters};

/// Largest normalization gain in either direction (dB)
pub const MAX_NORMALIZATION_GAIN_DB: f32 = 12.0;

/// Buffers quieter than this are treated as silence and left alone (dBFS)
const SILENCE_DB: f32 = -90.0;

/// Gain (dB) the normalizer applies to `input`
///
/// - `source_rms_db`: RMS of the unprocessed chunk
/// - `track_rms_db`: RMS of the whole unprocessed track
pub fn normalization_gain_db(
    input: &AudioBuffer,
    params: &ProcessingParameters,
    source_rms_db: Option<f32>,
    track_rms_db: Option<f32>,
) -> f32 {
    let processed_rms_db = linear_to_db(input.rms());
    if processed_rms_db <= SILENCE_DB {
        return 0.0;
    }

    let effective_level_db = match (track_rms_db, source_rms_db) {
        (Some(track), Some(source)) if track.is_finite() && source > SILENCE_DB => {
            track + (processed_rms_db - source)
        }
        _ => processed_rms_db,
    };

    let normalization = (params.target_rms_db - effective_level_db)
        * params.loudness_amount.clamp(0.0, 1.0);
    (normalization + params.makeup_gain_db)
        .clamp(-MAX_NORMALIZATION_GAIN_DB, MAX_NORMALIZATION_GAIN_DB)
}

/// Loudness normalization stage
#[derive(Debug, Clone, Copy, Default)]
pub struct LoudnessNormalizer;

impl LoudnessNormalizer {
    /// Apply normalization and return the new buffer and the gain used (dB)
    pub fn apply(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        source_rms_db: Option<f32>,
        track_rms_db: Option<f32>,
    ) -> (AudioBuffer, f32) {
        let gain_db = normalization_gain_db(input, params, source_rms_db, track_rms_db);
        if gain_db.abs() < 1e-4 {
            return (input.clone(), 0.0);
        }

        let gain = db_to_linear(gain_db);
        let samples = input.samples.iter().map(|s| s * gain).collect();

        (input.with_samples(samples), gain_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::AudioFormat;

    fn constant(level: f32, frames: usize) -> AudioBuffer {
        AudioBuffer::new(vec![level; frames * 2], AudioFormat::float_stereo(8_000))
    }

    fn params(target: f32) -> ProcessingParameters {
        ProcessingParameters {
            target_rms_db: target,
            limiter_threshold_db: -0.1,
            loudness_amount: 1.0,
            ..ProcessingParameters::neutral()
        }
    }

    #[test]
    fn moves_chunk_toward_target() {
        // -26 dB RMS, peak equals RMS, so plenty of headroom
        let input = constant(0.05, 100);
        let gain = normalization_gain_db(&input, &params(-18.0), None, None);
        assert!((gain - (-18.0 - linear_to_db(0.05))).abs() < 1e-3);
    }

    #[test]
    fn gain_is_bounded() {
        let input = constant(0.001, 100); // -60 dB
        let gain = normalization_gain_db(&input, &params(-8.0), None, None);
        assert!(gain <= MAX_NORMALIZATION_GAIN_DB + 1e-6);
    }

    #[test]
    fn transient_does_not_change_gain() {
        let p = params(-18.0);
        let track = -26.0;
        let plain = constant(0.05, 8_000);
        let mut clicked = plain.clone();
        clicked.samples[4_000] = 0.95;

        let g_plain = normalization_gain_db(&plain, &p, Some(linear_to_db(plain.rms())), Some(track));
        let g_clicked =
            normalization_gain_db(&clicked, &p, Some(linear_to_db(clicked.rms())), Some(track));
        assert!((g_plain - 8.0).abs() < 1e-3);
        assert!((g_plain - g_clicked).abs() < 1e-3);
    }

    #[test]
    fn track_level_keeps_relative_dynamics() {
        let p = params(-18.0);
        let quiet = constant(0.02, 100);
        let loud = constant(0.1, 100);

        // Both chunks pass through unchanged, so each receives the track gain
        let track = -22.0;
        let g_quiet = normalization_gain_db(&quiet, &p, Some(linear_to_db(0.02)), Some(track));
        let g_loud = normalization_gain_db(&loud, &p, Some(linear_to_db(0.1)), Some(track));
        assert!((g_quiet - g_loud).abs() < 1e-4);
        assert!((g_quiet - 4.0).abs() < 1e-4);
    }

    #[test]
    fn neutral_parameters_do_not_normalize() {
        let input = constant(0.05, 100);
        let gain = normalization_gain_db(&input, &ProcessingParameters::neutral(), None, None);
        assert_eq!(gain, 0.0);
    }

    #[test]
    fn silence_is_left_alone() {
        let input = constant(0.0, 100);
        let (out, gain) = LoudnessNormalizer.apply(&input, &params(-8.0), None, None);
        assert_eq!(gain, 0.0);
        assert_eq!(out, input);
    }
}
