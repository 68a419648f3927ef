//! Stereo width via Mid/Side processing
//!
//! - Mid = (L + R) / 2
//! - Side = (L - R) / 2
//!
//! Width scales the side component: 1.0 leaves the image alone, values below
//! 1.0 narrow it toward mono, values above widen it.

use contour_core::AudioBuffer;

/// Width range accepted by `widen`
pub const WIDTH_RANGE: (f32, f32) = (0.0, 2.0);

/// Stereo width stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StereoWidth;

impl StereoWidth {
    /// Apply `width` to a stereo buffer
    pub fn apply(&self, input: &AudioBuffer, width: f32) -> AudioBuffer {
        widen(input, width)
    }
}

/// Scale the side signal of a stereo buffer
///
/// Buffers that are not stereo, and a width of exactly 1.0, are returned as
/// copies of the input.
pub fn widen(input: &AudioBuffer, width: f32) -> AudioBuffer {
    if input.channels() != 2 || (width - 1.0).abs() < f32::EPSILON || !width.is_finite() {
        return input.clone();
    }
    let width = width.clamp(WIDTH_RANGE.0, WIDTH_RANGE.1);

    let mut samples = input.samples.clone();
    for frame in samples.chunks_exact_mut(2) {
        let mid = (frame[0] + frame[1]) * 0.5;
        let side = (frame[0] - frame[1]) * 0.5 * width;
        frame[0] = mid + side;
        frame[1] = mid - side;
    }

    input.with_samples(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::AudioFormat;

    fn buffer(samples: Vec<f32>) -> AudioBuffer {
        AudioBuffer::new(samples, AudioFormat::float_stereo(8_000))
    }

    #[test]
    fn unity_width_is_identity() {
        let input = buffer(vec![0.5, -0.3, 0.2, 0.1]);
        assert_eq!(widen(&input, 1.0), input);
    }

    #[test]
    fn zero_width_collapses_to_mono() {
        let out = widen(&buffer(vec![1.0, 0.0, 0.2, 0.6]), 0.0);
        assert!((out.samples[0] - 0.5).abs() < 1e-6);
        assert!((out.samples[1] - 0.5).abs() < 1e-6);
        assert!((out.samples[2] - 0.4).abs() < 1e-6);
        assert!((out.samples[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn wider_increases_side_energy() {
        let input = buffer(vec![0.6, 0.2, -0.4, 0.1]);
        let out = widen(&input, 1.5);
        let side = |b: &AudioBuffer| (b.samples[0] - b.samples[1]).abs();
        assert!(side(&out) > side(&input));
        // Mid is preserved
        assert!(((out.samples[0] + out.samples[1]) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn mono_buffers_pass_through() {
        let input = AudioBuffer::new(
            vec![0.1, 0.2, 0.3],
            AudioFormat::new(contour_core::SampleRate::new(8_000), 1, 32),
        );
        assert_eq!(widen(&input, 0.5), input);
    }
}
