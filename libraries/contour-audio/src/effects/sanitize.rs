/// Non-finite sample guard
use contour_core::AudioBuffer;

/// Replace every frame containing a NaN or infinity with silence
///
/// Returns the cleaned buffer and the number of frames that were silenced.
/// A warning is logged naming the stage that would have received the bad
/// samples.
pub fn sanitize(buffer: AudioBuffer, stage: &str) -> (AudioBuffer, usize) {
    if buffer.samples.iter().all(|s| s.is_finite()) {
        return (buffer, 0);
    }

    let channels = buffer.channels().max(1);
    let mut samples = buffer.samples;
    let mut silenced = 0usize;

    for frame in samples.chunks_mut(channels) {
        if frame.iter().any(|s| !s.is_finite()) {
            frame.fill(0.0);
            silenced += 1;
        }
    }

    tracing::warn!(stage, silenced, "Non-finite samples replaced with silence");

    (
        AudioBuffer::new(samples, buffer.format),
        silenced,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::AudioFormat;

    #[test]
    fn clean_buffer_passes_through() {
        let buffer = AudioBuffer::new(vec![0.1, -0.2, 0.3, 0.4], AudioFormat::float_stereo(8_000));
        let (out, silenced) = sanitize(buffer.clone(), "test");
        assert_eq!(out, buffer);
        assert_eq!(silenced, 0);
    }

    #[test]
    fn bad_frames_become_silence() {
        let buffer = AudioBuffer::new(
            vec![0.1, f32::NAN, 0.3, 0.4, f32::INFINITY, 0.5],
            AudioFormat::float_stereo(8_000),
        );
        let (out, silenced) = sanitize(buffer, "test");
        assert_eq!(silenced, 2);
        assert_eq!(out.samples, vec![0.0, 0.0, 0.3, 0.4, 0.0, 0.0]);
    }
}
