//! Decode real WAV files and run them through the mastering chain

use contour_audio::effects::MasteringChain;
use contour_audio::SymphoniaDecoder;
use contour_core::{db_to_linear, AudioLoader, ProcessingParameters, EQ_BAND_COUNT};
use std::f32::consts::PI;
use std::path::Path;

fn write_sine_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32, amplitude: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f32 * seconds) as usize;
    for i in 0..frames {
        let s = amplitude * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin();
        for _ in 0..channels {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn mono_wav_decodes_to_stereo() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    write_sine_wav(&path, 8_000, 1, 1.0, 0.5);

    let buffer = SymphoniaDecoder::new().load(&path).unwrap();
    assert_eq!(buffer.channels(), 2);
    assert_eq!(buffer.sample_rate(), 8_000);
    assert_eq!(buffer.frames(), 8_000);
    assert!((buffer.peak() - 0.5).abs() < 0.01);
    assert_eq!(buffer.samples[200], buffer.samples[201]);
}

#[test]
fn probe_duration_matches_file_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    write_sine_wav(&path, 16_000, 2, 2.5, 0.3);

    let duration = SymphoniaDecoder::new().probe_duration(&path).unwrap();
    assert!((duration - 2.5).abs() < 0.01);
}

#[test]
fn decoded_audio_masters_within_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loud.wav");
    write_sine_wav(&path, 8_000, 2, 1.0, 0.99);

    let buffer = SymphoniaDecoder::new().load(&path).unwrap();
    let params = ProcessingParameters {
        compression_ratio: 3.0,
        compression_amount: 0.6,
        dynamics_intensity: 0.8,
        eq_band_gains: [2.0; EQ_BAND_COUNT],
        target_rms_db: -9.0,
        limiter_threshold_db: -1.0,
        stereo_width: 1.2,
        makeup_gain_db: 4.0,
        loudness_amount: 1.0,
    };

    let out = MasteringChain::standard().process(&buffer, &params, None, None);
    assert_eq!(out.buffer.frames(), buffer.frames());
    assert!(out.buffer.peak() <= db_to_linear(-1.0) + 1e-6);
}
