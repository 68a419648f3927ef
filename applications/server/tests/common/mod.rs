/// Common test utilities and fixtures
use axum::Router;
use contour_engine::EngineConfig;
use contour_server::{build_state, create_router, AppState, ServerConfig, TrackEntry};
use std::path::Path;
use tempfile::TempDir;

pub const SAMPLE_RATE: u32 = 8_000;

/// Write a 16-bit stereo WAV of a swelling two-tone signal
pub fn write_test_wav(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (SAMPLE_RATE as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let swell = 0.6 + 0.4 * (2.0 * std::f32::consts::PI * 0.2 * t).sin();
        let s = swell
            * (0.3 * (2.0 * std::f32::consts::PI * 110.0 * t).sin()
                + 0.1 * (2.0 * std::f32::consts::PI * 880.0 * t).sin());
        let sample = (s * 32_767.0) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// Test app over two tracks in a temp directory
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        write_test_wav(&temp_dir.path().join("one.wav"), 10.0);
        write_test_wav(&temp_dir.path().join("two.wav"), 3.0);

        let mut config = ServerConfig::default();
        config.engine = EngineConfig {
            target_chunk_s: 4.0,
            overlap_s: 1.0,
            min_chunk_s: 2.0,
            workers: 2,
            analysis_window_s: 10.0,
            ..EngineConfig::default()
        };
        config.library.music_dir = Some(temp_dir.path().to_path_buf());
        config.library.tracks.push(TrackEntry {
            id: "missing".to_string(),
            path: temp_dir.path().join("missing.wav"),
        });
        config.validate().unwrap();

        let state = build_state(&config).unwrap();
        Self {
            router: create_router(state.clone()),
            state,
            _temp_dir: temp_dir,
        }
    }
}
