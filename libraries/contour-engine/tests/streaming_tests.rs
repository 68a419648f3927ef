//! Integration tests for mastered streaming
//!
//! Covers:
//! - first play of a long track (planning, cache misses)
//! - replay served from the cache
//! - preset switches dropping only the current track's chunks
//! - a replaced source file being reprocessed under its new signature
//! - crossfade continuity at chunk seams
//! - byte ranges and pass-through when enhancement is off


use contour_audio::SymphoniaDecoder;
use contour_core::{PresetName, TrackId, TrackLibrary};
use contour_engine::{
    encode_pcm16, ByteRange, CacheKey, EngineConfig, EngineError, FsTrackLibrary, MasteringEngine,
    StreamState, WavLayout,
};
use std::path::Path;
use std::sync::Arc;
use test_helpers::*;

#[tokio::test]
async fn test_first_play_plans_and_processes_every_chunk() {
    let library = MemoryLibrary::new();
    library.add("t1", music(180.0, 1), 0);
    let engine = engine(&library, EngineConfig::default());
    let signature = library.info("t1").signature();

    let first_key = CacheKey::new(TrackId::new("t1"), signature.clone(), PresetName::new("adaptive"), 1.0, 0);
    assert!(!engine.cache().contains(&first_key));

    let stream = engine.get_stream(&TrackId::new("t1"), None, None, None).await.unwrap();
    assert!(stream.enhanced);
    assert!(stream.range.is_none());
    assert_eq!(stream.layout.total_frames, 180 * u64::from(SAMPLE_RATE));
    let state = stream.state_watch();

    let wav = stream.collect().await.unwrap();
    assert_eq!(wav.len() as u64, WavLayout::new(SAMPLE_RATE, 2, 180 * u64::from(SAMPLE_RATE)).total_len());
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(*state.borrow(), StreamState::Complete);

    let stats = engine.cache_stats();
    assert_eq!(stats.entries, 6);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 6);
    assert!(engine.cache().contains(&first_key));
    assert!(engine.cache().keys().iter().all(|k| k.signature == signature));

    // the file was not touched, so the signature is stable
    let again = library.track(&TrackId::new("t1")).await.unwrap().unwrap();
    assert_eq!(again.signature(), signature);
    assert_eq!(library.loads(), 1);
}

#[tokio::test]
async fn test_replay_is_served_from_cache() {
    let library = MemoryLibrary::new();
    library.add("t1", music(180.0, 1), 0);
    let engine = engine(&library, EngineConfig::default());
    let id = TrackId::new("t1");

    let first = engine.get_stream(&id, None, None, None).await.unwrap().collect().await.unwrap();
    let misses = engine.cache_stats().misses;

    let second = engine.get_stream(&id, None, None, None).await.unwrap();
    assert_eq!(second.state(), StreamState::FirstChunkReady);
    let second = second.collect().await.unwrap();

    let stats = engine.cache_stats();
    assert_eq!(stats.hits, 6);
    assert_eq!(stats.misses, misses);
    assert_eq!(first, second);
    assert_eq!(library.loads(), 1);
}

#[tokio::test]
async fn test_preset_switch_invalidates_only_current_track() {
    let library = MemoryLibrary::new();
    library.add("t1", music(60.0, 1), 0);
    library.add("t2", music(60.0, 2), 0);
    let engine = engine(&library, EngineConfig::default());

    // no current track yet, nothing to drop
    assert_eq!(engine.set_preset("warm").unwrap(), 0);

    engine.get_stream(&TrackId::new("t2"), None, None, None).await.unwrap().collect().await.unwrap();
    engine.get_stream(&TrackId::new("t1"), None, None, None).await.unwrap().collect().await.unwrap();
    assert_eq!(engine.cache_stats().entries, 4);
    assert_eq!(engine.controls().current_track, Some(TrackId::new("t1")));

    assert_eq!(engine.set_preset("punchy").unwrap(), 2);
    let keys = engine.cache().keys();
    assert_eq!(keys.len(), 2);
    assert!(keys
        .iter()
        .all(|k| k.track_id == TrackId::new("t2") && k.preset.as_str() == "warm"));

    // t1 under the new preset is processed from scratch
    let misses = engine.cache_stats().misses;
    engine.get_stream(&TrackId::new("t1"), None, None, None).await.unwrap().collect().await.unwrap();
    assert_eq!(engine.cache_stats().misses, misses + 2);
    assert!(engine.cache().keys().iter().any(|k| k.preset.as_str() == "punchy"));
}

#[tokio::test]
async fn test_intensity_change_invalidates_current_track() {
    let library = MemoryLibrary::new();
    library.add("t1", music(12.0, 1), 0);
    let engine = engine(&library, short_chunks());

    engine.get_stream(&TrackId::new("t1"), None, None, None).await.unwrap().collect().await.unwrap();
    let entries = engine.cache_stats().entries;
    assert_eq!(entries, 3);

    assert_eq!(engine.set_intensity(0.5).unwrap(), entries);
    assert!(engine.cache().is_empty());
    assert!(matches!(engine.set_intensity(2.0), Err(EngineError::InvalidIntensity(_))));
}

fn write_music_wav(path: &Path, seconds: f64, seed: u32) {
    let audio = music(seconds, seed);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for s in &audio.samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * 32_767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[tokio::test]
async fn test_modified_file_is_reprocessed_under_new_signature() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.wav");
    write_music_wav(&path, 10.0, 1);

    let library = Arc::new(FsTrackLibrary::new());
    let id = TrackId::new("song");
    library.add(id.clone(), &path);
    let engine = MasteringEngine::new(short_chunks(), library.clone(), Arc::new(SymphoniaDecoder::new())).unwrap();

    let before = library.track(&id).await.unwrap().unwrap().signature();
    engine.get_stream(&id, None, None, None).await.unwrap().collect().await.unwrap();
    assert_eq!(engine.cache_stats().entries, 3);
    let misses = engine.cache_stats().misses;

    write_music_wav(&path, 12.0, 7);
    let after = library.track(&id).await.unwrap().unwrap().signature();
    assert_ne!(before, after);

    let stream = engine.get_stream(&id, None, None, None).await.unwrap();
    assert_eq!(stream.layout.total_frames, 12 * u64::from(SAMPLE_RATE));
    stream.collect().await.unwrap();

    let keys = engine.cache().keys();
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|k| k.signature == after));
    assert_eq!(engine.cache_stats().misses, misses + 3);
    assert_eq!(engine.cache_stats().hits, 0);
}

#[tokio::test]
async fn test_removed_track_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.wav");
    write_music_wav(&path, 3.0, 1);

    let library = Arc::new(FsTrackLibrary::new());
    library.add(TrackId::new("gone"), &path);
    let engine = MasteringEngine::new(short_chunks(), library, Arc::new(SymphoniaDecoder::new())).unwrap();

    std::fs::remove_file(&path).unwrap();
    let err = engine.get_stream(&TrackId::new("gone"), None, None, None).await.err().unwrap();
    assert!(matches!(err, EngineError::TrackNotFound(_)));
}

fn window_levels_db(samples: &[i16], frames_per_window: usize) -> Vec<f32> {
    samples
        .chunks_exact(frames_per_window * 2)
        .map(|w| {
            let sum: f64 = w.iter().map(|&s| (f64::from(s) / 32_768.0).powi(2)).sum();
            let rms = (sum / w.len() as f64).sqrt();
            (20.0 * rms.max(1e-9).log10()) as f32
        })
        .collect()
}

/// Level (dBFS) of a 20 ms window centred at `centre_s`
fn level_at(samples: &[i16], centre_s: f64) -> f32 {
    let half = SAMPLE_RATE as usize / 100;
    let centre = (centre_s * f64::from(SAMPLE_RATE)) as usize;
    let window = &samples[(centre - half) * 2..(centre + half) * 2];
    let sum: f64 = window.iter().map(|&s| (f64::from(s) / 32_768.0).powi(2)).sum();
    (20.0 * (sum / window.len() as f64).sqrt().max(1e-9).log10()) as f32
}

async fn render(library: &Arc<MemoryLibrary>, id: &str, preset: &str) -> Vec<i16> {
    let wav = engine(library, short_chunks())
        .get_stream(&TrackId::new(id), Some(preset), Some(1.0), None)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    pcm_samples(&wav)
}

#[tokio::test]
async fn test_chunk_seams_have_no_level_jumps() {
    // chunks start at 0, 4 and 8 s; the overlaps are 4-5 s and 8-9 s
    let library = MemoryLibrary::new();
    library.add("tone", steady_tone(12.0, 220.0, 0.9), 0);
    let samples = render(&library, "tone", "adaptive").await;

    for (before, seam, after) in [(3.5, 4.5, 6.5), (7.5, 8.5, 10.5)] {
        let before = level_at(&samples, before);
        let centre = level_at(&samples, seam);
        let after = level_at(&samples, after);
        assert!(
            (centre - before).abs() < 1.0 && (centre - after).abs() < 1.0,
            "seam at {} s: before {:.2} dB, centre {:.2} dB, after {:.2} dB",
            seam,
            before,
            centre,
            after
        );
    }

    // and no step between neighbouring windows anywhere
    let levels = window_levels_db(&samples, 160);
    assert_eq!(levels.len(), 600);
    for (i, pair) in levels.windows(2).enumerate().skip(10) {
        let jump = (pair[1] - pair[0]).abs();
        assert!(jump < 1.0, "level jump of {:.2} dB at window {}", jump, i);
    }
}

#[tokio::test]
async fn test_transient_does_not_duck_its_chunk() {
    let library = MemoryLibrary::new();
    let mut audio = steady_tone(12.0, 220.0, 0.05);
    let click = 6 * SAMPLE_RATE as usize * 2;
    audio.samples[click] = 0.95;
    audio.samples[click + 1] = 0.95;
    library.add("clicky", audio, 0);
    let samples = render(&library, "clicky", "gentle").await;

    let levels: Vec<f32> = [3.5, 5.5, 7.5, 10.0]
        .iter()
        .map(|&t| level_at(&samples, t))
        .collect();
    for level in &levels {
        assert!(
            (level - levels[0]).abs() < 1.0,
            "chunk levels differ: {:?}",
            levels
        );
    }
}

#[tokio::test]
async fn test_range_request_matches_full_stream() {
    let library = MemoryLibrary::new();
    library.add("t1", music(12.0, 3), 0);

    let full = engine(&library, short_chunks())
        .get_stream(&TrackId::new("t1"), None, None, None)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    // a fresh engine, so the range is produced without the full pass cached
    let engine = engine(&library, short_chunks());
    let stream = engine
        .get_stream(&TrackId::new("t1"), None, None, ByteRange::parse("bytes=200000-209999"))
        .await
        .unwrap();
    assert_eq!(stream.range, Some((200_000, 209_999)));
    assert_eq!(stream.content_length(), 10_000);
    assert_eq!(stream.total_len(), full.len() as u64);
    let part = stream.collect().await.unwrap();
    assert_eq!(part, full[200_000..=209_999].to_vec());

    let head = engine
        .get_stream(&TrackId::new("t1"), None, None, ByteRange::parse("bytes=0-99"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(head, full[..100].to_vec());

    let err = engine
        .get_stream(&TrackId::new("t1"), None, None, ByteRange::parse("bytes=900000-"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::RangeNotSatisfiable(_)));
}

#[tokio::test]
async fn test_disabled_engine_streams_source_unchanged() {
    let library = MemoryLibrary::new();
    let source = music(12.0, 4);
    library.add("t1", source.clone(), 0);
    let engine = engine(&library, short_chunks());

    assert_eq!(engine.set_enabled(false), 0);
    let stream = engine.get_stream(&TrackId::new("t1"), None, None, None).await.unwrap();
    assert!(!stream.enhanced);
    assert!(stream.parameters.is_none());
    let wav = stream.collect().await.unwrap();

    assert_eq!(&wav[44..], &encode_pcm16(&source)[..]);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_share_work() {
    let library = MemoryLibrary::new();
    library.add("t1", music(12.0, 5), 0);
    let engine = engine(&library, short_chunks());
    let id = TrackId::new("t1");

    let (a, b) = tokio::join!(
        async { engine.get_stream(&id, None, None, None).await.unwrap().collect().await.unwrap() },
        async { engine.get_stream(&id, None, None, None).await.unwrap().collect().await.unwrap() },
    );
    assert_eq!(a, b);
    assert_eq!(library.loads(), 1);
    assert_eq!(engine.cache_stats().entries, 3);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let library = MemoryLibrary::new();
    library.add("t1", music(3.0, 1), 0);
    let engine = engine(&library, short_chunks());
    let id = TrackId::new("t1");

    let err = engine.get_stream(&TrackId::new("missing"), None, None, None).await.err().unwrap();
    assert!(matches!(err, EngineError::TrackNotFound(_)));

    let err = engine.get_stream(&id, Some("loudest"), None, None).await.err().unwrap();
    assert!(matches!(err, EngineError::UnknownPreset(_)));

    let err = engine.get_stream(&id, None, Some(-0.1), None).await.err().unwrap();
    assert!(matches!(err, EngineError::InvalidIntensity(_)));
}

#[tokio::test]
async fn test_disk_cache_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let library = MemoryLibrary::new();
    library.add("t1", music(12.0, 6), 0);
    let config = EngineConfig {
        disk_cache_dir: Some(dir.path().to_path_buf()),
        ..short_chunks()
    };

    let first = engine(&library, config.clone())
        .get_stream(&TrackId::new("t1"), None, None, None)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let restarted = engine(&library, config.clone());
    let second = restarted
        .get_stream(&TrackId::new("t1"), None, None, None)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(restarted.cache_stats().hits, 3);

    let purged = engine(&library, config);
    assert!(purged.invalidate_on_startup().await.unwrap() >= 3);
    assert!(purged.cache().is_empty());
}

#[tokio::test]
async fn test_analysis_reports_weights_and_parameters() {
    let library = MemoryLibrary::new();
    library.add("t1", music(12.0, 1), 0);
    let engine = engine(&library, short_chunks());

    let analysis = engine.analyze(&TrackId::new("t1"), Some("warm"), Some(0.5)).await.unwrap();
    assert_eq!(analysis.preset.as_str(), "warm");
    assert_eq!(analysis.weights.len(), 6);
    let total: f64 = analysis.weights.iter().map(|(_, w)| w).sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(analysis.parameters.is_finite());
}
