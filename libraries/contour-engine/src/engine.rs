//! Mastering engine
//!
//! Ties the pieces together for one request:
//!
//! ```text
//! TrackLibrary ──► file signature ──► decode + analyze (once per signature)
//!                                          │
//!              preset, intensity ──► interpolate ──► TrackJob
//!                                          │
//!     first segment's chunks (awaited) ────┤
//!     remaining chunks (worker pool) ──────┴──► ordered stitch ──► WAV bytes
//! ```

use crate::cache::{quantize_intensity, CacheKey, CacheStats, ChunkCache, Invalidation};
use crate::config::EngineConfig;
use crate::controls::{validate_intensity, validate_preset, ControlState};
use crate::error::{EngineError, Result};
use crate::inflight::{Claim, InFlightRegistry};
use crate::planner::{ChunkPlan, ChunkPlanner};
use crate::processor::{ChunkProcessor, TrackJob};
use crate::stream::{Assembly, ByteRange, MasteredStream, SegmentSource, StreamState};
use crate::wav::WavLayout;
use contour_analysis::{
    anchor_table, interpolate_detailed, map, ContentAnalyzer, ContentProfile, SpectrumPosition,
};
use contour_audio::effects::{FadeCurve, MasteringChain};
use contour_core::{
    linear_to_db, AudioBuffer, AudioLoader, FileSignature, PresetName, ProcessingParameters,
    TrackId, TrackInfo, TrackLibrary,
};
use lru::LruCache;
use serde::Serialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{mpsc, watch};

/// Analysis of one track under one setting
#[derive(Debug, Clone, Serialize)]
pub struct TrackAnalysis {
    pub profile: ContentProfile,
    pub position: SpectrumPosition,
    pub preset: PresetName,
    pub intensity: f32,
    /// Anchor weights, in table order
    pub weights: Vec<(String, f64)>,
    pub applied_rules: Vec<String>,
    /// Parameters after the intensity blend
    pub parameters: ProcessingParameters,
}

/// Analyze a decoded track and derive its parameters
///
/// `analysis_window_s` limits the analysis to an excerpt centred in the
/// track (0 analyzes everything). Analysis failures fall back to the
/// conservative profile; interpolation failures are returned.
pub fn analyze_source(
    analyzer: &ContentAnalyzer,
    source: &AudioBuffer,
    analysis_window_s: f64,
    preset: &PresetName,
    intensity: f32,
) -> Result<TrackAnalysis> {
    let profile = analyzer.analyze_or_conservative(&excerpt(source, analysis_window_s));
    describe(profile, preset, intensity)
}

/// Parameters are blended at the cache key's intensity resolution, so a
/// chunk's content depends only on its key.
fn describe(profile: ContentProfile, preset: &PresetName, intensity: f32) -> Result<TrackAnalysis> {
    let intensity = f32::from(quantize_intensity(intensity)) / 1000.0;
    let position = map(&profile);
    let interpolation = interpolate_detailed(&position, anchor_table(), Some(preset.as_str()))?;
    Ok(TrackAnalysis {
        profile,
        position,
        preset: preset.clone(),
        intensity,
        weights: interpolation
            .weights
            .into_iter()
            .map(|(name, w)| (name.to_string(), w))
            .collect(),
        applied_rules: interpolation
            .applied_rules
            .into_iter()
            .map(str::to_string)
            .collect(),
        parameters: interpolation.parameters.at_intensity(intensity),
    })
}

/// Centred excerpt of at most `window_s` seconds
fn excerpt(source: &AudioBuffer, window_s: f64) -> AudioBuffer {
    let window = (window_s.max(0.0) * f64::from(source.sample_rate())).round() as usize;
    let frames = source.frames();
    if window == 0 || window >= frames {
        return source.clone();
    }
    let start = (frames - window) / 2;
    source.slice_frames(start, start + window)
}

/// A decoded, analyzed track
pub struct PreparedTrack {
    pub info: TrackInfo,
    pub signature: FileSignature,
    pub source: Arc<AudioBuffer>,
    pub profile: ContentProfile,
    pub position: SpectrumPosition,
    /// Whole-track source RMS (dBFS)
    pub track_rms_db: f32,
    pub plan: Arc<ChunkPlan>,
}

type PreparedKey = (TrackId, FileSignature);

/// The adaptive mastering engine
pub struct MasteringEngine {
    config: EngineConfig,
    library: Arc<dyn TrackLibrary>,
    loader: Arc<dyn AudioLoader>,
    analyzer: Arc<ContentAnalyzer>,
    planner: ChunkPlanner,
    cache: Arc<ChunkCache>,
    processor: Arc<ChunkProcessor>,
    controls: RwLock<ControlState>,
    prepared: Mutex<LruCache<PreparedKey, Arc<PreparedTrack>>>,
    preparing: Arc<InFlightRegistry<PreparedKey, Arc<PreparedTrack>>>,
}

impl MasteringEngine {
    /// Create an engine; the configuration is validated first
    pub fn new(
        config: EngineConfig,
        library: Arc<dyn TrackLibrary>,
        loader: Arc<dyn AudioLoader>,
    ) -> Result<Self> {
        config.validate()?;

        let mut cache =
            ChunkCache::new(config.cache_capacity).with_memory_budget(config.cache_memory_bytes());
        if let Some(dir) = &config.disk_cache_dir {
            cache = cache.with_disk(dir);
        }
        let cache = Arc::new(cache);

        let processor = Arc::new(ChunkProcessor::new(
            MasteringChain::standard(),
            Arc::clone(&cache),
            Arc::clone(&library),
            config.workers,
        ));

        let controls = ControlState::new(validate_preset(&config.default_preset)?, config.default_intensity);
        let prepared_capacity =
            NonZeroUsize::new(config.prepared_tracks).unwrap_or(NonZeroUsize::MIN);

        tracing::info!(
            workers = config.workers,
            cache_capacity = config.cache_capacity,
            cache_memory_mb = config.cache_memory_mb,
            disk_cache = ?config.disk_cache_dir,
            chunk_s = config.target_chunk_s,
            overlap_s = config.overlap_s,
            "Mastering engine ready"
        );

        Ok(Self {
            planner: ChunkPlanner::new(config.target_chunk_s, config.overlap_s, config.min_chunk_s),
            config,
            library,
            loader,
            analyzer: Arc::new(ContentAnalyzer::new()),
            cache,
            processor,
            controls: RwLock::new(controls),
            prepared: Mutex::new(LruCache::new(prepared_capacity)),
            preparing: Arc::new(InFlightRegistry::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Snapshot of the transport settings
    pub fn controls(&self) -> ControlState {
        self.controls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn controls_mut(&self) -> std::sync::RwLockWriteGuard<'_, ControlState> {
        self.controls.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn prepared(&self) -> MutexGuard<'_, LruCache<PreparedKey, Arc<PreparedTrack>>> {
        self.prepared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turn enhancement on or off
    pub fn set_enabled(&self, enabled: bool) -> usize {
        let scope = self.controls_mut().set_enabled(enabled);
        tracing::info!(enabled, "Enhancement toggled");
        self.apply(scope)
    }

    /// Select a preset
    pub fn set_preset(&self, name: &str) -> Result<usize> {
        let scope = self.controls_mut().set_preset(name)?;
        tracing::info!(preset = name, "Preset changed");
        Ok(self.apply(scope))
    }

    /// Select an intensity in [0, 1]
    pub fn set_intensity(&self, intensity: f32) -> Result<usize> {
        let scope = self.controls_mut().set_intensity(intensity)?;
        tracing::info!(intensity, "Intensity changed");
        Ok(self.apply(scope))
    }

    /// Drop cache entries directly
    pub fn invalidate(&self, scope: &Invalidation) -> usize {
        self.cache.invalidate(scope)
    }

    fn apply(&self, scope: Option<Invalidation>) -> usize {
        scope.map_or(0, |scope| self.cache.invalidate(&scope))
    }

    /// Empty every cache tier; run once at startup
    pub async fn invalidate_on_startup(&self) -> Result<usize> {
        self.prepared().clear();
        let cache = Arc::clone(&self.cache);
        let removed = tokio::task::spawn_blocking(move || cache.purge()).await??;
        tracing::info!(removed, "Startup cache purge");
        Ok(removed)
    }

    /// Analysis and parameters for a track, without processing it
    pub async fn analyze(
        &self,
        track_id: &TrackId,
        preset: Option<&str>,
        intensity: Option<f32>,
    ) -> Result<TrackAnalysis> {
        let (preset, intensity, _) = self.resolve_settings(preset, intensity)?;
        let info = self.lookup(track_id).await?;
        let prepared = self.prepare(info).await?;
        describe(prepared.profile.clone(), &preset, intensity)
    }

    /// Mastered WAV stream for a track
    ///
    /// `preset` and `intensity` default to the transport settings. The
    /// returned stream has its first segment ready; later segments are
    /// processed in the background and delivered in order.
    pub async fn get_stream(
        &self,
        track_id: &TrackId,
        preset: Option<&str>,
        intensity: Option<f32>,
        range: Option<ByteRange>,
    ) -> Result<MasteredStream> {
        let (preset, intensity, enabled) = self.resolve_settings(preset, intensity)?;
        let info = self.lookup(track_id).await?;
        let prepared = self.prepare(info).await?;
        self.controls_mut().current_track = Some(track_id.clone());

        let source = &prepared.source;
        let plan = &prepared.plan;
        let layout = WavLayout::new(
            source.sample_rate(),
            source.format.channels,
            plan.total_frames as u64,
        );
        let window = match range {
            Some(range) => range.resolve(layout.total_len())?,
            None => (0, layout.total_len() - 1),
        };
        let first_segment = plan.segment_for_frame(layout.frame_at(window.0) as usize);
        let last_segment = plan.segment_for_frame(layout.frame_at(window.1) as usize);

        let (state_tx, state_rx) = watch::channel(StreamState::Requested);
        let base_key = CacheKey::new(
            track_id.clone(),
            prepared.signature.clone(),
            preset.clone(),
            intensity,
            0,
        );

        if !enabled {
            let job = Arc::new(TrackJob::new(
                base_key,
                Arc::clone(source),
                Arc::clone(plan),
                ProcessingParameters::neutral(),
                prepared.track_rms_db,
                0.0,
            ));
            state_tx.send_replace(StreamState::FirstChunkReady);
            let assembly = Assembly {
                job,
                layout,
                window,
                ranged: range.is_some(),
                segments: first_segment..=last_segment,
                source: SegmentSource::PassThrough,
                curve: FadeCurve::Linear,
                state: state_tx,
            };
            return Ok(assembly.spawn(false, None, state_rx));
        }

        let analysis = describe(prepared.profile.clone(), &preset, intensity)?;
        if !analysis.applied_rules.is_empty() {
            tracing::debug!(track = %track_id, rules = ?analysis.applied_rules, "Content rules applied");
        }
        let parameters = analysis.parameters;

        let job = Arc::new(TrackJob::new(
            base_key,
            Arc::clone(source),
            Arc::clone(plan),
            parameters,
            prepared.track_rms_db,
            self.config.preroll_s,
        ));

        if !self.cache.contains(&job.key(first_segment)) {
            state_tx.send_replace(StreamState::FirstChunkProcessing);
        }
        let mut ready = BTreeMap::new();
        for index in plan.chunks_for_segment(first_segment) {
            let data = self.processor.obtain(&job, index).await;
            if let Err(e) = &data {
                state_tx.send_replace(StreamState::Failed);
                tracing::warn!(track = %track_id, chunk = index, error = %e, "First chunk failed");
            }
            ready.insert(index, Ok(data?));
        }
        state_tx.send_replace(StreamState::FirstChunkReady);
        tracing::info!(
            track = %track_id,
            preset = %preset,
            intensity,
            segment = first_segment,
            chunks = plan.len(),
            "First chunk ready"
        );

        let (tx, completions) = mpsc::unbounded_channel();
        self.processor
            .spawn_background(&job, (first_segment + 1)..=last_segment, tx);

        let assembly = Assembly {
            job,
            layout,
            window,
            ranged: range.is_some(),
            segments: first_segment..=last_segment,
            source: SegmentSource::Mastered {
                processor: Arc::clone(&self.processor),
                ready,
                completions,
            },
            curve: FadeCurve::Linear,
            state: state_tx,
        };
        Ok(assembly.spawn(true, Some(parameters), state_rx))
    }

    fn resolve_settings(
        &self,
        preset: Option<&str>,
        intensity: Option<f32>,
    ) -> Result<(PresetName, f32, bool)> {
        let controls = self.controls();
        let preset = match preset {
            Some(name) => validate_preset(name)?,
            None => controls.preset,
        };
        let intensity = match intensity {
            Some(value) => validate_intensity(value)?,
            None => controls.intensity,
        };
        Ok((preset, intensity, controls.enabled))
    }

    async fn lookup(&self, track_id: &TrackId) -> Result<TrackInfo> {
        let info = self
            .library
            .track(track_id)
            .await?
            .ok_or_else(|| EngineError::TrackNotFound(track_id.clone()))?;

        let stale = self.cache.invalidate(&Invalidation::StaleSignature(
            track_id.clone(),
            info.signature(),
        ));
        if stale > 0 {
            tracing::info!(track = %track_id, stale, "Source changed, dropped stale chunks");
        }
        Ok(info)
    }

    /// Decode and analyze a track, once per file signature
    async fn prepare(&self, info: TrackInfo) -> Result<Arc<PreparedTrack>> {
        let key = (info.track_id.clone(), info.signature());
        loop {
            if let Some(prepared) = self.prepared().get(&key).cloned() {
                return Ok(prepared);
            }
            match self.preparing.claim(key.clone()) {
                Claim::Follower(waiter) => {
                    if let Some(prepared) = waiter.wait().await {
                        return Ok(prepared);
                    }
                }
                Claim::Leader(guard) => {
                    let prepared = Arc::new(self.decode_and_analyze(info.clone()).await?);
                    self.prepared().put(key.clone(), Arc::clone(&prepared));
                    guard.complete(Arc::clone(&prepared));
                    return Ok(prepared);
                }
            }
        }
    }

    async fn decode_and_analyze(&self, info: TrackInfo) -> Result<PreparedTrack> {
        let loader = Arc::clone(&self.loader);
        let analyzer = Arc::clone(&self.analyzer);
        let planner = self.planner;
        let window_s = self.config.analysis_window_s;

        tokio::task::spawn_blocking(move || -> Result<PreparedTrack> {
            let started = std::time::Instant::now();
            let source = loader.load(&info.file_path)?;
            let profile = analyzer.analyze_or_conservative(&excerpt(&source, window_s));
            let position = map(&profile);
            let track_rms_db = linear_to_db(source.rms());
            let plan = planner.plan_frames(&info.track_id, source.frames(), source.sample_rate());

            let decoded_s = source.duration_secs();
            if (decoded_s - info.duration_s).abs() > 1.0 {
                tracing::debug!(
                    track = %info.track_id,
                    decoded_s,
                    reported_s = info.duration_s,
                    "Decoded length differs from library duration"
                );
            }
            tracing::info!(
                track = %info.track_id,
                seconds = decoded_s,
                chunks = plan.len(),
                rms_db = profile.rms_db,
                ?position,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Track prepared"
            );

            Ok(PreparedTrack {
                signature: info.signature(),
                info,
                source: Arc::new(source),
                profile,
                position,
                track_rms_db,
                plan: Arc::new(plan),
            })
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::AudioFormat;

    #[test]
    fn excerpt_is_centred() {
        let source = AudioBuffer::new((0..100).map(|i| i as f32).collect(), AudioFormat::new(contour_core::SampleRate::new(10), 1, 32));
        let cut = excerpt(&source, 2.0);
        assert_eq!(cut.frames(), 20);
        assert_eq!(cut.samples[0], 40.0);
        assert_eq!(excerpt(&source, 0.0).frames(), 100);
        assert_eq!(excerpt(&source, 50.0).frames(), 100);
    }

    #[test]
    fn describe_applies_intensity() {
        let full = describe(ContentProfile::conservative(), &PresetName::new("punchy"), 1.0).unwrap();
        let none = describe(ContentProfile::conservative(), &PresetName::new("punchy"), 0.0).unwrap();
        assert_eq!(none.parameters, ProcessingParameters::neutral());
        assert!(full.parameters.compression_ratio > 1.0);
        let total: f64 = full.weights.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn intensities_sharing_a_cache_key_share_parameters() {
        let preset = PresetName::new("warm");
        let a = describe(ContentProfile::conservative(), &preset, 0.5).unwrap();
        let b = describe(ContentProfile::conservative(), &preset, 0.5004).unwrap();
        assert_eq!(a.parameters, b.parameters);
        assert_eq!(b.intensity, 0.5);

        let c = describe(ContentProfile::conservative(), &preset, 0.501).unwrap();
        assert_ne!(a.parameters, c.parameters);
    }
}
