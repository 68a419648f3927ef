//! Chunk processor
//!
//! Produces the processed audio of one chunk, going through the cache and the
//! in-flight registry so a chunk is never processed twice concurrently. DSP
//! runs on the blocking pool, gated by a semaphore with one permit per
//! worker.
//!
//! Failure handling per chunk:
//! - a failed render (worker panic, wrong output length) is retried once,
//!   then the unprocessed source audio is substituted and not cached
//! - a changed or removed source file aborts the job; nothing is written
//!   under the stale signature

use crate::cache::{CacheKey, ChunkCache};
use crate::error::{EngineError, Result};
use crate::inflight::{Claim, InFlightRegistry};
use crate::planner::ChunkPlan;
use contour_audio::effects::MasteringChain;
use contour_core::{AudioBuffer, ProcessingParameters, TrackLibrary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Audio of one chunk, in chunk-local frames
#[derive(Debug, Clone)]
pub struct ChunkData {
    pub index: usize,
    pub buffer: Arc<AudioBuffer>,
    /// False when the unprocessed source was substituted
    pub processed: bool,
    /// True when served from the cache
    pub cached: bool,
}

/// One track under one setting: the unit of chunk work
pub struct TrackJob {
    base_key: CacheKey,
    source: Arc<AudioBuffer>,
    plan: Arc<ChunkPlan>,
    params: ProcessingParameters,
    track_rms_db: f32,
    preroll_frames: usize,
    aborted: AtomicBool,
}

impl TrackJob {
    pub fn new(
        base_key: CacheKey,
        source: Arc<AudioBuffer>,
        plan: Arc<ChunkPlan>,
        params: ProcessingParameters,
        track_rms_db: f32,
        preroll_s: f64,
    ) -> Self {
        let preroll_frames = (preroll_s.max(0.0) * f64::from(source.sample_rate())).round() as usize;
        Self {
            base_key,
            source,
            plan,
            params,
            track_rms_db,
            preroll_frames,
            aborted: AtomicBool::new(false),
        }
    }

    pub fn key(&self, index: usize) -> CacheKey {
        self.base_key.with_index(index)
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn source(&self) -> &Arc<AudioBuffer> {
        &self.source
    }

    pub fn parameters(&self) -> &ProcessingParameters {
        &self.params
    }

    /// Stop further work for this job
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn stale_error(&self) -> EngineError {
        EngineError::StaleSignature {
            track_id: self.base_key.track_id.clone(),
            signature: self.base_key.signature.clone(),
        }
    }

    fn expected_frames(&self, index: usize) -> Result<usize> {
        self.plan
            .chunk(index)
            .map(|c| c.frames())
            .ok_or_else(|| EngineError::Audio(format!("chunk {} outside plan", index)))
    }

    /// Source audio of a chunk, unprocessed
    pub fn raw_chunk(&self, index: usize) -> Result<AudioBuffer> {
        let chunk = self
            .plan
            .chunk(index)
            .ok_or_else(|| EngineError::Audio(format!("chunk {} outside plan", index)))?;
        Ok(self.source.slice_frames(chunk.start_sample, chunk.end_sample))
    }

    /// Run the chain over one chunk plus its preroll
    fn render(&self, chain: &MasteringChain, index: usize) -> Result<AudioBuffer> {
        let chunk = self
            .plan
            .chunk(index)
            .ok_or_else(|| EngineError::Audio(format!("chunk {} outside plan", index)))?;
        if chunk.frames() == 0 {
            return Ok(self.source.slice_frames(0, 0));
        }

        let preroll = self.preroll_frames.min(chunk.start_sample);
        let input = self
            .source
            .slice_frames(chunk.start_sample - preroll, chunk.end_sample);
        let output = chain.process(&input, &self.params, Some(self.track_rms_db), None);
        let rendered = output.buffer.slice_frames(preroll, output.buffer.frames());

        if rendered.frames() != chunk.frames() {
            return Err(EngineError::Audio(format!(
                "chunk {} rendered {} frames, expected {}",
                index,
                rendered.frames(),
                chunk.frames()
            )));
        }

        tracing::debug!(
            track = %self.base_key.track_id,
            chunk = index,
            frames = rendered.frames(),
            gain_reduction_db = output.report.final_gain_reduction_db,
            normalization_db = output.report.normalization_gain_db,
            silenced = output.report.silenced_frames,
            "Rendered chunk"
        );
        Ok(rendered)
    }
}

/// Shared chunk processor
pub struct ChunkProcessor {
    chain: Arc<MasteringChain>,
    cache: Arc<ChunkCache>,
    inflight: Arc<InFlightRegistry<CacheKey, ChunkData>>,
    permits: Arc<Semaphore>,
    library: Arc<dyn TrackLibrary>,
}

impl ChunkProcessor {
    pub fn new(
        chain: MasteringChain,
        cache: Arc<ChunkCache>,
        library: Arc<dyn TrackLibrary>,
        workers: usize,
    ) -> Self {
        Self {
            chain: Arc::new(chain),
            cache,
            inflight: Arc::new(InFlightRegistry::new()),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            library,
        }
    }

    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.cache
    }

    /// Chunks currently being processed
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Get a chunk from the cache, or process it
    pub async fn obtain(&self, job: &Arc<TrackJob>, index: usize) -> Result<ChunkData> {
        let key = job.key(index);
        let frames = job.expected_frames(index)?;
        let channels = job.source.channels();

        loop {
            if job.is_aborted() {
                return Err(job.stale_error());
            }

            if let Some(entry) = self.lookup(&key, frames, channels).await? {
                tracing::debug!(track = %key.track_id, chunk = index, "Chunk cache hit");
                return Ok(ChunkData {
                    index,
                    buffer: entry.processed,
                    processed: true,
                    cached: true,
                });
            }

            match self.inflight.claim(key.clone()) {
                Claim::Follower(waiter) => {
                    if let Some(data) = waiter.wait().await {
                        return Ok(data);
                    }
                }
                Claim::Leader(guard) => {
                    if self.cache.contains(&key) {
                        // finished by another leader since the lookup
                        continue;
                    }
                    let data = self.produce(job, index).await?;
                    guard.complete(data.clone());
                    return Ok(data);
                }
            }
        }
    }

    async fn lookup(
        &self,
        key: &CacheKey,
        frames: usize,
        channels: usize,
    ) -> Result<Option<crate::cache::CacheEntry>> {
        if self.cache.has_disk() {
            let cache = Arc::clone(&self.cache);
            let key = key.clone();
            Ok(tokio::task::spawn_blocking(move || cache.get_checked(&key, frames, channels)).await?)
        } else {
            Ok(self.cache.get_checked(key, frames, channels))
        }
    }

    async fn produce(&self, job: &Arc<TrackJob>, index: usize) -> Result<ChunkData> {
        self.ensure_current(job).await?;

        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))?;

        if job.is_aborted() {
            return Err(job.stale_error());
        }

        tracing::debug!(track = %job.base_key.track_id, chunk = index, "Processing chunk");
        let rendered = match self.render(job, index).await {
            Ok(buffer) => Ok(buffer),
            Err(first) => {
                tracing::warn!(chunk = index, error = %first, "Chunk processing failed, retrying");
                self.render(job, index).await
            }
        };

        match rendered {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                self.ensure_current(job).await?;
                self.store(job.key(index), Arc::clone(&buffer)).await?;
                Ok(ChunkData {
                    index,
                    buffer,
                    processed: true,
                    cached: false,
                })
            }
            Err(e) => {
                tracing::warn!(
                    track = %job.base_key.track_id,
                    chunk = index,
                    error = %e,
                    "Chunk processing failed twice, serving unprocessed audio"
                );
                Ok(ChunkData {
                    index,
                    buffer: Arc::new(job.raw_chunk(index)?),
                    processed: false,
                    cached: false,
                })
            }
        }
    }

    async fn render(&self, job: &Arc<TrackJob>, index: usize) -> Result<AudioBuffer> {
        let job = Arc::clone(job);
        let chain = Arc::clone(&self.chain);
        tokio::task::spawn_blocking(move || job.render(&chain, index)).await?
    }

    async fn store(&self, key: CacheKey, buffer: Arc<AudioBuffer>) -> Result<()> {
        if self.cache.has_disk() {
            let cache = Arc::clone(&self.cache);
            tokio::task::spawn_blocking(move || cache.put(key, buffer)).await?;
        } else {
            self.cache.put(key, buffer);
        }
        Ok(())
    }

    /// Fail (and abort the job) if the source file changed or disappeared
    async fn ensure_current(&self, job: &TrackJob) -> Result<()> {
        let track_id = &job.base_key.track_id;
        let current = self.library.track(track_id).await?;
        match current {
            Some(info) if info.signature() == job.base_key.signature => Ok(()),
            Some(_) | None => {
                if !job.is_aborted() {
                    tracing::warn!(track = %track_id, "Source changed during processing, aborting");
                }
                job.abort();
                Err(job.stale_error())
            }
        }
    }

    /// Queue chunks for background processing
    ///
    /// Each chunk's result is sent on `completions` as it finishes, in
    /// whatever order the workers finish. Work continues after the receiver
    /// is dropped so results still reach the cache.
    pub fn spawn_background(
        self: &Arc<Self>,
        job: &Arc<TrackJob>,
        indices: impl IntoIterator<Item = usize>,
        completions: mpsc::UnboundedSender<(usize, Result<ChunkData>)>,
    ) {
        for index in indices {
            let processor = Arc::clone(self);
            let job = Arc::clone(job);
            let completions = completions.clone();
            tokio::spawn(async move {
                let result = processor.obtain(&job, index).await;
                if let Err(e) = &result {
                    tracing::debug!(chunk = index, error = %e, "Background chunk failed");
                }
                let _ = completions.send((index, result));
            });
        }
    }
}
