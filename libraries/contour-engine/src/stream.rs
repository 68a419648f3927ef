//! Output stream assembly
//!
//! Turns chunks into a WAV byte stream: segments are stitched in index order
//! (crossfading each chunk's head with the previous chunk's tail), encoded
//! to 16-bit PCM, and clipped to the requested byte range. Chunks that finish
//! early wait in an ordered buffer until their segment is due.

use crate::error::{EngineError, Result};
use crate::planner::ChunkPlan;
use crate::processor::{ChunkData, ChunkProcessor, TrackJob};
use crate::wav::{encode_pcm16, WavLayout, WAV_HEADER_LEN};
use bytes::Bytes;
use contour_audio::effects::{crossfade, FadeCurve};
use contour_core::{AudioBuffer, ProcessingParameters};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// HTTP byte range (`bytes=start-end`, both ends inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Parse a `Range` header value; multi-range requests are not supported
    pub fn parse(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let parse = |s: &str| -> Option<Option<u64>> {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse().ok().map(Some)
            }
        };
        let range = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if range.start.is_none() && range.end.is_none() {
            return None;
        }
        Some(range)
    }

    /// Resolve against a body of `total_len` bytes to inclusive offsets
    ///
    /// `bytes=-n` is the last `n` bytes; an end past the body is clamped.
    pub fn resolve(&self, total_len: u64) -> Result<(u64, u64)> {
        let unsatisfiable = || EngineError::RangeNotSatisfiable(format!("{:?} of {}", self, total_len));
        if total_len == 0 {
            return Err(unsatisfiable());
        }
        let last = total_len - 1;
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end.min(last)),
            (Some(start), None) => (start, last),
            (None, Some(suffix)) if suffix > 0 => (total_len.saturating_sub(suffix), last),
            _ => return Err(unsatisfiable()),
        };
        if start > end || start > last {
            return Err(unsatisfiable());
        }
        Ok((start, end))
    }
}

/// Per-request state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Requested,
    FirstChunkProcessing,
    FirstChunkReady,
    Streaming,
    Complete,
    Failed,
}

/// A mastered (or pass-through) WAV stream
pub struct MasteredStream {
    pub layout: WavLayout,
    /// Served byte range, inclusive; `None` for the whole file
    pub range: Option<(u64, u64)>,
    /// False when enhancement is disabled and the source is streamed as is
    pub enhanced: bool,
    /// Parameters in effect, when enhanced
    pub parameters: Option<ProcessingParameters>,
    state: watch::Receiver<StreamState>,
    body: BoxStream<'static, Result<Bytes>>,
}

impl MasteredStream {
    /// Size of the complete WAV file
    pub fn total_len(&self) -> u64 {
        self.layout.total_len()
    }

    /// Bytes this stream will yield
    pub fn content_length(&self) -> u64 {
        match self.range {
            Some((start, end)) => end - start + 1,
            None => self.total_len(),
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    pub fn into_body(self) -> BoxStream<'static, Result<Bytes>> {
        self.body
    }

    /// Drain the stream into memory
    pub async fn collect(self) -> Result<Vec<u8>> {
        let expected = self.content_length();
        let mut body = self.body;
        let mut out = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        while let Some(bytes) = body.next().await {
            out.extend_from_slice(&bytes?);
        }
        Ok(out)
    }
}

/// Build segment `index` of the output from its chunks
///
/// `previous` is chunk `index - 1` (ignored for segment 0); both buffers are
/// in chunk-local frames.
pub fn stitch_segment(
    plan: &ChunkPlan,
    index: usize,
    previous: Option<&AudioBuffer>,
    current: &AudioBuffer,
    curve: FadeCurve,
) -> AudioBuffer {
    let Some((seg_start, seg_end)) = plan.segment_bounds(index) else {
        return current.slice_frames(0, 0);
    };
    let local_end = seg_end - seg_start;

    let (Some(previous), Some(prev_chunk)) = (previous, index.checked_sub(1).and_then(|i| plan.chunk(i)))
    else {
        return current.slice_frames(0, local_end);
    };

    let overlap = prev_chunk.overlap_samples.min(local_end);
    if overlap == 0 {
        return current.slice_frames(0, local_end);
    }

    let tail_start = seg_start - prev_chunk.start_sample;
    let tail = previous.slice_frames(tail_start, tail_start + overlap);
    let head = current.slice_frames(0, overlap);
    let faded = crossfade(&tail, &head, curve);

    let mut samples = faded.samples;
    samples.extend_from_slice(&current.slice_frames(overlap, local_end).samples);
    current.with_samples(samples)
}

/// Where segment audio comes from
pub(crate) enum SegmentSource {
    /// Chunks from the processor, stitched with crossfades
    Mastered {
        processor: Arc<ChunkProcessor>,
        ready: BTreeMap<usize, Result<ChunkData>>,
        completions: mpsc::UnboundedReceiver<(usize, Result<ChunkData>)>,
    },
    /// Source audio sliced directly
    PassThrough,
}

/// Producer half of a stream
pub(crate) struct Assembly {
    pub job: Arc<TrackJob>,
    pub layout: WavLayout,
    pub window: (u64, u64),
    /// The request carried a `Range` header
    pub ranged: bool,
    pub segments: std::ops::RangeInclusive<usize>,
    pub source: SegmentSource,
    pub curve: FadeCurve,
    pub state: watch::Sender<StreamState>,
}

impl Assembly {
    /// Start producing; returns the consumer half
    pub fn spawn(
        self,
        enhanced: bool,
        parameters: Option<ProcessingParameters>,
        state: watch::Receiver<StreamState>,
    ) -> MasteredStream {
        let layout = self.layout;
        let window = self.window;
        let ranged = self.ranged;
        let (tx, rx) = mpsc::channel::<Result<Bytes>>(4);
        tokio::spawn(self.run(tx));

        let body = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();

        MasteredStream {
            layout,
            range: ranged.then_some(window),
            enhanced,
            parameters,
            state,
            body,
        }
    }

    async fn run(mut self, out: mpsc::Sender<Result<Bytes>>) {
        self.state.send_replace(StreamState::Streaming);
        match self.produce(&out).await {
            Ok(true) => {
                self.state.send_replace(StreamState::Complete);
                tracing::debug!(track = %self.job.key(0).track_id, "Stream complete");
            }
            Ok(false) => {
                tracing::debug!(track = %self.job.key(0).track_id, "Stream abandoned by consumer");
            }
            Err(e) => {
                self.state.send_replace(StreamState::Failed);
                tracing::warn!(track = %self.job.key(0).track_id, error = %e, "Stream failed");
                let _ = out.send(Err(e)).await;
            }
        }
    }

    /// Returns `Ok(false)` if the consumer went away
    async fn produce(&mut self, out: &mpsc::Sender<Result<Bytes>>) -> Result<bool> {
        if self.window.0 < WAV_HEADER_LEN {
            if let Some(bytes) = clip(self.layout.header(), 0, self.window) {
                if out.send(Ok(bytes)).await.is_err() {
                    return Ok(false);
                }
            }
        }
        if self.layout.total_frames == 0 {
            return Ok(true);
        }

        let pass_through = matches!(self.source, SegmentSource::PassThrough);
        let mut previous: Option<ChunkData> = None;
        for index in self.segments.clone() {
            let audio = if pass_through {
                let (start, end) = self.segment_bounds(index)?;
                self.job.source().slice_frames(start, end)
            } else {
                if index > 0 && previous.as_ref().map(|p| p.index) != Some(index - 1) {
                    previous = Some(self.chunk(index - 1).await?);
                }
                let current = self.chunk(index).await?;
                let audio = stitch_segment(
                    self.job.plan(),
                    index,
                    previous.as_ref().map(|p| p.buffer.as_ref()),
                    &current.buffer,
                    self.curve,
                );
                previous = Some(current);
                audio
            };

            let (start, _) = self.segment_bounds(index)?;
            let offset = self.layout.frame_offset(start as u64);
            if let Some(bytes) = clip(encode_pcm16(&audio), offset, self.window) {
                if out.send(Ok(bytes)).await.is_err() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn segment_bounds(&self, index: usize) -> Result<(usize, usize)> {
        self.job
            .plan()
            .segment_bounds(index)
            .ok_or_else(|| EngineError::Audio(format!("segment {} outside plan", index)))
    }

    /// Next chunk in index order, from the ordered buffer or the completions
    async fn chunk(&mut self, index: usize) -> Result<ChunkData> {
        let SegmentSource::Mastered {
            processor,
            ready,
            completions,
        } = &mut self.source
        else {
            return Err(EngineError::Audio("pass-through stream has no chunks".to_string()));
        };

        if let Some(result) = ready.remove(&index) {
            return result;
        }
        while let Some((done, result)) = completions.recv().await {
            if done == index {
                return result;
            }
            ready.insert(done, result);
        }
        // not queued for this request
        processor.obtain(&self.job, index).await
    }
}

/// Part of `bytes` (starting at logical `offset`) inside the inclusive window
fn clip(bytes: Bytes, offset: u64, (start, end): (u64, u64)) -> Option<Bytes> {
    if bytes.is_empty() {
        return None;
    }
    let last = offset + bytes.len() as u64 - 1;
    let from = start.max(offset);
    let to = end.min(last);
    if from > to {
        return None;
    }
    Some(bytes.slice((from - offset) as usize..=(to - offset) as usize))
}
