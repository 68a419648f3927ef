//! Chunk planner
//!
//! Splits a track into fixed-length, overlapping chunks and maps the output
//! timeline onto serving segments.
//!
//! ```text
//! chunks:    [0 ........ T+O)
//!                      [T ........ 2T+O)
//!                                [2T ........ N)
//! segments:  [0 ..... T)[T ...... 2T)[2T ...... N)
//!                       ^ xfade     ^ xfade
//! ```
//!
//! Segment 0 is chunk 0 up to chunk 1's start. Segment i > 0 starts with the
//! crossfade of chunk i-1's trailing overlap and chunk i's head, then runs to
//! chunk i+1's start, so it needs chunks i-1 and i.

use contour_core::TrackId;
use serde::{Deserialize, Serialize};

/// One planned chunk; positions are frame indices into the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub track_id: TrackId,
    pub index: usize,
    pub start_sample: usize,
    pub end_sample: usize,
    /// Frames this chunk extends past the next chunk's start (0 for the last)
    pub overlap_samples: usize,
}

impl Chunk {
    /// Length in frames
    pub fn frames(&self) -> usize {
        self.end_sample - self.start_sample
    }
}

/// Planner settings, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPlanner {
    pub target_chunk_s: f64,
    pub overlap_s: f64,
    pub min_chunk_s: f64,
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self {
            target_chunk_s: 30.0,
            overlap_s: 1.0,
            min_chunk_s: 15.0,
        }
    }
}

impl ChunkPlanner {
    pub fn new(target_chunk_s: f64, overlap_s: f64, min_chunk_s: f64) -> Self {
        Self {
            target_chunk_s,
            overlap_s,
            min_chunk_s,
        }
    }

    /// Plan a track of `track_duration_s` seconds
    pub fn plan(&self, track_id: &TrackId, track_duration_s: f64, sample_rate: u32) -> ChunkPlan {
        let total = if track_duration_s.is_finite() && track_duration_s > 0.0 {
            (track_duration_s * f64::from(sample_rate)).round() as usize
        } else {
            0
        };
        self.plan_frames(track_id, total, sample_rate)
    }

    /// Plan a track of exactly `total_frames` frames
    pub fn plan_frames(&self, track_id: &TrackId, total_frames: usize, sample_rate: u32) -> ChunkPlan {
        let to_frames = |seconds: f64| (seconds * f64::from(sample_rate)).round() as usize;
        let target = to_frames(self.target_chunk_s).max(1);
        let overlap = to_frames(self.overlap_s);
        let min_chunk = to_frames(self.min_chunk_s);

        let single = |total: usize| Chunk {
            track_id: track_id.clone(),
            index: 0,
            start_sample: 0,
            end_sample: total,
            overlap_samples: 0,
        };

        if total_frames < 2 * min_chunk || total_frames <= target {
            return ChunkPlan {
                chunks: vec![single(total_frames)],
                total_frames,
                sample_rate,
            };
        }

        let mut count = total_frames.div_ceil(target);
        let remainder = total_frames - (count - 1) * target;
        if count > 1 && remainder < min_chunk {
            count -= 1;
        }

        let chunks = (0..count)
            .map(|index| {
                let start = index * target;
                if index + 1 == count {
                    Chunk {
                        track_id: track_id.clone(),
                        index,
                        start_sample: start,
                        end_sample: total_frames,
                        overlap_samples: 0,
                    }
                } else {
                    let next_start = (index + 1) * target;
                    let end = (next_start + overlap).min(total_frames);
                    Chunk {
                        track_id: track_id.clone(),
                        index,
                        start_sample: start,
                        end_sample: end,
                        overlap_samples: end - next_start,
                    }
                }
            })
            .collect();

        ChunkPlan {
            chunks,
            total_frames,
            sample_rate,
        }
    }
}

/// Planned chunks of one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    pub total_frames: usize,
    pub sample_rate: u32,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Output frames `[start, end)` served by segment `index`
    pub fn segment_bounds(&self, index: usize) -> Option<(usize, usize)> {
        let chunk = self.chunks.get(index)?;
        let end = self
            .chunks
            .get(index + 1)
            .map_or(self.total_frames, |next| next.start_sample);
        Some((chunk.start_sample, end))
    }

    /// Segment containing output frame `frame`; frames past the end map to the
    /// last segment
    pub fn segment_for_frame(&self, frame: usize) -> usize {
        self.chunks
            .iter()
            .rposition(|c| c.start_sample <= frame)
            .unwrap_or(0)
    }

    /// Chunks that must be ready before segment `index` can be served
    pub fn chunks_for_segment(&self, index: usize) -> std::ops::RangeInclusive<usize> {
        index.saturating_sub(1)..=index
    }
}
