//! Contour Engine - chunked adaptive mastering
//!
//! Serves a mastered version of a library track as a WAV stream. Tracks are
//! split into overlapping chunks that are processed on a worker pool, cached
//! in memory (and optionally on disk), and stitched back together with
//! linear crossfades.
//!
//! # Flow
//!
//! ```text
//! get_stream(track, preset, intensity, range)
//!   ├─ TrackLibrary::track      file signature (path, mtime, size)
//!   ├─ decode + analyze         once per signature
//!   ├─ interpolate              anchors + content rules → parameters
//!   ├─ ChunkPlanner             30 s chunks, 1 s overlap
//!   ├─ first segment            processed before the stream is returned
//!   └─ remaining chunks         background workers, delivered in order
//! ```
//!
//! Cache entries are keyed by track, file signature, preset, intensity and
//! chunk index. A changed file produces a new signature, so stale entries are
//! never served; they are dropped on the next lookup.
//!
//! # Example
//!
//! ```no_run
//! use contour_audio::SymphoniaDecoder;
//! use contour_core::TrackId;
//! use contour_engine::{EngineConfig, FsTrackLibrary, MasteringEngine};
//! use std::sync::Arc;
//!
//! # async fn run() -> contour_engine::Result<()> {
//! let library = Arc::new(FsTrackLibrary::new());
//! library.add(TrackId::new("intro"), "/music/intro.flac");
//!
//! let engine = MasteringEngine::new(
//!     EngineConfig::default(),
//!     library,
//!     Arc::new(SymphoniaDecoder::new()),
//! )?;
//! let stream = engine
//!     .get_stream(&TrackId::new("intro"), Some("warm"), Some(0.8), None)
//!     .await?;
//! let wav = stream.collect().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod cache;
mod config;
mod controls;
mod engine;
mod error;
mod inflight;
mod library;
pub mod planner;
mod processor;
pub mod stream;
pub mod wav;

pub use cache::{quantize_intensity, CacheKey, CacheStats, ChunkCache, Invalidation};
pub use config::{default_workers, EngineConfig};
pub use controls::{validate_intensity, validate_preset, ControlState};
pub use engine::{analyze_source, MasteringEngine, PreparedTrack, TrackAnalysis};
pub use error::{EngineError, Result};
pub use inflight::{Claim, InFlightGuard, InFlightRegistry, Waiter};
pub use library::FsTrackLibrary;
pub use planner::{Chunk, ChunkPlan, ChunkPlanner};
pub use processor::{ChunkData, ChunkProcessor, TrackJob};
pub use stream::{stitch_segment, ByteRange, MasteredStream, StreamState};
pub use wav::{encode_pcm16, WavLayout};
