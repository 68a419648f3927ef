//! Contour Audio
//!
//! Audio decoding and the offline mastering DSP chain.
//!
//! This crate provides:
//! - Audio decoding via Symphonia (MP3, FLAC, OGG, WAV, AAC)
//! - The mastering chain: 24-band critical-band EQ, compressor with a
//!   carried envelope follower, stereo width, lookahead limiter and loudness
//!   normalization
//! - Fade curves for stitching processed chunks
//!
//! Every stage is a pure transform: it reads an `AudioBuffer` and returns a new
//! one. The only state that crosses a chunk boundary is the compressor's
//! `DynamicsState`, which is passed in and returned explicitly.
//!
//! # Example: Decoding Audio
//!
//! ```rust,no_run
//! use contour_audio::SymphoniaDecoder;
//! use contour_core::AudioLoader;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = SymphoniaDecoder::new();
//! let buffer = decoder.load(Path::new("/music/song.flac"))?;
//!
//! println!("Decoded {} frames at {} Hz", buffer.frames(), buffer.sample_rate());
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Mastering a buffer
//!
//! ```rust
//! use contour_audio::effects::MasteringChain;
//! use contour_core::{AudioBuffer, AudioFormat, ProcessingParameters};
//!
//! let chain = MasteringChain::standard();
//! let input = AudioBuffer::silence(4_410, AudioFormat::float_stereo(44_100));
//!
//! let output = chain.process(&input, &ProcessingParameters::neutral(), None, None);
//! assert_eq!(output.buffer.frames(), input.frames());
//! ```

mod decoder;
pub mod effects;
mod error;

pub use decoder::SymphoniaDecoder;
pub use error::{AudioError, Result};
