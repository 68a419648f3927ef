//! Contour Core
//!
//! Platform-agnostic core types, traits, and error handling for the Contour
//! adaptive mastering engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `AudioBuffer`, `TrackId`, `TrackInfo`, `FileSignature`,
//!   `ProcessingParameters`
//! - **Collaborator Traits**: `TrackLibrary` (metadata service), `AudioLoader` (decoding)
//! - **Error Handling**: Unified `ContourError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use contour_core::{AudioBuffer, AudioFormat, ProcessingParameters, SampleRate};
//!
//! let format = AudioFormat::new(SampleRate::CD_QUALITY, 2, 32);
//! let buffer = AudioBuffer::new(vec![0.0; 88_200], format);
//! assert_eq!(buffer.frames(), 44_100);
//!
//! // Half intensity sits between the neutral chain and the full parameters
//! let params = ProcessingParameters::neutral().at_intensity(0.5);
//! assert_eq!(params.compression_ratio, 1.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ContourError, Result};
pub use traits::{AudioLoader, TrackLibrary};

pub use types::{
    // Audio types
    db_to_linear, linear_to_db, AudioBuffer, AudioFormat, SampleRate,
    // Identity
    PresetName, TrackId,
    // Library boundary
    FileSignature, TrackInfo,
    // Processing
    ParameterBounds, ProcessingParameters, CRITICAL_BAND_FREQUENCIES, EQ_BAND_COUNT,
};
