//! Content analysis and adaptive parameters for Contour
//!
//! This crate provides:
//! - Content analysis (RMS, peak, crest factor, spectral centroid/rolloff,
//!   onset density, EBU R128 loudness)
//! - Mapping of the analysis onto a 5-D characteristic space
//! - The preset anchor table and the parameter interpolator
//! - Content rules applied after interpolation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ AudioBuffer │ ──► │  Analyzer    │ ──► │ ContentProfile   │
//! └─────────────┘     └──────────────┘     └──────────────────┘
//!                                                   │ map()
//!                                                   ▼
//! ┌──────────────────────┐  interpolate()  ┌──────────────────┐
//! │ ProcessingParameters │ ◄────────────── │ SpectrumPosition │
//! └──────────────────────┘   + anchors     └──────────────────┘
//!                            + rules
//! ```
//!
//! # Example
//!
//! ```rust
//! use contour_analysis::{anchor_table, interpolate, map, ContentProfile};
//!
//! let position = map(&ContentProfile::conservative());
//! let params = interpolate(&position, anchor_table(), Some("warm")).unwrap();
//! assert!(params.compression_ratio >= 1.0);
//! ```

#![forbid(unsafe_code)]

mod analyzer;
mod anchors;
mod error;
mod interpolator;
mod profile;
mod rules;
pub mod spectrum;

pub use analyzer::{AnalyzerConfig, ContentAnalyzer};
pub use anchors::{anchor_table, find_anchor, preset_names, PresetAnchor, DEFAULT_PRESET};
pub use error::{AnalysisError, Result};
pub use interpolator::{
    interpolate, interpolate_detailed, Interpolation, DISTANCE_EPSILON, HINT_BOOST,
};
pub use profile::{ContentProfile, EnergyLevel};
pub use rules::{apply_rules, ContentRule, CONTENT_RULES};
pub use spectrum::{map, SpectrumPosition};
