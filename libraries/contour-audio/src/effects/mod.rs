/// Mastering DSP stages
///
/// Each stage is a pure `AudioBuffer -> AudioBuffer` transform. The
/// `MasteringChain` runs them in a fixed order:
/// EQ, dynamics, stereo width, loudness normalization, limiter.
mod chain;
mod crossfade;
mod dynamics;
mod eq;
mod limiter;
mod normalizer;
mod sanitize;
mod stereo;

pub use chain::{ChainContext, ChainOutput, ChainReport, Compressor, DspStage, MasteringChain};
pub use crossfade::{crossfade, FadeCurve};
pub use dynamics::{compress, CompressorSettings, DynamicsState, EnvelopeFollower};
pub use eq::CriticalBandEq;
pub use limiter::{LookaheadLimiter, DEFAULT_LOOKAHEAD_MS, DEFAULT_RELEASE_MS};
pub use normalizer::{normalization_gain_db, LoudnessNormalizer, MAX_NORMALIZATION_GAIN_DB};
pub use sanitize::sanitize;
pub use stereo::{widen, StereoWidth, WIDTH_RANGE};
