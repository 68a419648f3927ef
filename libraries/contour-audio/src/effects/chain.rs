/// Mastering chain
///
/// Stages are run in order; each one reads the previous stage's buffer and
/// returns a new one. Before every stage the buffer is scanned for NaN and
/// infinity, and offending frames are replaced with silence.
use super::dynamics::{compress, CompressorSettings, DynamicsState};
use super::eq::CriticalBandEq;
use super::limiter::LookaheadLimiter;
use super::normalizer::LoudnessNormalizer;
use super::sanitize::sanitize;
use super::stereo::StereoWidth;
use contour_core::{linear_to_db, AudioBuffer, ParameterBounds, ProcessingParameters};

/// One stage of the mastering chain
pub trait DspStage: Send + Sync {
    /// Stage name (for logging)
    fn name(&self) -> &'static str;

    /// Transform `input` into a new buffer
    ///
    /// Implementations must preserve frame count and channel count.
    fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        ctx: &mut ChainContext,
    ) -> AudioBuffer;
}

/// Values shared between stages during one `process` call
#[derive(Debug, Clone, Default)]
pub struct ChainContext {
    /// RMS of the unprocessed chunk (dBFS)
    pub source_rms_db: Option<f32>,

    /// RMS of the whole unprocessed track (dBFS), if known
    pub track_rms_db: Option<f32>,

    /// Compressor state; `None` until the compressor has run or when the
    /// caller has no predecessor state to carry in
    pub dynamics: Option<DynamicsState>,

    /// What the stages did
    pub report: ChainReport,
}

/// Summary of one chain run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainReport {
    /// Frames replaced with silence because they held non-finite samples
    pub silenced_frames: usize,

    /// Compressor gain reduction at the end of the buffer (dB)
    pub final_gain_reduction_db: f32,

    /// Gain applied by the normalizer, makeup included (dB)
    pub normalization_gain_db: f32,
}

/// Result of running the chain
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Processed audio
    pub buffer: AudioBuffer,

    /// Compressor state at the end of the buffer
    pub dynamics: DynamicsState,

    /// Stage summary
    pub report: ChainReport,
}

/// Ordered list of DSP stages
pub struct MasteringChain {
    stages: Vec<Box<dyn DspStage>>,
}

impl MasteringChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// EQ, compressor, stereo width, normalization, limiter
    ///
    /// The limiter runs last so it alone decides the output peak.
    pub fn standard() -> Self {
        let mut chain = Self::new();
        chain.add_stage(Box::new(CriticalBandEq::new()));
        chain.add_stage(Box::new(Compressor));
        chain.add_stage(Box::new(StereoWidth));
        chain.add_stage(Box::new(LoudnessNormalizer));
        chain.add_stage(Box::new(LookaheadLimiter::new()));
        chain
    }

    /// Append a stage
    pub fn add_stage(&mut self, stage: Box<dyn DspStage>) {
        self.stages.push(stage);
    }

    /// Stage names in processing order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `input`
    ///
    /// - `track_rms_db`: whole-track source RMS, lets the normalizer treat
    ///   all chunks of a track alike
    /// - `dynamics`: compressor state carried from the preceding chunk;
    ///   `None` primes the compressor from the chunk itself
    ///
    /// Parameters are clamped to `ParameterBounds::SAFE`; non-finite
    /// parameters fall back to the neutral set.
    pub fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        track_rms_db: Option<f32>,
        dynamics: Option<DynamicsState>,
    ) -> ChainOutput {
        let params = if params.is_finite() {
            params.clamped(&ParameterBounds::SAFE)
        } else {
            tracing::warn!("Non-finite processing parameters, using neutral chain");
            ProcessingParameters::neutral()
        };

        let mut ctx = ChainContext {
            source_rms_db: None,
            track_rms_db,
            dynamics,
            report: ChainReport::default(),
        };

        let mut current = input.clone();
        for stage in &self.stages {
            let (clean, silenced) = sanitize(current, stage.name());
            ctx.report.silenced_frames += silenced;
            if ctx.source_rms_db.is_none() {
                ctx.source_rms_db = Some(linear_to_db(clean.rms()));
            }
            current = stage.process(&clean, &params, &mut ctx);
        }

        let (buffer, silenced) = sanitize(current, "output");
        ctx.report.silenced_frames += silenced;

        ChainOutput {
            buffer,
            dynamics: ctx.dynamics.unwrap_or_default(),
            report: ctx.report,
        }
    }
}

impl Default for MasteringChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// Compressor stage
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl DspStage for Compressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        ctx: &mut ChainContext,
    ) -> AudioBuffer {
        let settings = CompressorSettings::from_parameters(params);
        let state = ctx
            .dynamics
            .unwrap_or_else(|| DynamicsState::primed(input, &settings));
        let (output, state) = compress(input, &settings, state);
        ctx.dynamics = Some(state);
        ctx.report.final_gain_reduction_db = state.gain_reduction_db;
        output
    }
}

impl DspStage for CriticalBandEq {
    fn name(&self) -> &'static str {
        "eq"
    }

    fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        _ctx: &mut ChainContext,
    ) -> AudioBuffer {
        self.apply(input, &params.eq_band_gains)
    }
}

impl DspStage for StereoWidth {
    fn name(&self) -> &'static str {
        "stereo_width"
    }

    fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        _ctx: &mut ChainContext,
    ) -> AudioBuffer {
        self.apply(input, params.stereo_width)
    }
}

impl DspStage for LookaheadLimiter {
    fn name(&self) -> &'static str {
        "limiter"
    }

    fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        _ctx: &mut ChainContext,
    ) -> AudioBuffer {
        self.apply(input, params.limiter_threshold_db)
    }
}

impl DspStage for LoudnessNormalizer {
    fn name(&self) -> &'static str {
        "normalizer"
    }

    fn process(
        &self,
        input: &AudioBuffer,
        params: &ProcessingParameters,
        ctx: &mut ChainContext,
    ) -> AudioBuffer {
        let (output, gain_db) = self.apply(input, params, ctx.source_rms_db, ctx.track_rms_db);
        ctx.report.normalization_gain_db = gain_db;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::{db_to_linear, AudioFormat, EQ_BAND_COUNT};
    use std::f32::consts::PI;

    fn tone(frames: usize, amplitude: f32) -> AudioBuffer {
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / 8_000.0;
            samples.push(amplitude * (2.0 * PI * 220.0 * t).sin());
            samples.push(amplitude * (2.0 * PI * 330.0 * t).sin());
        }
        AudioBuffer::new(samples, AudioFormat::float_stereo(8_000))
    }

    fn strong() -> ProcessingParameters {
        ProcessingParameters {
            compression_ratio: 4.0,
            compression_amount: 0.8,
            dynamics_intensity: 1.0,
            eq_band_gains: [3.0; EQ_BAND_COUNT],
            target_rms_db: -10.0,
            limiter_threshold_db: -1.0,
            stereo_width: 1.3,
            makeup_gain_db: 3.0,
            loudness_amount: 1.0,
        }
    }

    #[test]
    fn standard_order() {
        assert_eq!(
            MasteringChain::standard().stage_names(),
            vec!["eq", "compressor", "stereo_width", "normalizer", "limiter"]
        );
    }

    #[test]
    fn preserves_length_and_channels() {
        let input = tone(8_000, 0.5);
        let out = MasteringChain::standard().process(&input, &strong(), None, None);
        assert_eq!(out.buffer.frames(), input.frames());
        assert_eq!(out.buffer.channels(), input.channels());
        assert_eq!(out.buffer.sample_rate(), input.sample_rate());
    }

    #[test]
    fn output_respects_limiter_ceiling() {
        let input = tone(8_000, 0.99);
        let out = MasteringChain::standard().process(&input, &strong(), None, None);
        assert!(out.buffer.peak() <= db_to_linear(-1.0) + 1e-6);
    }

    #[test]
    fn input_is_not_modified() {
        let input = tone(2_000, 0.5);
        let copy = input.clone();
        let _ = MasteringChain::standard().process(&input, &strong(), None, None);
        assert_eq!(input, copy);
    }

    #[test]
    fn deterministic() {
        let input = tone(4_000, 0.7);
        let chain = MasteringChain::standard();
        let a = chain.process(&input, &strong(), Some(-14.0), None);
        let b = chain.process(&input, &strong(), Some(-14.0), None);
        assert_eq!(a.buffer, b.buffer);
        assert_eq!(a.dynamics, b.dynamics);
    }

    #[test]
    fn neutral_parameters_are_transparent_below_ceiling() {
        let input = tone(2_000, 0.5);
        let out = MasteringChain::standard().process(&input, &ProcessingParameters::neutral(), None, None);
        assert_eq!(out.buffer, input);
    }

    #[test]
    fn non_finite_input_becomes_silence() {
        let mut input = tone(1_000, 0.5);
        input.samples[10] = f32::NAN;
        input.samples[501] = f32::INFINITY;
        let out = MasteringChain::standard().process(&input, &strong(), None, None);
        assert!(out.buffer.samples.iter().all(|s| s.is_finite()));
        assert!(out.report.silenced_frames >= 2);
    }

    #[test]
    fn non_finite_parameters_use_neutral_chain() {
        let input = tone(1_000, 0.1);
        let mut params = strong();
        params.stereo_width = f32::NAN;
        let out = MasteringChain::standard().process(&input, &params, None, None);
        assert!(out.buffer.samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn boosted_output_respects_limiter_ceiling() {
        let input = tone(8_000, 0.3);
        let params = ProcessingParameters {
            makeup_gain_db: 9.0,
            ..strong()
        };
        let out = MasteringChain::standard().process(&input, &params, Some(-30.0), None);
        assert!(out.report.normalization_gain_db > 6.0);
        assert!(out.buffer.peak() <= db_to_linear(-1.0) + 1e-6);
    }

    #[test]
    fn transient_does_not_lower_chunk_level() {
        // steady quiet tone, one chunk with a single loud click
        let params = ProcessingParameters {
            target_rms_db: -14.0,
            limiter_threshold_db: -1.0,
            loudness_amount: 1.0,
            ..ProcessingParameters::neutral()
        };
        let plain = tone(16_000, 0.05);
        let mut clicked = plain.clone();
        clicked.samples[8_000] = 0.95;
        let track = linear_to_db(plain.rms());

        let chain = MasteringChain::standard();
        let a = chain.process(&plain, &params, Some(track), None);
        let b = chain.process(&clicked, &params, Some(track), None);
        assert!((a.report.normalization_gain_db - b.report.normalization_gain_db).abs() < 0.1);
        assert!(b.buffer.peak() <= db_to_linear(-1.0) + 1e-6);

        // away from the click both outputs are at the same level
        let quiet_a = a.buffer.slice_frames(0, 3_000).rms();
        let quiet_b = b.buffer.slice_frames(0, 3_000).rms();
        assert!((linear_to_db(quiet_a) - linear_to_db(quiet_b)).abs() < 0.1);
    }

    #[test]
    fn compression_state_is_reported() {
        let input = tone(8_000, 0.9);
        let out = MasteringChain::standard().process(&input, &strong(), None, None);
        assert!(out.dynamics.gain_reduction_db < 0.0);
        assert_eq!(out.report.final_gain_reduction_db, out.dynamics.gain_reduction_db);
    }
}
