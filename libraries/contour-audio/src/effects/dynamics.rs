/// Dynamic range compression with a carried envelope
///
/// The compressor itself is a pure function of (input, settings, state). The
/// `DynamicsState` it returns is what the next chunk should start from, so a
/// chunk processed right after its predecessor continues the predecessor's
/// gain curve instead of starting cold.
use contour_core::{linear_to_db, AudioBuffer, ProcessingParameters};

/// Noise floor of the level detector (dB)
const NOISE_FLOOR_DB: f32 = -120.0;

/// Peak hold release of the level detector (ms)
const PEAK_RELEASE_MS: f32 = 50.0;

/// Window used to estimate a starting envelope when no state is carried (ms)
const PRIME_WINDOW_MS: f32 = 10.0;

/// Compressor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Threshold in dB
    pub threshold_db: f32,

    /// Ratio (1.0 = no compression)
    pub ratio: f32,

    /// Attack time in milliseconds
    pub attack_ms: f32,

    /// Release time in milliseconds
    pub release_ms: f32,

    /// Knee width in dB (0 = hard knee)
    pub knee_db: f32,
}

impl CompressorSettings {
    /// Derive settings from processing parameters
    ///
    /// - Threshold runs from -3 dB (amount 0) down to -24 dB (amount 1)
    /// - The effective ratio is the parameter ratio scaled by
    ///   `dynamics_intensity`: intensity 0 means 1:1
    /// - Higher intensity also means faster attack and release
    pub fn from_parameters(params: &ProcessingParameters) -> Self {
        let amount = params.compression_amount.clamp(0.0, 1.0);
        let intensity = params.dynamics_intensity.clamp(0.0, 1.0);
        let ratio = params.compression_ratio.max(1.0);

        Self {
            threshold_db: -3.0 - 21.0 * amount,
            ratio: 1.0 + (ratio - 1.0) * intensity,
            attack_ms: 25.0 - 20.0 * intensity,
            release_ms: 250.0 - 170.0 * intensity,
            knee_db: 6.0,
        }
    }

    /// True when these settings cannot change the signal
    pub fn is_bypass(&self) -> bool {
        self.ratio <= 1.0 + f32::EPSILON
    }

    /// Static curve: output level for an input level (both dB)
    #[inline]
    pub fn output_level_db(&self, input_db: f32) -> f32 {
        let threshold = self.threshold_db;
        let ratio = self.ratio;
        let knee = self.knee_db;

        if knee <= 0.0 {
            if input_db <= threshold {
                input_db
            } else {
                threshold + (input_db - threshold) / ratio
            }
        } else {
            let knee_start = threshold - knee / 2.0;
            let knee_end = threshold + knee / 2.0;

            if input_db <= knee_start {
                input_db
            } else if input_db >= knee_end {
                threshold + (input_db - threshold) / ratio
            } else {
                // Quadratic transition inside the knee
                let x = input_db - knee_start;
                let slope_change = (1.0 - 1.0 / ratio) / (2.0 * knee);
                input_db - slope_change * x * x
            }
        }
    }

    /// Static gain reduction for an input level (dB, <= 0)
    #[inline]
    pub fn gain_reduction_db(&self, input_db: f32) -> f32 {
        self.output_level_db(input_db) - input_db
    }
}

/// State carried across chunk boundaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsState {
    /// Peak detector level (dB)
    pub envelope_db: f32,

    /// Smoothed gain reduction (dB, <= 0)
    pub gain_reduction_db: f32,
}

impl DynamicsState {
    /// Detector at rest: silence, no gain reduction
    pub const fn idle() -> Self {
        Self {
            envelope_db: NOISE_FLOOR_DB,
            gain_reduction_db: 0.0,
        }
    }

    /// Estimate a starting state from the opening of `input`
    ///
    /// Used when a chunk is processed without its predecessor's state (first
    /// chunk, seek, or out-of-order work). The detector is seeded with the
    /// peak of the first few milliseconds and the gain reduction with the
    /// static curve at that level, so the chunk does not open with an
    /// attack transient.
    pub fn primed(input: &AudioBuffer, settings: &CompressorSettings) -> Self {
        let window = ((input.sample_rate() as f32 * PRIME_WINDOW_MS / 1000.0) as usize).max(1);
        let peak = input.slice_frames(0, window).peak();
        let envelope_db = linear_to_db(peak);

        Self {
            envelope_db,
            gain_reduction_db: settings.gain_reduction_db(envelope_db).min(0.0),
        }
    }
}

impl Default for DynamicsState {
    fn default() -> Self {
        Self::idle()
    }
}

/// One-pole attack/release smoother
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeFollower {
    attack_coeff: f32,
    release_coeff: f32,
}

impl EnvelopeFollower {
    /// Build coefficients for the given times at `sample_rate`
    ///
    /// A time constant reaches 63% of a step after the configured time.
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let coeff = |ms: f32| (-1.0 / (ms.max(0.01) * sr / 1000.0)).exp();
        Self {
            attack_coeff: coeff(attack_ms),
            release_coeff: coeff(release_ms),
        }
    }

    /// Move `current` toward `target`
    ///
    /// Falling gain (more reduction) uses the attack coefficient, rising gain
    /// the release coefficient.
    #[inline]
    pub fn step(&self, current: f32, target: f32) -> f32 {
        let coeff = if target < current {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        coeff * current + (1.0 - coeff) * target
    }
}

/// Compress `input` starting from `state`
///
/// Detection is linked across channels (the loudest channel drives the gain)
/// so the stereo image does not shift. Returns the compressed buffer and the
/// state at the end of the buffer.
pub fn compress(
    input: &AudioBuffer,
    settings: &CompressorSettings,
    state: DynamicsState,
) -> (AudioBuffer, DynamicsState) {
    let channels = input.channels();
    if channels == 0 || input.is_empty() || settings.is_bypass() {
        return (input.clone(), state);
    }

    let sample_rate = input.sample_rate();
    let smoother = EnvelopeFollower::new(settings.attack_ms, settings.release_ms, sample_rate);
    let peak_release = (-1.0 / (PEAK_RELEASE_MS * sample_rate.max(1) as f32 / 1000.0)).exp();

    let mut envelope_db = state.envelope_db;
    let mut gain_reduction_db = state.gain_reduction_db;
    let mut samples = input.samples.clone();

    for frame in samples.chunks_exact_mut(channels) {
        let frame_peak = frame.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        let input_db = if frame_peak > 1e-10 {
            20.0 * frame_peak.log10()
        } else {
            -200.0
        };

        // Instant attack, slow decay toward the floor
        if input_db > envelope_db {
            envelope_db = input_db;
        } else {
            envelope_db = peak_release * (envelope_db - NOISE_FLOOR_DB) + NOISE_FLOOR_DB;
        }

        let target = settings.gain_reduction_db(envelope_db);
        gain_reduction_db = smoother.step(gain_reduction_db, target);

        let gain = 10.0_f32.powf(gain_reduction_db / 20.0);
        for sample in frame.iter_mut() {
            *sample *= gain;
        }
    }

    (
        input.with_samples(samples),
        DynamicsState {
            envelope_db,
            gain_reduction_db,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::AudioFormat;
    use std::f32::consts::PI;

    fn sine(frames: usize, amplitude: f32) -> AudioBuffer {
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = amplitude * (2.0 * PI * 440.0 * i as f32 / 44_100.0).sin();
            samples.push(s);
            samples.push(s);
        }
        AudioBuffer::new(samples, AudioFormat::float_stereo(44_100))
    }

    fn heavy() -> CompressorSettings {
        CompressorSettings {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 50.0,
            knee_db: 0.0,
        }
    }

    #[test]
    fn hard_knee_curve() {
        let s = heavy();
        assert_eq!(s.output_level_db(-30.0), -30.0);
        assert!((s.output_level_db(-10.0) - (-17.5)).abs() < 1e-4);
    }

    #[test]
    fn soft_knee_is_continuous() {
        let s = CompressorSettings {
            knee_db: 6.0,
            ..heavy()
        };
        let below = s.output_level_db(-23.0001);
        let at = s.output_level_db(-23.0);
        let above_end = s.output_level_db(-16.9999);
        let end = s.output_level_db(-17.0);
        assert!((below - at).abs() < 1e-3);
        assert!((above_end - end).abs() < 1e-3);
    }

    #[test]
    fn parameters_map_to_settings() {
        let mut p = ProcessingParameters::neutral();
        let s = CompressorSettings::from_parameters(&p);
        assert!(s.is_bypass());
        assert_eq!(s.threshold_db, -3.0);

        p.compression_ratio = 3.0;
        p.compression_amount = 1.0;
        p.dynamics_intensity = 0.5;
        let s = CompressorSettings::from_parameters(&p);
        assert_eq!(s.threshold_db, -24.0);
        assert!((s.ratio - 2.0).abs() < 1e-6);
    }

    #[test]
    fn loud_signal_is_reduced() {
        let input = sine(44_100, 0.9);
        let (out, state) = compress(&input, &heavy(), DynamicsState::idle());
        assert!(out.rms() < input.rms() * 0.7);
        assert!(state.gain_reduction_db < -5.0);
    }

    #[test]
    fn quiet_signal_is_untouched() {
        let input = sine(4410, 0.01);
        let (out, _) = compress(&input, &heavy(), DynamicsState::idle());
        for (a, b) in input.samples.iter().zip(out.samples.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn bypass_returns_input() {
        let input = sine(1000, 0.9);
        let settings = CompressorSettings {
            ratio: 1.0,
            ..heavy()
        };
        let (out, state) = compress(&input, &settings, DynamicsState::idle());
        assert_eq!(out, input);
        assert_eq!(state, DynamicsState::idle());
    }

    #[test]
    fn carried_state_matches_continuous_processing() {
        let input = sine(8820, 0.9);
        let (whole, _) = compress(&input, &heavy(), DynamicsState::idle());

        let first = input.slice_frames(0, 4410);
        let second = input.slice_frames(4410, 8820);
        let (a, state) = compress(&first, &heavy(), DynamicsState::idle());
        let (b, _) = compress(&second, &heavy(), state);

        let mut joined = a.samples;
        joined.extend_from_slice(&b.samples);
        for (x, y) in whole.samples.iter().zip(joined.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn primed_state_avoids_cold_start() {
        let input = sine(4410, 0.9);
        let settings = heavy();
        let primed = DynamicsState::primed(&input, &settings);
        assert!(primed.gain_reduction_db < 0.0);

        let (cold, _) = compress(&input, &settings, DynamicsState::idle());
        let (warm, _) = compress(&input, &settings, primed);
        let head = |b: &AudioBuffer| b.slice_frames(0, 200).peak();
        assert!(head(&warm) < head(&cold));
    }
}
