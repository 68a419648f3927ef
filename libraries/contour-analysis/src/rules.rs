//! Content rules
//!
//! Small post-hoc adjustments applied to the blended parameters. Each rule is
//! a predicate on the spectrum position plus an adjustment, and the rules run
//! in the order of `CONTENT_RULES`. The interpolator clamps to the safe bounds
//! after the last rule.

use crate::spectrum::SpectrumPosition;
use contour_core::{ProcessingParameters, CRITICAL_BAND_FREQUENCIES};

/// One content rule
#[derive(Clone, Copy)]
pub struct ContentRule {
    /// Rule name (for logging)
    pub name: &'static str,

    /// Does the rule apply at this position?
    pub applies: fn(&SpectrumPosition) -> bool,

    /// Adjust the parameters
    pub apply: fn(&SpectrumPosition, &mut ProcessingParameters),
}

impl std::fmt::Debug for ContentRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentRule").field("name", &self.name).finish()
    }
}

/// Rules in application order
pub const CONTENT_RULES: [ContentRule; 7] = [
    ContentRule {
        name: "high_dynamic_range",
        applies: |p| p.dynamic_range > 0.65,
        apply: |_, params| {
            params.compression_amount *= 0.7;
            params.compression_ratio -= (params.compression_ratio - 1.0) * 0.3;
        },
    },
    ContentRule {
        name: "already_compressed",
        applies: |p| p.dynamic_range < 0.25,
        apply: |_, params| params.compression_amount *= 0.5,
    },
    ContentRule {
        name: "quiet_input",
        applies: |p| p.input_level < 0.25,
        apply: |p, params| params.makeup_gain_db += 6.0 * (0.25 - p.input_level) / 0.25,
    },
    ContentRule {
        name: "hot_input",
        applies: |p| p.input_level > 0.85,
        apply: |p, params| params.makeup_gain_db -= 3.0 * (p.input_level - 0.85) / 0.15,
    },
    ContentRule {
        name: "dark_spectrum",
        applies: |p| p.spectral_balance < 0.3,
        apply: |p, params| {
            let lift = 3.0 * (0.3 - p.spectral_balance) / 0.3;
            shift_bands_from(params, 2000.0, lift);
        },
    },
    ContentRule {
        name: "bright_spectrum",
        applies: |p| p.spectral_balance > 0.7,
        apply: |p, params| {
            let cut = 3.0 * (p.spectral_balance - 0.7) / 0.3;
            shift_bands_from(params, 4000.0, -cut);
        },
    },
    ContentRule {
        name: "dense_mix",
        applies: |p| p.density > 0.75,
        apply: |_, params| params.stereo_width -= (params.stereo_width - 1.0) * 0.2,
    },
];

fn shift_bands_from(params: &mut ProcessingParameters, from_hz: f32, delta_db: f32) {
    for (gain, &freq) in params
        .eq_band_gains
        .iter_mut()
        .zip(CRITICAL_BAND_FREQUENCIES.iter())
    {
        if freq >= from_hz {
            *gain += delta_db;
        }
    }
}

/// Apply every matching rule in order; returns the names of the rules that fired
pub fn apply_rules(
    position: &SpectrumPosition,
    params: &mut ProcessingParameters,
) -> Vec<&'static str> {
    let mut fired = Vec::new();
    for rule in &CONTENT_RULES {
        if (rule.applies)(position) {
            (rule.apply)(position, params);
            fired.push(rule.name);
        }
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::EQ_BAND_COUNT;

    fn base() -> ProcessingParameters {
        ProcessingParameters {
            compression_ratio: 3.0,
            compression_amount: 0.6,
            dynamics_intensity: 0.5,
            eq_band_gains: [0.0; EQ_BAND_COUNT],
            target_rms_db: -14.0,
            limiter_threshold_db: -1.0,
            stereo_width: 1.5,
            makeup_gain_db: 0.0,
            loudness_amount: 1.0,
        }
    }

    #[test]
    fn centre_fires_nothing() {
        let mut params = base();
        assert!(apply_rules(&SpectrumPosition::centre(), &mut params).is_empty());
        assert_eq!(params, base());
    }

    #[test]
    fn dynamic_material_is_compressed_less() {
        let mut params = base();
        let pos = SpectrumPosition::new(0.5, 0.9, 0.5, 0.5, 0.5);
        assert_eq!(apply_rules(&pos, &mut params), vec!["high_dynamic_range"]);
        assert!((params.compression_amount - 0.42).abs() < 1e-6);
        assert!((params.compression_ratio - 2.4).abs() < 1e-6);
    }

    #[test]
    fn quiet_input_gets_makeup_in_proportion() {
        let mut params = base();
        let pos = SpectrumPosition::new(0.0, 0.5, 0.5, 0.5, 0.5);
        apply_rules(&pos, &mut params);
        assert!((params.makeup_gain_db - 6.0).abs() < 1e-6);

        let mut params = base();
        let pos = SpectrumPosition::new(0.125, 0.5, 0.5, 0.5, 0.5);
        apply_rules(&pos, &mut params);
        assert!((params.makeup_gain_db - 3.0).abs() < 1e-6);
    }

    #[test]
    fn hot_input_gets_trimmed() {
        let mut params = base();
        let pos = SpectrumPosition::new(1.0, 0.5, 0.5, 0.5, 0.5);
        apply_rules(&pos, &mut params);
        assert!((params.makeup_gain_db + 3.0).abs() < 1e-5);
    }

    #[test]
    fn dark_spectrum_lifts_upper_bands_only() {
        let mut params = base();
        let pos = SpectrumPosition::new(0.5, 0.5, 0.0, 0.5, 0.5);
        apply_rules(&pos, &mut params);
        for (gain, &freq) in params.eq_band_gains.iter().zip(CRITICAL_BAND_FREQUENCIES.iter()) {
            if freq >= 2000.0 {
                assert!((gain - 3.0).abs() < 1e-6);
            } else {
                assert_eq!(*gain, 0.0);
            }
        }
    }

    #[test]
    fn bright_spectrum_cuts_top_bands() {
        let mut params = base();
        let pos = SpectrumPosition::new(0.5, 0.5, 1.0, 0.5, 0.5);
        apply_rules(&pos, &mut params);
        assert!((params.eq_band_gains[EQ_BAND_COUNT - 1] + 3.0).abs() < 1e-5);
        assert_eq!(params.eq_band_gains[0], 0.0);
    }

    #[test]
    fn dense_mix_narrows_toward_unity() {
        let mut params = base();
        let pos = SpectrumPosition::new(0.5, 0.5, 0.5, 0.5, 0.9);
        apply_rules(&pos, &mut params);
        assert!((params.stereo_width - 1.4).abs() < 1e-6);
    }

    #[test]
    fn rules_run_in_documented_order() {
        let names: Vec<_> = CONTENT_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "high_dynamic_range",
                "already_compressed",
                "quiet_input",
                "hot_input",
                "dark_spectrum",
                "bright_spectrum",
                "dense_mix"
            ]
        );
    }
}
