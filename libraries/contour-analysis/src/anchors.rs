//! Preset anchor table
//!
//! Anchors are data, not behaviour: each row pairs a point in the
//! characteristic space with a full parameter set, and the interpolator blends
//! rows by distance. The table is built once and never changes.

use crate::spectrum::SpectrumPosition;
use contour_core::{ProcessingParameters, CRITICAL_BAND_FREQUENCIES, EQ_BAND_COUNT};
use std::sync::OnceLock;

/// Anchor used when the user has not picked a preset
pub const DEFAULT_PRESET: &str = "adaptive";

/// A named reference point
#[derive(Debug, Clone, PartialEq)]
pub struct PresetAnchor {
    /// Lowercase preset name
    pub name: &'static str,

    /// Where this anchor sits
    pub position: SpectrumPosition,

    /// Parameters at that point
    pub parameters: ProcessingParameters,
}

/// Broad EQ shape, expanded to the 24 critical bands
///
/// Gains are control points at 100 Hz, 1 kHz, 3.5 kHz and 10 kHz; bands in
/// between are interpolated on a log-frequency axis and bands outside take
/// the nearest control value.
#[derive(Debug, Clone, Copy)]
struct EqShape {
    low_db: f32,
    mid_db: f32,
    presence_db: f32,
    air_db: f32,
}

impl EqShape {
    const CONTROL_HZ: [f32; 4] = [100.0, 1000.0, 3500.0, 10_000.0];

    fn bands(&self) -> [f32; EQ_BAND_COUNT] {
        let gains = [self.low_db, self.mid_db, self.presence_db, self.air_db];
        let mut out = [0.0; EQ_BAND_COUNT];

        for (slot, &freq) in out.iter_mut().zip(CRITICAL_BAND_FREQUENCIES.iter()) {
            *slot = if freq <= Self::CONTROL_HZ[0] {
                gains[0]
            } else if freq >= Self::CONTROL_HZ[3] {
                gains[3]
            } else {
                let seg = Self::CONTROL_HZ
                    .windows(2)
                    .position(|w| freq >= w[0] && freq < w[1])
                    .unwrap_or(2);
                let (f0, f1) = (Self::CONTROL_HZ[seg], Self::CONTROL_HZ[seg + 1]);
                let t = (freq.log10() - f0.log10()) / (f1.log10() - f0.log10());
                gains[seg] + (gains[seg + 1] - gains[seg]) * t
            };
        }
        out
    }
}

#[allow(clippy::too_many_arguments)]
fn anchor(
    name: &'static str,
    position: [f32; 5],
    ratio: f32,
    amount: f32,
    intensity: f32,
    eq: EqShape,
    target_rms_db: f32,
    limiter_threshold_db: f32,
    stereo_width: f32,
    makeup_gain_db: f32,
) -> PresetAnchor {
    let [level, range, balance, energy, density] = position;
    PresetAnchor {
        name,
        position: SpectrumPosition::new(level, range, balance, energy, density),
        parameters: ProcessingParameters {
            compression_ratio: ratio,
            compression_amount: amount,
            dynamics_intensity: intensity,
            eq_band_gains: eq.bands(),
            target_rms_db,
            limiter_threshold_db,
            stereo_width,
            makeup_gain_db,
            loudness_amount: 1.0,
        },
    }
}

fn build_anchors() -> Vec<PresetAnchor> {
    vec![
        anchor(
            "gentle",
            [0.4, 0.7, 0.5, 0.3, 0.3],
            1.5,
            0.3,
            0.4,
            EqShape { low_db: 0.5, mid_db: 0.0, presence_db: 0.5, air_db: 1.0 },
            -16.0,
            -1.0,
            1.0,
            0.0,
        ),
        anchor(
            "warm",
            [0.5, 0.5, 0.25, 0.45, 0.45],
            2.0,
            0.45,
            0.5,
            EqShape { low_db: 2.5, mid_db: 0.5, presence_db: -1.0, air_db: -1.5 },
            -15.0,
            -1.0,
            1.05,
            0.5,
        ),
        anchor(
            "bright",
            [0.5, 0.5, 0.75, 0.5, 0.5],
            2.0,
            0.45,
            0.5,
            EqShape { low_db: -1.0, mid_db: 0.0, presence_db: 2.0, air_db: 3.0 },
            -15.0,
            -1.0,
            1.1,
            0.5,
        ),
        anchor(
            "punchy",
            [0.7, 0.3, 0.5, 0.85, 0.7],
            3.5,
            0.7,
            0.85,
            EqShape { low_db: 3.0, mid_db: -1.0, presence_db: 1.5, air_db: 1.0 },
            -11.0,
            -0.5,
            1.15,
            1.5,
        ),
        anchor(
            "live",
            [0.45, 0.8, 0.5, 0.6, 0.4],
            1.3,
            0.2,
            0.3,
            EqShape { low_db: 0.0, mid_db: 0.5, presence_db: 1.0, air_db: 1.5 },
            -17.0,
            -1.0,
            1.2,
            0.0,
        ),
        anchor(
            DEFAULT_PRESET,
            [0.5, 0.5, 0.5, 0.5, 0.5],
            2.5,
            0.5,
            0.6,
            EqShape { low_db: 1.0, mid_db: 0.0, presence_db: 1.0, air_db: 1.0 },
            -14.0,
            -1.0,
            1.1,
            1.0,
        ),
    ]
}

/// The built-in anchor table
pub fn anchor_table() -> &'static [PresetAnchor] {
    static ANCHORS: OnceLock<Vec<PresetAnchor>> = OnceLock::new();
    ANCHORS.get_or_init(build_anchors)
}

/// Look up an anchor by (case-insensitive) name
pub fn find_anchor<'a>(anchors: &'a [PresetAnchor], name: &str) -> Option<&'a PresetAnchor> {
    let name = name.trim();
    anchors.iter().find(|a| a.name.eq_ignore_ascii_case(name))
}

/// Names of the built-in presets
pub fn preset_names() -> Vec<&'static str> {
    anchor_table().iter().map(|a| a.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_core::ParameterBounds;

    #[test]
    fn table_has_six_named_anchors() {
        assert_eq!(
            preset_names(),
            vec!["gentle", "warm", "bright", "punchy", "live", "adaptive"]
        );
    }

    #[test]
    fn anchors_are_within_safe_bounds() {
        for anchor in anchor_table() {
            assert!(
                anchor.parameters.within(&ParameterBounds::SAFE),
                "{} out of bounds",
                anchor.name
            );
        }
    }

    #[test]
    fn anchor_positions_are_distinct() {
        let table = anchor_table();
        for (i, a) in table.iter().enumerate() {
            for b in &table[i + 1..] {
                assert!(a.position.distance(&b.position) > 0.1);
            }
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find_anchor(anchor_table(), " Punchy ").unwrap().name, "punchy");
        assert!(find_anchor(anchor_table(), "loudness-war").is_none());
    }

    #[test]
    fn eq_shape_hits_control_points() {
        let bands = EqShape { low_db: 2.0, mid_db: 0.0, presence_db: -1.0, air_db: 3.0 }.bands();
        assert_eq!(bands[0], 2.0); // 50 Hz
        assert!((bands[8] - 0.0).abs() < 1e-6); // 1 kHz
        assert_eq!(bands[EQ_BAND_COUNT - 1], 3.0); // 13.5 kHz
    }
}
