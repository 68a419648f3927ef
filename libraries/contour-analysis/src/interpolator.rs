//! Parameter interpolator
//!
//! Inverse-distance blend of every anchor's parameters, optionally biased
//! toward a hinted anchor, followed by the content rules and a final clamp to
//! `ParameterBounds::SAFE`. There is no hidden state: the same inputs always
//! give bit-identical outputs, which the chunk cache relies on.

use crate::anchors::{find_anchor, PresetAnchor};
use crate::error::{AnalysisError, Result};
use crate::rules::apply_rules;
use crate::spectrum::SpectrumPosition;
use contour_core::{ParameterBounds, ProcessingParameters, EQ_BAND_COUNT};

/// Added to every distance so an anchor at distance zero gets a finite weight
pub const DISTANCE_EPSILON: f64 = 1e-3;

/// Weight multiplier for the hinted anchor
pub const HINT_BOOST: f64 = 2.0;

/// Interpolation result with the intermediate values, for logging and the CLI
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    /// Final parameters
    pub parameters: ProcessingParameters,

    /// Normalized weight of each anchor, in table order
    pub weights: Vec<(&'static str, f64)>,

    /// Content rules that fired, in application order
    pub applied_rules: Vec<&'static str>,
}

/// Interpolate parameters for `position`
///
/// # Errors
/// `EmptyAnchorTable`, `UnknownPreset` for a hint that names no anchor, and
/// `NonFinitePosition`. All of these are programming errors for the caller.
pub fn interpolate(
    position: &SpectrumPosition,
    anchors: &[PresetAnchor],
    user_hint: Option<&str>,
) -> Result<ProcessingParameters> {
    interpolate_detailed(position, anchors, user_hint).map(|i| i.parameters)
}

/// Interpolate and keep the weights and fired rules
pub fn interpolate_detailed(
    position: &SpectrumPosition,
    anchors: &[PresetAnchor],
    user_hint: Option<&str>,
) -> Result<Interpolation> {
    if anchors.is_empty() {
        return Err(AnalysisError::EmptyAnchorTable);
    }
    if !position.is_finite() {
        return Err(AnalysisError::NonFinitePosition);
    }

    let hinted = match user_hint {
        Some(name) => Some(
            find_anchor(anchors, name)
                .ok_or_else(|| AnalysisError::UnknownPreset(name.to_string()))?
                .name,
        ),
        None => None,
    };

    let raw: Vec<f64> = anchors
        .iter()
        .map(|anchor| {
            let distance = f64::from(position.distance(&anchor.position));
            let weight = 1.0 / (distance + DISTANCE_EPSILON);
            if Some(anchor.name) == hinted {
                weight * HINT_BOOST
            } else {
                weight
            }
        })
        .collect();
    let total: f64 = raw.iter().sum();
    let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();

    let mut parameters = blend(anchors, &weights);
    let applied_rules = apply_rules(position, &mut parameters);
    let parameters = parameters.clamped(&ParameterBounds::SAFE);

    Ok(Interpolation {
        parameters,
        weights: anchors
            .iter()
            .zip(weights.iter())
            .map(|(a, &w)| (a.name, w))
            .collect(),
        applied_rules,
    })
}

/// Weighted sum of every numeric field
fn blend(anchors: &[PresetAnchor], weights: &[f64]) -> ProcessingParameters {
    let sum = |field: fn(&ProcessingParameters) -> f32| -> f32 {
        anchors
            .iter()
            .zip(weights.iter())
            .map(|(a, &w)| f64::from(field(&a.parameters)) * w)
            .sum::<f64>() as f32
    };

    let mut eq_band_gains = [0.0_f32; EQ_BAND_COUNT];
    for (band, gain) in eq_band_gains.iter_mut().enumerate() {
        *gain = anchors
            .iter()
            .zip(weights.iter())
            .map(|(a, &w)| f64::from(a.parameters.eq_band_gains[band]) * w)
            .sum::<f64>() as f32;
    }

    ProcessingParameters {
        compression_ratio: sum(|p| p.compression_ratio),
        compression_amount: sum(|p| p.compression_amount),
        dynamics_intensity: sum(|p| p.dynamics_intensity),
        eq_band_gains,
        target_rms_db: sum(|p| p.target_rms_db),
        limiter_threshold_db: sum(|p| p.limiter_threshold_db),
        stereo_width: sum(|p| p.stereo_width),
        makeup_gain_db: sum(|p| p.makeup_gain_db),
        loudness_amount: sum(|p| p.loudness_amount),
    }
}
