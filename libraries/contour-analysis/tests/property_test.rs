//! Property tests for the analysis pipeline
//!
//! - Spectrum positions stay in [0, 1] for any profile, including non-finite input
//! - input_level is monotonic in RMS
//! - Interpolation is deterministic and always lands inside the safe bounds
//! - Extreme real signals (silence, clipping, pure tone) map to bounded positions

use contour_analysis::{
    anchor_table, interpolate, map, preset_names, ContentAnalyzer, ContentProfile, EnergyLevel,
    SpectrumPosition,
};
use contour_core::{AudioBuffer, AudioFormat, ParameterBounds};
use proptest::prelude::*;

fn any_level() -> impl Strategy<Value = f32> {
    prop_oneof![
        8 => -200.0f32..50.0,
        1 => Just(f32::NAN),
        1 => Just(f32::INFINITY),
        1 => Just(f32::NEG_INFINITY),
    ]
}

fn any_energy() -> impl Strategy<Value = EnergyLevel> {
    prop_oneof![
        Just(EnergyLevel::Low),
        Just(EnergyLevel::Medium),
        Just(EnergyLevel::High),
    ]
}

prop_compose! {
    fn any_profile()(
        rms_db in any_level(),
        peak_db in any_level(),
        crest_db in any_level(),
        centroid in prop_oneof![0.0f32..30_000.0, Just(f32::NAN), Just(-1.0f32)],
        rolloff in prop_oneof![0.0f32..30_000.0, Just(f32::INFINITY)],
        energy_level in any_energy(),
        complexity in any_level(),
        onsets in any_level(),
    ) -> ContentProfile {
        ContentProfile {
            rms_db,
            peak_db,
            crest_db,
            spectral_centroid_hz: centroid,
            spectral_rolloff_hz: rolloff,
            energy_level,
            dynamic_complexity: complexity,
            onset_density: onsets,
            ..ContentProfile::conservative()
        }
    }
}

fn in_unit(position: &SpectrumPosition) -> bool {
    position
        .as_array()
        .iter()
        .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
}

proptest! {
    #[test]
    fn positions_are_bounded(profile in any_profile()) {
        let position = map(&profile);
        prop_assert!(in_unit(&position), "{:?} -> {:?}", profile, position);
    }

    #[test]
    fn input_level_is_monotonic_in_rms(a in -80.0f32..10.0, b in -80.0f32..10.0) {
        let (quiet, loud) = if a <= b { (a, b) } else { (b, a) };
        let mut p = ContentProfile::conservative();
        p.rms_db = quiet;
        let low = map(&p).input_level;
        p.rms_db = loud;
        let high = map(&p).input_level;
        prop_assert!(low <= high);
    }

    #[test]
    fn interpolation_is_deterministic(
        coords in prop::array::uniform5(0.0f32..=1.0),
        hint in prop::option::of(prop::sample::select(preset_names())),
    ) {
        let position = SpectrumPosition::new(coords[0], coords[1], coords[2], coords[3], coords[4]);
        let first = interpolate(&position, anchor_table(), hint).unwrap();
        let second = interpolate(&position, anchor_table(), hint).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn interpolation_stays_within_safe_bounds(
        coords in prop::array::uniform5(0.0f32..=1.0),
        hint in prop::option::of(prop::sample::select(preset_names())),
    ) {
        let position = SpectrumPosition::new(coords[0], coords[1], coords[2], coords[3], coords[4]);
        let params = interpolate(&position, anchor_table(), hint).unwrap();
        prop_assert!(params.within(&ParameterBounds::SAFE), "{:?}", params);
    }
}

fn analyze(samples: Vec<f32>) -> SpectrumPosition {
    let buffer = AudioBuffer::new(samples, AudioFormat::float_stereo(44_100));
    map(&ContentAnalyzer::new().analyze_or_conservative(&buffer))
}

#[test]
fn silence_maps_inside_the_space() {
    let position = analyze(vec![0.0; 44_100 * 2 * 2]);
    assert!(in_unit(&position));
    assert_eq!(position.input_level, 0.0);
}

#[test]
fn full_scale_square_maps_inside_the_space() {
    let samples: Vec<f32> = (0..44_100 * 2)
        .flat_map(|i| {
            let v = if (i / 50) % 2 == 0 { 1.0 } else { -1.0 };
            [v, v]
        })
        .collect();
    let position = analyze(samples);
    assert!(in_unit(&position));
    assert_eq!(position.input_level, 1.0);
    assert!(position.dynamic_range < 0.1);
}

#[test]
fn pure_tone_maps_inside_the_space() {
    let samples: Vec<f32> = (0..44_100 * 2)
        .flat_map(|i| {
            let v = 0.25 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin();
            [v, v]
        })
        .collect();
    let position = analyze(samples);
    assert!(in_unit(&position));
    // a 440 Hz tone is dark against the 500 Hz..5 kHz centroid range
    assert!(position.spectral_balance < 0.3);
}
