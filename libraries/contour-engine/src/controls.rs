//! Transport controls
//!
//! The settings a listener changes while playing: enhancement on/off, preset
//! and intensity. Each change names the cache entries it makes obsolete;
//! the engine applies the invalidation.

use crate::cache::Invalidation;
use crate::error::{EngineError, Result};
use contour_analysis::{anchor_table, find_anchor};
use contour_core::{PresetName, TrackId};
use serde::Serialize;

/// Current transport settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub enabled: bool,
    pub preset: PresetName,
    pub intensity: f32,
    /// Track most recently streamed
    pub current_track: Option<TrackId>,
}

impl ControlState {
    pub fn new(preset: PresetName, intensity: f32) -> Self {
        Self {
            enabled: true,
            preset,
            intensity,
            current_track: None,
        }
    }

    /// Toggle enhancement; any change drops every cached chunk
    pub fn set_enabled(&mut self, enabled: bool) -> Option<Invalidation> {
        if self.enabled == enabled {
            return None;
        }
        self.enabled = enabled;
        Some(Invalidation::All)
    }

    /// Switch preset; the old preset's chunks for the current track are dropped
    pub fn set_preset(&mut self, name: &str) -> Result<Option<Invalidation>> {
        let preset = validate_preset(name)?;
        if preset == self.preset {
            return Ok(None);
        }
        let old = std::mem::replace(&mut self.preset, preset);
        Ok(self
            .current_track
            .clone()
            .map(|track| Invalidation::TrackPreset(track, old)))
    }

    /// Change intensity; the old intensity's chunks for the current track are
    /// dropped
    pub fn set_intensity(&mut self, intensity: f32) -> Result<Option<Invalidation>> {
        let intensity = validate_intensity(intensity)?;
        if crate::cache::quantize_intensity(intensity) == crate::cache::quantize_intensity(self.intensity) {
            self.intensity = intensity;
            return Ok(None);
        }
        let old = std::mem::replace(&mut self.intensity, intensity);
        Ok(self
            .current_track
            .clone()
            .map(|track| Invalidation::TrackIntensity(track, old)))
    }
}

/// Normalize a preset name and check it names an anchor
pub fn validate_preset(name: &str) -> Result<PresetName> {
    let preset = PresetName::new(name);
    if find_anchor(anchor_table(), preset.as_str()).is_none() {
        return Err(EngineError::UnknownPreset(name.to_string()));
    }
    Ok(preset)
}

/// Intensity must be finite and in [0, 1]
pub fn validate_intensity(intensity: f32) -> Result<f32> {
    if intensity.is_finite() && (0.0..=1.0).contains(&intensity) {
        Ok(intensity)
    } else {
        Err(EngineError::InvalidIntensity(intensity))
    }
}
