/// ID types for Contour entities
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Preset (anchor) name as chosen by the user
///
/// Names are normalized to lowercase so "Punchy" and "punchy" address the same
/// anchor and the same cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetName(String);

impl PresetName {
    /// Create a preset name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_name_is_normalized() {
        assert_eq!(PresetName::new(" Punchy "), PresetName::new("punchy"));
        assert_eq!(PresetName::new("LIVE").as_str(), "live");
    }

    #[test]
    fn track_id_display() {
        assert_eq!(TrackId::new("abc").to_string(), "abc");
    }
}
