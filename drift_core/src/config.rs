//! Coordinator configuration.
//!
//! Balance constants live here rather than at their points of use so the
//! coordinator owns a single source of truth. Every field has a default;
//! a JSON file only needs to name the values it overrides.

use crate::error::DriftError;
use crate::glyphs::BASE_GLYPHS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a drift coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Root node that fork and collapse act on when no id is given
    pub node_id: String,

    /// Zones seeded into the entropy field
    pub zones: Vec<String>,

    /// Symbols seeded into the entropy field and drawn by fork/collapse/scan
    pub glyphs: Vec<String>,

    /// Starting time-salt balance of a fresh simulation
    pub initial_time_salt: u64,

    /// Starting identity-fragment balance of a fresh simulation
    pub initial_fragments: u64,

    /// Per-field corruption probability of the fracture engine
    pub fracture_probability: f64,

    /// Maximum log entries turned into fractured echoes by a wipe
    pub wipe_echo_sample: usize,

    /// Glyphs sampled into a fork's glyph state
    pub fork_glyph_sample: usize,

    /// Sentience probability above which a fork spawns a sentient log
    pub sentience_threshold: f64,

    /// Drift map width (columns)
    pub drift_map_width: usize,

    /// Drift map height (rows)
    pub drift_map_height: usize,

    /// Entropy pulse period in milliseconds (default: 5000)
    pub pulse_period_ms: u64,

    /// Alchemy mastery ceiling
    pub mastery_ceiling: f64,

    /// Transmutation history length that triggers trimming
    pub history_capacity: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            node_id: "Xi-Void-404".to_string(),
            zones: [
                "void_nexus",
                "entropy_gardens",
                "crystal_sanctum",
                "temporal_streams",
                "energy_maelstrom",
            ]
            .iter()
            .map(|z| z.to_string())
            .collect(),
            glyphs: BASE_GLYPHS.iter().map(|g| g.to_string()).collect(),
            initial_time_salt: 100,
            initial_fragments: 50,
            fracture_probability: 0.3,
            wipe_echo_sample: 3,
            fork_glyph_sample: 3,
            sentience_threshold: 0.2,
            drift_map_width: 5,
            drift_map_height: 5,
            pulse_period_ms: 5000,
            mastery_ceiling: 10.0,
            history_capacity: 1000,
        }
    }
}

impl DriftConfig {
    /// Loads a configuration override from a JSON file and validates it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DriftError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DriftError::config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| DriftError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Pulse period as a `Duration`.
    pub fn pulse_period(&self) -> Duration {
        Duration::from_millis(self.pulse_period_ms)
    }

    /// Checks every value against its admissible range.
    pub fn validate(&self) -> Result<(), DriftError> {
        if self.glyphs.is_empty() {
            return Err(DriftError::config("glyphs must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.fracture_probability) {
            return Err(DriftError::config("fracture_probability must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.sentience_threshold) {
            return Err(DriftError::config("sentience_threshold must be in [0, 1]"));
        }
        if self.drift_map_width == 0 || self.drift_map_height == 0 {
            return Err(DriftError::config("drift map dimensions must be non-zero"));
        }
        if self.pulse_period_ms == 0 {
            return Err(DriftError::config("pulse_period_ms must be non-zero"));
        }
        if self.mastery_ceiling.is_nan() || self.mastery_ceiling < 0.0 {
            return Err(DriftError::config("mastery_ceiling must be non-negative"));
        }
        if self.history_capacity < 2 {
            return Err(DriftError::config("history_capacity must be at least 2"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DriftConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.glyphs.len(), 5);
        assert_eq!(config.zones.len(), 5);
        assert_eq!(config.pulse_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_override() {
        let config: DriftConfig =
            serde_json::from_str(r#"{ "fracture_probability": 1.0, "node_id": "Psi-1" }"#).unwrap();
        assert_eq!(config.fracture_probability, 1.0);
        assert_eq!(config.node_id, "Psi-1");
        assert_eq!(config.initial_time_salt, 100);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let config = DriftConfig {
            fracture_probability: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DriftError::InvalidConfig(_))));

        let config = DriftConfig {
            glyphs: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
