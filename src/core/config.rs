//! Scene configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::export::ExportConfig;

/// Errors that can occur while loading configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// IO error
    IoError(String),
    /// RON parse error
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::ParseError(e) => write!(f, "Config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Scene runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Public asset directory name, stripped from asset references
    pub asset_root: String,
    /// Gravity vector
    pub gravity: [f32; 3],
    /// Simulation step in seconds
    pub fixed_timestep: f32,
    /// Upper bound on simulation steps in one tick
    pub max_steps_per_tick: u32,
    /// Export settings
    pub export: ExportConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_root: String::from("public"),
            gravity: [0.0, -9.81, 0.0],
            fixed_timestep: 1.0 / 60.0,
            max_steps_per_tick: 5,
            export: ExportConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Set the asset directory
    #[must_use]
    pub fn with_asset_root(mut self, asset_root: impl Into<String>) -> Self {
        self.asset_root = asset_root.into();
        self
    }

    /// Set gravity
    #[must_use]
    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the simulation step
    #[must_use]
    pub fn with_fixed_timestep(mut self, seconds: f32) -> Self {
        self.fixed_timestep = seconds;
        self
    }

    /// Set the step cap per tick
    #[must_use]
    pub fn with_max_steps_per_tick(mut self, steps: u32) -> Self {
        self.max_steps_per_tick = steps;
        self
    }

    /// Set export settings
    #[must_use]
    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    /// Parse a RON document; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        ron::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Serialize to pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SceneConfig::default();
        assert_eq!(config.asset_root, "public");
        assert_eq!(config.gravity, [0.0, -9.81, 0.0]);
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < f32::EPSILON);
        assert!(!config.export.include_hidden);
    }

    #[test]
    fn test_partial_ron() {
        let config = SceneConfig::from_ron_str(
            "(asset_root: \"static\", export: (include_hidden: true))",
        )
        .unwrap();
        assert_eq!(config.asset_root, "static");
        assert!(config.export.include_hidden);
        assert_eq!(config.export.generator, "prefab_engine");
        assert_eq!(config.gravity, [0.0, -9.81, 0.0]);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = SceneConfig::default()
            .with_gravity([0.0, -1.62, 0.0])
            .with_fixed_timestep(0.01)
            .with_export(ExportConfig::default().with_generator("moon"));
        let text = config.to_ron_string().unwrap();
        assert_eq!(SceneConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            SceneConfig::from_ron_str("(gravity: \"down\")"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            SceneConfig::load_ron("/nonexistent/scene.ron"),
            Err(ConfigError::IoError(_))
        ));
    }
}
