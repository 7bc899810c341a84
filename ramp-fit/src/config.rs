//! Fit configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RampError;
use crate::jump::JumpConfig;

/// Settings for fitting the ramps of an exposure.
///
/// Whether jump detection runs at all is a property of the read pattern
/// (`FixedValues::use_jump`), so it can be fixed once per exposure; the settings
/// here only tune how detection and fitting behave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Jump detection settings
    pub jump: JumpConfig,
    /// Include shot noise at the fitted rate in reported variances
    pub poisson_variance: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            jump: JumpConfig::default(),
            poisson_variance: true,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), RampError> {
        self.jump.validate()
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file; missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jump::ThresholdModel;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fit_config.json");

        let config = FitConfig {
            jump: JumpConfig {
                threshold: ThresholdModel::Fixed(4.0),
                min_testable_len: 4,
            },
            poisson_variance: false,
        };
        config.save_to_file(&path).unwrap();

        let loaded = FitConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FitConfig = serde_json::from_str(r#"{"poisson_variance": false}"#).unwrap();
        assert!(!config.poisson_variance);
        assert_eq!(config.jump, JumpConfig::default());

        let config: FitConfig =
            serde_json::from_str(r#"{"jump": {"threshold": {"fixed": 6.0}}}"#).unwrap();
        assert_eq!(config.jump.threshold, ThresholdModel::Fixed(6.0));
        assert_eq!(config.jump.min_testable_len, 3);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FitConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
