//! Machine configuration.
//!
//! Configuration is supplied as JSON (every field optional) or built with
//! `MachineConfig::default()`. The CLI layers its flags on top.

use crate::cpu::DEFAULT_MAX_STEPS;
use crate::gpu::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Sizes and budgets for one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Frame buffer width in pixels.
    pub gpu_width: usize,
    /// Frame buffer height in pixels.
    pub gpu_height: usize,
    /// Instruction budget per engine run.
    pub max_steps: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            gpu_width: DEFAULT_WIDTH,
            gpu_height: DEFAULT_HEIGHT,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl MachineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&text)
    }

    /// Reject zero dimensions and a zero budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gpu_width == 0 || self.gpu_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame size must be non-zero, got {}x{}",
                self.gpu_width, self.gpu_height
            )));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid config JSON: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!((config.gpu_width, config.gpu_height), (640, 480));
        assert_eq!(config.max_steps, 100_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = MachineConfig::from_json_str(r#"{ "gpu_width": 32 }"#).unwrap();
        assert_eq!(config.gpu_width, 32);
        assert_eq!(config.gpu_height, 480);
        assert_eq!(config.max_steps, 100_000);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(MachineConfig::from_json_str("{}").unwrap(), MachineConfig::default());
    }

    #[test]
    fn test_rejects_zero() {
        assert!(matches!(
            MachineConfig::from_json_str(r#"{ "gpu_height": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MachineConfig::from_json_str(r#"{ "max_steps": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            MachineConfig::from_json_str("{ gpu_width: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            MachineConfig::load("/nonexistent/duet.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
