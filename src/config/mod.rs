//! Evaluation settings.
//!
//! Settings are read from a YAML file; every field is optional and falls back
//! to the benchmark defaults:
//!
//! ```yaml
//! nndr_ratio: 0.8
//! max_pixel_error: 2.5
//! resize_to_first: false
//! palette:
//!   ring: [0, 255, 0]
//!   center: [0, 0, 255]
//!   line: [255, 255, 0]
//! ```

use crate::visualization::Palette;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to load YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Nearest-neighbor distance ratio threshold in `(0, 1]`.
    pub nndr_ratio: f64,
    /// Inlier tolerance on the reprojection error, in pixels.
    pub max_pixel_error: f64,
    /// Resize image N to the size of image 1 before compositing.
    pub resize_to_first: bool,
    pub palette: Palette,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            nndr_ratio: 0.8,
            max_pixel_error: 2.5,
            resize_to_first: false,
            palette: Palette::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn load_from_yaml(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EvaluationConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.nndr_ratio > 0.0 && self.nndr_ratio <= 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "nndr_ratio must be in (0, 1], got {}",
                self.nndr_ratio
            )));
        }
        if !(self.max_pixel_error >= 0.0 && self.max_pixel_error.is_finite()) {
            return Err(ConfigError::InvalidValue(format!(
                "max_pixel_error must be a finite non-negative value, got {}",
                self.max_pixel_error
            )));
        }
        Ok(())
    }
}
