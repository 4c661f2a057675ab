//! Service configuration

use crate::error::{ForecastError, Result};
use crate::forecaster::DEFAULT_EPOCHS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Forecast horizon used when a request does not set one
pub const DEFAULT_DAYS: usize = 30;

/// Settings for the forecasting service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding the model and scaler artifacts
    pub model_dir: PathBuf,
    /// Horizon for predict requests without `days`
    pub default_days: usize,
    /// Epochs for train requests without `epochs`, and for on-demand training
    pub default_epochs: usize,
    /// Seed for weight initialisation, dropout and batch order
    pub seed: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            default_days: DEFAULT_DAYS,
            default_epochs: DEFAULT_EPOCHS,
            seed: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)
            .map_err(|e| ForecastError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.default_days == 0 {
            return Err(ForecastError::ConfigError(
                "default_days must be at least 1".to_string(),
            ));
        }
        if self.default_epochs == 0 {
            return Err(ForecastError::ConfigError(
                "default_epochs must be at least 1".to_string(),
            ));
        }
        if self.model_dir.as_os_str().is_empty() {
            return Err(ForecastError::ConfigError(
                "model_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
