//! Configuration management
//!
//! Handles loading and validation of configuration from:
//! - TOML files
//! - CLI arguments (log verbosity, applied by the binary)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOptions;

pub mod types;

pub use types::{DefaultsConfig, DeviceConfig, LimitsConfig, LoggingConfig};

const APP_DIR: &str = "haptic-coordinator";

/// Per-user configuration directory
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from("/etc").join(APP_DIR), |d| d.join(APP_DIR))
}

/// Default location of `config.toml`
pub fn default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Resolve the log directory, falling back to XDG_DATA_HOME/haptic-coordinator/logs
pub fn resolve_log_dir(configured: &Option<PathBuf>) -> PathBuf {
    configured.clone().unwrap_or_else(|| {
        dirs::data_dir().map_or_else(
            || std::env::temp_dir().join(APP_DIR),
            |d| d.join(APP_DIR).join("logs"),
        )
    })
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Device dispatch settings
    #[serde(default)]
    pub device: DeviceConfig,
    /// Request bounds
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Resolution defaults
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;

        if limits.max_steps == 0 {
            anyhow::bail!("limits.max_steps must be at least 1");
        }
        if limits.min_pulse_interval_ms == 0 {
            anyhow::bail!("limits.min_pulse_interval_ms must be at least 1");
        }
        if limits.min_pulse_interval_ms > limits.max_pulse_interval_ms {
            anyhow::bail!(
                "min_pulse_interval_ms ({}) cannot be greater than max_pulse_interval_ms ({})",
                limits.min_pulse_interval_ms,
                limits.max_pulse_interval_ms
            );
        }
        if limits.max_duration_ms == 0 || limits.max_hold_ms == 0 {
            anyhow::bail!("limits.max_duration_ms and limits.max_hold_ms must be positive");
        }

        if self.defaults.steps == 0 || self.defaults.steps > limits.max_steps {
            anyhow::bail!(
                "defaults.steps ({}) must be between 1 and max_steps ({})",
                self.defaults.steps,
                limits.max_steps
            );
        }
        if !(limits.min_pulse_interval_ms..=limits.max_pulse_interval_ms)
            .contains(&self.defaults.pulse_interval_ms)
        {
            anyhow::bail!(
                "defaults.pulse_interval_ms ({}) must be between {} and {}",
                self.defaults.pulse_interval_ms,
                limits.min_pulse_interval_ms,
                limits.max_pulse_interval_ms
            );
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Dispatcher tuning derived from `[device]`
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            linear_move_ms: self.device.linear_move_ms,
            reset_after_failed_encoding: self.device.reset_after_failed_encoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.defaults.steps, 20);
        assert_eq!(config.device.linear_move_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [device]
            linear_move_ms = 250

            [limits]
            max_steps = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatch_options().linear_move_ms, 250);
        assert_eq!(config.limits.max_steps, 50);
        assert_eq!(config.limits.max_hold_ms, 300_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation_zero_pulse_interval() {
        let mut config = Config::default_config();
        config.limits.min_pulse_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_defaults_outside_limits() {
        let mut config = Config::default_config();
        config.defaults.steps = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.defaults.pulse_interval_ms = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default_config();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        assert!(Config::from_toml("[limits]\nmax_steps = \"many\"").is_err());
    }
}
