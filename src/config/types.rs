//! Configuration section types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Device-side dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Informational device name shown in reports
    pub name: String,
    /// Travel time sent with the positional vacuum encoding
    pub linear_move_ms: u32,
    /// Send an explicit zero after every failed vacuum encoding
    pub reset_after_failed_encoding: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "simulated".to_string(),
            linear_move_ms: 100,
            reset_after_failed_encoding: false,
        }
    }
}

/// Bounds enforced on tool requests before any device I/O
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Longest waveform run (vibrate, vacuum, combo)
    pub max_duration_ms: u64,
    /// Longest extended-hold hold phase
    pub max_hold_ms: u64,
    /// Longest extended-hold restore phase
    pub max_restore_ms: u64,
    pub max_steps: u32,
    pub min_pulse_interval_ms: u64,
    pub max_pulse_interval_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 600_000,
            max_hold_ms: 300_000,
            max_restore_ms: 60_000,
            max_steps: 1000,
            min_pulse_interval_ms: 10,
            max_pulse_interval_ms: 10_000,
        }
    }
}

/// Values used when a request leaves a resolution field out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub steps: u32,
    pub pulse_interval_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            steps: 20,
            pulse_interval_ms: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// Directory for timestamped log files; console only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}
