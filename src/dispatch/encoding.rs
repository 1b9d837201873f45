//! Vacuum encoding chain
//!
//! The ordered list of physical encodings tried for the vacuum channel on
//! indexed-command devices, plus the attempt ledger reported back to the
//! caller when every encoding fails.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{ActuatorKind, ActuatorPort, DeviceError, IndexedEntry, PositionPoint};

/// Label reported for the combined-command path on legacy devices
pub const LEGACY_VACUUM_LABEL: &str = "OriginalVibrate";

/// One concrete way of expressing a vacuum intensity in the device protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VacuumEncoding {
    /// Indexed constriction command at index 1
    ConstrictIndex1,
    /// Positional command on the linear drive
    LinearPosition,
    /// Indexed inflation command at index 1
    InflateIndex1,
    /// Indexed inflation command at index 0
    InflateIndex0,
}

/// Priority order of the vacuum encodings. Never permuted at runtime.
pub const VACUUM_CHAIN: [VacuumEncoding; 4] = [
    VacuumEncoding::ConstrictIndex1,
    VacuumEncoding::LinearPosition,
    VacuumEncoding::InflateIndex1,
    VacuumEncoding::InflateIndex0,
];

impl VacuumEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConstrictIndex1 => "Constrict-Index1",
            Self::LinearPosition => "Linear-Position",
            Self::InflateIndex1 => "Inflate-Index1",
            Self::InflateIndex0 => "Inflate-Index0",
        }
    }

    /// Issue `value` through this encoding
    ///
    /// `linear_move_ms` is the travel time sent with the positional form.
    pub async fn apply(
        &self,
        port: &dyn ActuatorPort,
        value: f64,
        linear_move_ms: u32,
    ) -> Result<(), DeviceError> {
        match self {
            Self::ConstrictIndex1 => {
                port.indexed_command(&[IndexedEntry::new(1, value, ActuatorKind::Constrict)])
                    .await
            }
            Self::LinearPosition => {
                port.positional_command(&[PositionPoint {
                    value,
                    duration_ms: linear_move_ms,
                }])
                .await
            }
            Self::InflateIndex1 => {
                port.indexed_command(&[IndexedEntry::new(1, value, ActuatorKind::Inflate)])
                    .await
            }
            Self::InflateIndex0 => {
                port.indexed_command(&[IndexedEntry::new(0, value, ActuatorKind::Inflate)])
                    .await
            }
        }
    }
}

impl fmt::Display for VacuumEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Record of one encoding attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    /// Encoding label
    pub encoding: String,
    /// Did it succeed?
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// How long the attempt took (in milliseconds)
    pub duration_ms: u64,
}

impl AttemptResult {
    pub fn success(encoding: impl Into<String>, duration: Duration) -> Self {
        Self {
            encoding: encoding.into(),
            success: true,
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn failure(encoding: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            encoding: encoding.into(),
            success: false,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Every encoding in the chain was rejected
#[derive(Debug, Clone, Error, PartialEq)]
#[error("All {count} vacuum encodings failed")]
pub struct AllEncodingsFailed {
    /// Number of encodings tried
    pub count: usize,
    /// Results from each attempt, in chain order
    pub attempts: Vec<AttemptResult>,
}

impl AllEncodingsFailed {
    /// Format a detailed report of all failures
    pub fn detailed_report(&self) -> String {
        let mut report = format!("All {} vacuum encodings failed:\n", self.count);
        for (i, attempt) in self.attempts.iter().enumerate() {
            report.push_str(&format!(
                "  {}. {} ({}ms)",
                i + 1,
                attempt.encoding,
                attempt.duration_ms
            ));
            if let Some(err) = &attempt.error {
                report.push_str(&format!(": {err}"));
            }
            report.push('\n');
        }
        report
    }
}
