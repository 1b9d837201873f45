//! Actuator command port
//!
//! The abstract command surface the engine drives. Implementations live with
//! the protocol client (connection, scanning and device matching are not part
//! of this crate); [`SimulatedDevice`] is the in-process implementation used
//! for dry runs and tests.
//!
//! # Ownership
//!
//! A port is assumed to be exclusively owned by one invocation at a time.
//! The surrounding framework serializes invocations; nothing here locks the
//! device.

pub mod simulated;

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use simulated::{IssuedCommand, RecordedCommand, Rejection, SimulatedDevice};

/// Physical actuator kind as tagged by the device protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// Rotating or linear-resonant vibration motor
    Vibrate,
    /// Constriction bladder (suction on newer firmware)
    Constrict,
    /// Inflation bladder
    Inflate,
    /// Linear position drive
    Position,
    /// Rotation motor
    Rotate,
    /// Oscillation drive
    Oscillate,
}

impl ActuatorKind {
    /// Parse a protocol kind tag, case-insensitively
    ///
    /// Returns `None` for tags this crate does not know about; callers
    /// treat those descriptors as unusable rather than failing.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "vibrate" | "vibration" => Some(Self::Vibrate),
            "constrict" | "constriction" => Some(Self::Constrict),
            "inflate" | "inflation" => Some(Self::Inflate),
            "position" | "linear" => Some(Self::Position),
            "rotate" | "rotation" => Some(Self::Rotate),
            "oscillate" | "oscillation" => Some(Self::Oscillate),
            _ => None,
        }
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Vibrate => "vibrate",
            Self::Constrict => "constrict",
            Self::Inflate => "inflate",
            Self::Position => "position",
            Self::Rotate => "rotate",
            Self::Oscillate => "oscillate",
        };
        f.write_str(tag)
    }
}

/// Command families a device can advertise attributes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Legacy combined vibration command
    Vibrate,
    /// Per-actuator indexed scalar command
    Scalar,
    /// Linear positional command
    Linear,
    /// Stop everything
    Stop,
}

/// One per-actuator descriptor inside the attribute listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorDescriptor {
    /// Raw kind tag as reported by the device
    pub kind: String,
    /// Actuator index addressed by indexed commands
    pub index: u32,
}

impl ActuatorDescriptor {
    pub fn new(kind: impl Into<String>, index: u32) -> Self {
        Self {
            kind: kind.into(),
            index,
        }
    }

    /// Parsed kind, if recognised
    pub fn actuator_kind(&self) -> Option<ActuatorKind> {
        ActuatorKind::from_tag(&self.kind)
    }
}

/// Attribute listing reported by the device, keyed by command kind
pub type CommandAttributes = BTreeMap<CommandKind, Vec<ActuatorDescriptor>>;

/// One entry of an indexed per-actuator command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub index: u32,
    pub value: f64,
    pub kind: ActuatorKind,
}

impl IndexedEntry {
    pub fn new(index: u32, value: f64, kind: ActuatorKind) -> Self {
        Self { index, value, kind }
    }
}

/// One point of a positional (linear) command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionPoint {
    pub value: f64,
    pub duration_ms: u32,
}

/// Errors reported by the protocol client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Device answered with an error
    #[error("Device rejected command: {0}")]
    Rejected(String),

    /// Command or actuator not supported by this firmware
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Connection dropped
    #[error("Device disconnected")]
    Disconnected,

    /// No answer in time
    #[error("Command timed out after {0}ms")]
    Timeout(u64),
}

/// Command surface exposed by the device protocol client
///
/// Intensity commands are fire-and-forget from the engine's point of view:
/// success means the client accepted the command.
#[async_trait]
pub trait ActuatorPort: Send + Sync {
    /// Legacy two-channel vibration set
    async fn combined_command(&self, values: [f64; 2]) -> Result<(), DeviceError>;

    /// Per-actuator indexed set
    async fn indexed_command(&self, entries: &[IndexedEntry]) -> Result<(), DeviceError>;

    /// Linear actuator move
    async fn positional_command(&self, points: &[PositionPoint]) -> Result<(), DeviceError>;

    /// Stop every actuator immediately
    async fn halt(&self) -> Result<(), DeviceError>;

    /// Attribute introspection, read once when a session opens
    ///
    /// `None` when the client has no attribute data for the device.
    async fn capability_attributes(&self) -> Option<CommandAttributes>;

    /// Whether a rejected command is guaranteed to leave actuator state untouched
    ///
    /// When this returns `false` the dispatcher issues an explicit zero for a
    /// failed encoding before moving on to the next one.
    fn rejects_atomically(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_case_insensitive() {
        assert_eq!(
            ActuatorKind::from_tag("Vibrate"),
            Some(ActuatorKind::Vibrate)
        );
        assert_eq!(
            ActuatorKind::from_tag(" CONSTRICT "),
            Some(ActuatorKind::Constrict)
        );
        assert_eq!(ActuatorKind::from_tag("linear"), Some(ActuatorKind::Position));
        assert_eq!(ActuatorKind::from_tag("wobble"), None);
        assert_eq!(ActuatorKind::from_tag(""), None);
    }

    #[test]
    fn test_kind_display_round_trips() {
        for kind in [
            ActuatorKind::Vibrate,
            ActuatorKind::Constrict,
            ActuatorKind::Inflate,
            ActuatorKind::Position,
        ] {
            assert_eq!(ActuatorKind::from_tag(&kind.to_string()), Some(kind));
        }
    }
}
