//! # haptic-coordinator
//!
//! Coordination and waveform engine for a two-channel haptic device:
//! a vibration motor and a vacuum (suction) actuator.
//!
//! The engine detects which command vocabulary the device speaks, maps each
//! logical channel onto a physical command (walking a chain of alternative
//! vacuum encodings until the device accepts one), and runs timed waveforms
//! on one or both channels.
//!
//! # Architecture
//!
//! ```text
//! HapticSession (one tool invocation at a time)
//!   ├─> Validator            request fields → plans, before any device I/O
//!   ├─> CoordinationEngine   ramp / pulse / wave / hold, one or two channels
//!   ├─> ExtendedHoldSequencer  drop → hold → restore
//!   └─> FallbackDispatcher   channel intensity → device command
//!         └─> ActuatorPort   external protocol client (SimulatedDevice in-process)
//! ```
//!
//! # Profiles
//!
//! **Legacy:** one combined command carries both channels; no per-actuator
//! addressing, so independent timing is not available.
//!
//! **IndexedDual:** vibration on index 0, vacuum through the
//! Constrict-Index1 → Linear-Position → Inflate-Index1 → Inflate-Index0 chain.

#![warn(clippy::all)]

/// Capability profile detection and reporting
pub mod capabilities;

/// Configuration loading and validation
pub mod config;

/// Coordinated two-channel waveforms
pub mod coordination;

/// Actuator port abstraction and the simulated device
pub mod device;

/// Channel to command mapping with vacuum encoding fallback
pub mod dispatch;

/// Drop, hold and restore sequencing
pub mod hold;

/// User-facing error formatting
pub mod runtime;

/// Timed suspension and cancellation
pub mod scheduler;

/// Tool requests, responses and the device session
pub mod tools;

/// Waveform sample generation
pub mod waveform;

pub use capabilities::{CapabilityProfile, CapabilityReport};
pub use config::Config;
pub use device::{ActuatorPort, SimulatedDevice};
pub use tools::{HapticSession, ToolRequest, ToolResponse};
