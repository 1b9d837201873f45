//! Waveform generation
//!
//! Pure, deterministic generators producing a finite sequence of
//! (intensity, hold) samples for a named pattern. No I/O and no timing:
//! the coordination engine consumes the samples and does the waiting.
//!
//! Resolutions are carried as non-zero integers, so a zero step count or
//! pulse interval is rejected when a [`Shape`] is built at the request
//! boundary rather than dividing by zero here.

use std::{
    fmt,
    num::{NonZeroU32, NonZeroU64},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pattern selector as named in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Linear rise from zero toward the target
    #[default]
    Ramp,
    /// Alternating target / off
    Pulse,
    /// Triangular rise and fall
    Wave,
    /// Constant target
    Hold,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ramp => "ramp",
            Self::Pulse => "pulse",
            Self::Wave => "wave",
            Self::Hold => "hold",
        };
        f.write_str(name)
    }
}

/// A parameter rejected before any device I/O
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid parameter '{field}': {message}")]
pub struct InvalidParameters {
    pub field: String,
    pub message: String,
}

impl InvalidParameters {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Pattern plus its resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Ramp { steps: NonZeroU32 },
    Pulse { interval_ms: NonZeroU64 },
    Wave { steps: NonZeroU32 },
    Hold,
}

impl Shape {
    /// Attach a resolution to a pattern
    ///
    /// Only the resolution the pattern uses is checked: `steps` for ramp and
    /// wave, `pulse_interval_ms` for pulse.
    pub fn from_pattern(
        pattern: Pattern,
        steps: u32,
        pulse_interval_ms: u64,
    ) -> Result<Self, InvalidParameters> {
        let steps_nz = || {
            NonZeroU32::new(steps)
                .ok_or_else(|| InvalidParameters::new("steps", "must be greater than 0"))
        };

        Ok(match pattern {
            Pattern::Ramp => Self::Ramp { steps: steps_nz()? },
            Pattern::Wave => Self::Wave { steps: steps_nz()? },
            Pattern::Pulse => Self::Pulse {
                interval_ms: NonZeroU64::new(pulse_interval_ms).ok_or_else(|| {
                    InvalidParameters::new("pulse_interval_ms", "must be greater than 0")
                })?,
            },
            Pattern::Hold => Self::Hold,
        })
    }

    pub fn pattern(&self) -> Pattern {
        match self {
            Self::Ramp { .. } => Pattern::Ramp,
            Self::Pulse { .. } => Pattern::Pulse,
            Self::Wave { .. } => Pattern::Wave,
            Self::Hold => Pattern::Hold,
        }
    }
}

/// One step of a waveform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Intensity in `[0.0, 1.0]`
    pub intensity: f64,
    pub hold: Duration,
}

impl Sample {
    pub fn new(intensity: f64, hold_ms: u64) -> Self {
        Self {
            intensity,
            hold: Duration::from_millis(hold_ms),
        }
    }

    pub fn hold_ms(&self) -> u64 {
        self.hold.as_millis() as u64
    }
}

/// Produce the sample sequence for `shape`
///
/// - Ramp: `steps` samples at `target * i / steps` for `i` in `0..steps`,
///   each held `total / steps`. The ramp stops one step short of the
///   target; the caller decides what follows.
/// - Pulse: `floor(total / (2 * interval))` on/off pairs. A trailing
///   partial cycle is dropped.
/// - Wave: `steps + 1` samples rising from 0 to the target, then the same
///   `steps + 1` samples falling back, each held `total / (2 * steps)`.
/// - Hold: one sample at the target for the whole duration.
pub fn generate(shape: Shape, target: f64, total: Duration) -> Vec<Sample> {
    let target = target.clamp(0.0, 1.0);
    let total_ms = total.as_millis() as u64;

    match shape {
        Shape::Ramp { steps } => {
            let steps = u64::from(steps.get());
            let hold = total_ms / steps;
            (0..steps)
                .map(|i| Sample::new(target * i as f64 / steps as f64, hold))
                .collect()
        }
        Shape::Pulse { interval_ms } => {
            let interval = interval_ms.get();
            let cycles = total_ms / interval.saturating_mul(2);
            (0..cycles)
                .flat_map(|_| [Sample::new(target, interval), Sample::new(0.0, interval)])
                .collect()
        }
        Shape::Wave { steps } => {
            let steps = u64::from(steps.get());
            let hold = total_ms / (2 * steps);
            let level = |i: u64| target * i as f64 / steps as f64;
            let rise = (0..=steps).map(|i| Sample::new(level(i), hold));
            let fall = (0..=steps).rev().map(|i| Sample::new(level(i), hold));
            rise.chain(fall).collect()
        }
        Shape::Hold => vec![Sample::new(target, total_ms)],
    }
}

/// Sum of all holds in a sequence
pub fn total_duration(samples: &[Sample]) -> Duration {
    samples.iter().map(|s| s.hold).sum()
}
