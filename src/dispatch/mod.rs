//! Fallback dispatcher
//!
//! Maps a logical channel intensity onto a physical command for the
//! session's capability profile.
//!
//! - Vibration has exactly one encoding per profile: the first channel of
//!   the combined command (Legacy) or the indexed vibration command at
//!   index 0 (IndexedDual).
//! - Vacuum on Legacy is the second channel of the combined command, with
//!   the last-known vibration value held constant. There is nothing to fall
//!   back to, so a failure is fatal.
//! - Vacuum on IndexedDual walks [`VACUUM_CHAIN`] in order and uses the
//!   first encoding the device accepts. The winner is not remembered: every
//!   call probes the chain from the top again, since firmware revisions
//!   accept different encodings intermittently.

mod encoding;

use std::{fmt, sync::Arc, time::Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use encoding::{
    AllEncodingsFailed, AttemptResult, VacuumEncoding, LEGACY_VACUUM_LABEL, VACUUM_CHAIN,
};

use crate::{
    capabilities::CapabilityProfile,
    device::{ActuatorKind, ActuatorPort, DeviceError, IndexedEntry},
};

/// Logical output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Vibration,
    Vacuum,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vibration => f.write_str("vibration"),
            Self::Vacuum => f.write_str("vacuum"),
        }
    }
}

/// Last intensities the device accepted for each channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelLevels {
    pub vibration: f64,
    pub vacuum: f64,
}

impl ChannelLevels {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Vibration => self.vibration,
            Channel::Vacuum => self.vacuum,
        }
    }
}

/// Dispatch failures that end the current invocation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// Single-encoding path rejected (vibration channel or Legacy combined command)
    #[error("{channel} command failed: {source}")]
    DeviceCommandFailed {
        channel: Channel,
        #[source]
        source: DeviceError,
    },

    /// Legacy combined command carrying both channels at once was rejected
    #[error("Combined vibration/vacuum command failed: {source}")]
    PairCommandFailed {
        #[source]
        source: DeviceError,
    },

    /// Every vacuum encoding was rejected
    #[error(transparent)]
    AllEncodingsFailed(#[from] AllEncodingsFailed),
}

impl DispatchError {
    /// Per-encoding attempts, when the error carries them
    pub fn attempts(&self) -> &[AttemptResult] {
        match self {
            Self::AllEncodingsFailed(e) => &e.attempts,
            Self::DeviceCommandFailed { .. } | Self::PairCommandFailed { .. } => &[],
        }
    }
}

/// Dispatcher tuning, taken from `[device]` configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Travel time sent with the positional encoding
    pub linear_move_ms: u32,
    /// Zero a failed encoding even when the port rejects atomically
    pub reset_after_failed_encoding: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            linear_move_ms: 100,
            reset_after_failed_encoding: false,
        }
    }
}

/// Issues channel intensities against an [`ActuatorPort`]
pub struct FallbackDispatcher {
    port: Arc<dyn ActuatorPort>,
    profile: CapabilityProfile,
    chain: &'static [VacuumEncoding],
    options: DispatchOptions,
    levels: Mutex<ChannelLevels>,
}

impl FallbackDispatcher {
    pub fn new(
        port: Arc<dyn ActuatorPort>,
        profile: CapabilityProfile,
        options: DispatchOptions,
    ) -> Self {
        Self {
            port,
            profile,
            chain: &VACUUM_CHAIN,
            options,
            levels: Mutex::new(ChannelLevels::default()),
        }
    }

    pub fn profile(&self) -> CapabilityProfile {
        self.profile
    }

    pub fn levels(&self) -> ChannelLevels {
        *self.levels.lock()
    }

    /// Encodings tried for vacuum under the current profile, in order
    pub fn vacuum_encodings(&self) -> Vec<&'static str> {
        match self.profile {
            CapabilityProfile::Legacy => vec![LEGACY_VACUUM_LABEL],
            CapabilityProfile::IndexedDual => self.chain.iter().map(|e| e.label()).collect(),
        }
    }

    /// Set the vibration channel. No fallback exists for this channel.
    pub async fn set_vibration(&self, intensity: f64) -> Result<(), DispatchError> {
        let intensity = normalize(intensity);

        let result = match self.profile {
            CapabilityProfile::Legacy => {
                let vacuum = self.levels.lock().vacuum;
                self.port.combined_command([intensity, vacuum]).await
            }
            CapabilityProfile::IndexedDual => {
                self.port
                    .indexed_command(&[IndexedEntry::new(0, intensity, ActuatorKind::Vibrate)])
                    .await
            }
        };

        result.map_err(|source| DispatchError::DeviceCommandFailed {
            channel: Channel::Vibration,
            source,
        })?;

        self.levels.lock().vibration = intensity;
        Ok(())
    }

    /// Set the vacuum channel, returning the label of the encoding used
    pub async fn set_vacuum(&self, intensity: f64) -> Result<&'static str, DispatchError> {
        let intensity = normalize(intensity);

        let label = match self.profile {
            CapabilityProfile::Legacy => {
                let vibration = self.levels.lock().vibration;
                self.port
                    .combined_command([vibration, intensity])
                    .await
                    .map_err(|source| DispatchError::DeviceCommandFailed {
                        channel: Channel::Vacuum,
                        source,
                    })?;
                LEGACY_VACUUM_LABEL
            }
            CapabilityProfile::IndexedDual => self.walk_vacuum_chain(intensity).await?,
        };

        self.levels.lock().vacuum = intensity;
        Ok(label)
    }

    /// Set both channels for one step
    ///
    /// Legacy packs both values into a single combined command; IndexedDual
    /// issues vibration then vacuum.
    pub async fn set_pair(&self, vibration: f64, vacuum: f64) -> Result<&'static str, DispatchError> {
        match self.profile {
            CapabilityProfile::Legacy => {
                let vibration = normalize(vibration);
                let vacuum = normalize(vacuum);
                self.port
                    .combined_command([vibration, vacuum])
                    .await
                    .map_err(|source| DispatchError::PairCommandFailed { source })?;
                *self.levels.lock() = ChannelLevels { vibration, vacuum };
                Ok(LEGACY_VACUUM_LABEL)
            }
            CapabilityProfile::IndexedDual => {
                self.set_vibration(vibration).await?;
                self.set_vacuum(vacuum).await
            }
        }
    }

    /// Set one logical channel; the label is `None` for vibration
    pub async fn set_channel(
        &self,
        channel: Channel,
        intensity: f64,
    ) -> Result<Option<&'static str>, DispatchError> {
        match channel {
            Channel::Vibration => self.set_vibration(intensity).await.map(|()| None),
            Channel::Vacuum => self.set_vacuum(intensity).await.map(Some),
        }
    }

    /// Drive both channels to zero
    ///
    /// Uses the per-profile encodings first. If either channel refuses, the
    /// port's halt command is tried before giving up.
    pub async fn stop_all(&self) -> Result<(), DispatchError> {
        let first_error = match self.profile {
            CapabilityProfile::Legacy => self.set_pair(0.0, 0.0).await.err(),
            CapabilityProfile::IndexedDual => {
                let vibration = self.set_vibration(0.0).await.err();
                let vacuum = self.set_vacuum(0.0).await.err();
                vibration.or(vacuum)
            }
        };

        let Some(err) = first_error else {
            debug!("All channels stopped");
            return Ok(());
        };

        warn!("Channel stop failed ({err}), issuing halt");
        match self.port.halt().await {
            Ok(()) => {
                *self.levels.lock() = ChannelLevels::default();
                Ok(())
            }
            Err(halt_err) => {
                warn!("Halt failed: {halt_err}");
                Err(err)
            }
        }
    }

    /// Best-effort stop for exit paths
    ///
    /// Failures are logged and swallowed so they never replace the error
    /// that ended the invocation.
    pub async fn release(&self) {
        if let Err(e) = self.stop_all().await {
            error!("Failed to stop actuators: {e}");
        }
    }

    async fn walk_vacuum_chain(&self, intensity: f64) -> Result<&'static str, AllEncodingsFailed> {
        let reset_failed =
            self.options.reset_after_failed_encoding || !self.port.rejects_atomically();
        let mut attempts = Vec::with_capacity(self.chain.len());

        for encoding in self.chain {
            let start = Instant::now();
            match encoding
                .apply(self.port.as_ref(), intensity, self.options.linear_move_ms)
                .await
            {
                Ok(()) => {
                    attempts.push(AttemptResult::success(encoding.label(), start.elapsed()));
                    if attempts.len() > 1 {
                        info!(
                            "Vacuum set via {} after {} failed encoding(s)",
                            encoding,
                            attempts.len() - 1
                        );
                    } else {
                        debug!("Vacuum set via {encoding}");
                    }
                    return Ok(encoding.label());
                }
                Err(e) => {
                    warn!("Vacuum encoding {encoding} failed: {e}");
                    attempts.push(AttemptResult::failure(
                        encoding.label(),
                        e.to_string(),
                        start.elapsed(),
                    ));

                    if reset_failed {
                        if let Err(reset_err) = encoding
                            .apply(self.port.as_ref(), 0.0, self.options.linear_move_ms)
                            .await
                        {
                            debug!("Zeroing {encoding} after failure also failed: {reset_err}");
                        }
                    }
                }
            }
        }

        error!("All {} vacuum encodings failed", attempts.len());
        Err(AllEncodingsFailed {
            count: self.chain.len(),
            attempts,
        })
    }
}

/// Keep intensities inside `[0.0, 1.0]`; NaN reads as off
fn normalize(intensity: f64) -> f64 {
    if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, 1.0)
    }
}
