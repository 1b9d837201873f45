//! Extended-hold sequencer
//!
//! Three phases layered on the dispatcher, used for edging / climax control:
//!
//! 1. **Drop**: both channels straight to the minimum level, one command each.
//! 2. **Hold**: suspend with both channels at the minimum. The protocol is
//!    level-set, so nothing is re-sent while waiting.
//! 3. **Restore**: back to the pre-drop levels, either directly or through
//!    [`RESTORE_STEPS`] linear steps spread over the restore duration.
//!
//! A device failure during drop or hold still attempts a direct restore
//! before the error is returned. Cancellation, or a failure the restore
//! cannot recover from, stops both channels instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    coordination::EngineError,
    dispatch::{ChannelLevels, FallbackDispatcher},
    scheduler::Pacer,
};

/// Intermediate steps used when restoring over a non-zero duration
pub const RESTORE_STEPS: u32 = 10;

/// Validated extended-hold request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldPlan {
    pub minimum_level: f64,
    pub hold: Duration,
    /// Zero restores directly
    pub restore: Duration,
    /// Pre-drop levels to come back to
    pub restore_to: ChannelLevels,
}

/// What an extended hold did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldReport {
    pub minimum_level: f64,
    pub restored_to: ChannelLevels,
    /// Zero for a direct restore
    pub restore_steps: u32,
    /// Vacuum encodings that succeeded, in first-use order
    pub vacuum_encodings: Vec<String>,
    pub elapsed_ms: u64,
}

pub struct ExtendedHoldSequencer<'a> {
    dispatcher: &'a FallbackDispatcher,
    pacer: Pacer,
}

impl<'a> ExtendedHoldSequencer<'a> {
    pub fn new(dispatcher: &'a FallbackDispatcher, pacer: Pacer) -> Self {
        Self { dispatcher, pacer }
    }

    pub async fn run(&self, plan: &HoldPlan) -> Result<HoldReport, EngineError> {
        let start = Instant::now();
        let mut encodings = Vec::new();

        info!(
            "Extended hold: drop to {:.2} for {}ms, restore to vibration {:.2} / vacuum {:.2} over {}ms",
            plan.minimum_level,
            plan.hold.as_millis(),
            plan.restore_to.vibration,
            plan.restore_to.vacuum,
            plan.restore.as_millis()
        );

        if let Err(e) = self.drop_and_hold(plan, &mut encodings).await {
            self.recover(plan, &e).await;
            return Err(e);
        }

        let restore_steps = match self.restore(plan, &mut encodings).await {
            Ok(steps) => steps,
            Err(e) => {
                warn!("Restore phase failed ({e}), stopping actuators");
                self.dispatcher.release().await;
                return Err(e);
            }
        };

        info!("Extended hold complete");
        Ok(HoldReport {
            minimum_level: plan.minimum_level,
            restored_to: plan.restore_to,
            restore_steps,
            vacuum_encodings: encodings,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn drop_and_hold(
        &self,
        plan: &HoldPlan,
        encodings: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        self.pacer.checkpoint()?;
        self.dispatcher.set_vibration(plan.minimum_level).await?;
        let label = self.dispatcher.set_vacuum(plan.minimum_level).await?;
        note(encodings, label);

        debug!("Holding at {:.2} for {}ms", plan.minimum_level, plan.hold.as_millis());
        self.pacer.hold(plan.hold).await?;
        Ok(())
    }

    async fn restore(&self, plan: &HoldPlan, encodings: &mut Vec<String>) -> Result<u32, EngineError> {
        let target = plan.restore_to;

        if plan.restore.is_zero() {
            self.pacer.checkpoint()?;
            self.set_levels(target, encodings).await?;
            return Ok(0);
        }

        let step_hold = plan.restore / RESTORE_STEPS;
        let floor = plan.minimum_level;
        let lerp = |to: f64, k: u32| floor + (to - floor) * f64::from(k) / f64::from(RESTORE_STEPS);

        for k in 1..=RESTORE_STEPS {
            self.pacer.checkpoint()?;
            let levels = ChannelLevels {
                vibration: lerp(target.vibration, k),
                vacuum: lerp(target.vacuum, k),
            };
            debug!(
                "Restore step {k}/{RESTORE_STEPS}: vibration {:.3}, vacuum {:.3}",
                levels.vibration, levels.vacuum
            );
            self.set_levels(levels, encodings).await?;
            self.pacer.hold(step_hold).await?;
        }

        Ok(RESTORE_STEPS)
    }

    async fn set_levels(
        &self,
        levels: ChannelLevels,
        encodings: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        self.dispatcher.set_vibration(levels.vibration).await?;
        let label = self.dispatcher.set_vacuum(levels.vacuum).await?;
        note(encodings, label);
        Ok(())
    }

    /// Drop or hold failed: leave the device off the floor
    async fn recover(&self, plan: &HoldPlan, cause: &EngineError) {
        if matches!(cause, EngineError::Cancelled(_)) {
            info!("Extended hold cancelled, stopping actuators");
            self.dispatcher.release().await;
            return;
        }

        warn!("Extended hold failed ({cause}), attempting direct restore");
        let vibration = self.dispatcher.set_vibration(plan.restore_to.vibration).await;
        let vacuum = self.dispatcher.set_vacuum(plan.restore_to.vacuum).await;

        if let Some(e) = vibration.err().or(vacuum.err()) {
            error!("Direct restore failed ({e}), stopping actuators");
            self.dispatcher.release().await;
        }
    }
}

fn note(encodings: &mut Vec<String>, label: &str) {
    if !encodings.iter().any(|l| l == label) {
        encodings.push(label.to_string());
    }
}
