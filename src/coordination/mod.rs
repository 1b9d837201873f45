//! Coordination engine
//!
//! Composes the vibration and vacuum channels into one driving schedule.
//!
//! # Policies
//!
//! | Policy | Vibration | Vacuum | Time base |
//! |--------|-----------|--------|-----------|
//! | Synchronized | `power × f` | `intensity × f` | shared step index |
//! | Alternating | `power × f` | `intensity × (1 − f)` | shared step index |
//! | Independent | own waveform | own waveform | two concurrent paths |
//!
//! `f` is the driving waveform's sample at the current step, generated with
//! a unit target. Independent needs per-actuator commands; on a Legacy
//! device it is demoted to Synchronized and the caller gets a notice.
//!
//! # Exit paths
//!
//! Every run ends with a stop of both channels: on completion the stop
//! result is returned, on failure or cancellation the stop is best-effort
//! and the original error wins.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    capabilities::CapabilityProfile,
    dispatch::{Channel, DispatchError, FallbackDispatcher},
    scheduler::{Cancelled, Pacer},
    waveform::{self, InvalidParameters, Sample, Shape},
};

/// Rule for combining the two channels over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationPolicy {
    #[default]
    Synchronized,
    Alternating,
    Independent,
}

impl fmt::Display for CoordinationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Synchronized => "synchronized",
            Self::Alternating => "alternating",
            Self::Independent => "independent",
        };
        f.write_str(name)
    }
}

/// Failures that end an engine run
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    InvalidParameters(#[from] InvalidParameters),
}

/// A validated two-channel request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboPlan {
    pub vibration_power: f64,
    pub vacuum_intensity: f64,
    pub duration: Duration,
    pub policy: CoordinationPolicy,
    /// Shared step waveform, or the vibration path's waveform when independent
    pub driving: Shape,
    /// Vacuum path's waveform when independent
    pub vacuum: Shape,
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationReport {
    pub requested_policy: CoordinationPolicy,
    pub applied_policy: CoordinationPolicy,
    /// Steps issued on the vibration side (paired steps when sharing a time base)
    pub vibration_steps: usize,
    /// Steps issued on the vacuum side
    pub vacuum_steps: usize,
    /// Vacuum encodings that succeeded, in first-use order
    pub vacuum_encodings: Vec<String>,
    /// Informational messages for the caller (e.g. policy demotion)
    pub notices: Vec<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct PathRun {
    steps: usize,
    encodings: Vec<String>,
}

impl PathRun {
    fn note(&mut self, label: Option<&'static str>) {
        if let Some(label) = label {
            if !self.encodings.iter().any(|l| l == label) {
                self.encodings.push(label.to_string());
            }
        }
    }
}

/// Work out which policy actually runs on `profile`
///
/// Returns the applied policy and, when it differs from the request, a
/// notice to surface to the caller.
pub fn resolve_policy(
    profile: CapabilityProfile,
    requested: CoordinationPolicy,
) -> (CoordinationPolicy, Option<String>) {
    if requested == CoordinationPolicy::Independent && !profile.supports_independent() {
        let notice = format!(
            "Independent coordination needs per-actuator commands; \
             {profile} device runs Synchronized instead"
        );
        return (CoordinationPolicy::Synchronized, Some(notice));
    }
    (requested, None)
}

/// Drives waveforms through a [`FallbackDispatcher`]
///
/// One engine per invocation. The dispatcher must not be shared with
/// another concurrent invocation.
pub struct CoordinationEngine<'a> {
    dispatcher: &'a FallbackDispatcher,
    pacer: Pacer,
}

impl<'a> CoordinationEngine<'a> {
    pub fn new(dispatcher: &'a FallbackDispatcher, pacer: Pacer) -> Self {
        Self { dispatcher, pacer }
    }

    pub fn profile(&self) -> CapabilityProfile {
        self.dispatcher.profile()
    }

    /// Run a two-channel combo
    pub async fn run_combo(&self, plan: &ComboPlan) -> Result<CoordinationReport, EngineError> {
        let (applied, notice) = resolve_policy(self.profile(), plan.policy);
        if let Some(ref notice) = notice {
            warn!("{notice}");
        }

        info!(
            "Combo: {} ({} requested), {}ms, vibration {:.2}, vacuum {:.2}",
            applied,
            plan.policy,
            plan.duration.as_millis(),
            plan.vibration_power,
            plan.vacuum_intensity
        );

        let start = Instant::now();
        let result = match applied {
            CoordinationPolicy::Independent => self.run_independent(plan).await,
            shared => self.run_shared(plan, shared).await.map(|run| {
                let vacuum_steps = run.steps;
                (run, vacuum_steps)
            }),
        };

        let (vibration, vacuum_steps) = self.finish(result).await?;

        Ok(CoordinationReport {
            requested_policy: plan.policy,
            applied_policy: applied,
            vibration_steps: vibration.steps,
            vacuum_steps,
            vacuum_encodings: vibration.encodings,
            notices: notice.into_iter().collect(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run one waveform on a single channel, then stop
    ///
    /// Returns the number of steps issued and the vacuum encodings used.
    pub async fn run_channel(
        &self,
        channel: Channel,
        shape: Shape,
        target: f64,
        duration: Duration,
    ) -> Result<(usize, Vec<String>), EngineError> {
        let samples = waveform::generate(shape, target, duration);
        info!(
            "{channel} {} waveform: {} samples over {}ms",
            shape.pattern(),
            samples.len(),
            duration.as_millis()
        );

        let run = self.finish(self.drive_channel(channel, &samples).await).await?;
        Ok((run.steps, run.encodings))
    }

    /// Shared time base: both channels derived from one step fraction
    async fn run_shared(
        &self,
        plan: &ComboPlan,
        policy: CoordinationPolicy,
    ) -> Result<PathRun, EngineError> {
        let fractions = waveform::generate(plan.driving, 1.0, plan.duration);
        let mut run = PathRun::default();

        for (i, sample) in fractions.iter().enumerate() {
            self.pacer.checkpoint()?;

            let fraction = sample.intensity;
            let vibration = plan.vibration_power * fraction;
            let vacuum = match policy {
                CoordinationPolicy::Alternating => plan.vacuum_intensity * (1.0 - fraction),
                _ => plan.vacuum_intensity * fraction,
            };

            debug!(
                "Step {}/{}: vibration {:.3}, vacuum {:.3}",
                i + 1,
                fractions.len(),
                vibration,
                vacuum
            );
            let label = self.dispatcher.set_pair(vibration, vacuum).await?;
            run.note(Some(label));
            run.steps += 1;

            self.pacer.hold(sample.hold).await?;
        }

        Ok(run)
    }

    /// Two concurrently timed paths, joined before returning
    ///
    /// If either path fails the other is dropped at its next suspension
    /// point, so both end together.
    async fn run_independent(&self, plan: &ComboPlan) -> Result<(PathRun, usize), EngineError> {
        let vibration = waveform::generate(plan.driving, plan.vibration_power, plan.duration);
        let vacuum = waveform::generate(plan.vacuum, plan.vacuum_intensity, plan.duration);

        debug!(
            "Independent paths: {} vibration samples, {} vacuum samples",
            vibration.len(),
            vacuum.len()
        );

        let (vibration_run, vacuum_run) = tokio::try_join!(
            self.drive_channel(Channel::Vibration, &vibration),
            self.drive_channel(Channel::Vacuum, &vacuum),
        )?;

        Ok((
            PathRun {
                steps: vibration_run.steps,
                encodings: vacuum_run.encodings,
            },
            vacuum_run.steps,
        ))
    }

    async fn drive_channel(&self, channel: Channel, samples: &[Sample]) -> Result<PathRun, EngineError> {
        let mut run = PathRun::default();

        for sample in samples {
            self.pacer.checkpoint()?;
            let label = self.dispatcher.set_channel(channel, sample.intensity).await?;
            run.note(label);
            run.steps += 1;
            self.pacer.hold(sample.hold).await?;
        }

        Ok(run)
    }

    /// Stop both channels on every exit path
    async fn finish<T>(&self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        match result {
            Ok(value) => {
                self.dispatcher.stop_all().await?;
                Ok(value)
            }
            Err(e) => {
                match &e {
                    EngineError::Cancelled(_) => info!("Run cancelled, stopping actuators"),
                    other => warn!("Run failed ({other}), stopping actuators"),
                }
                self.dispatcher.release().await;
                Err(e)
            }
        }
    }
}
