//! Device session
//!
//! Owns the actuator port for the life of the process and runs one tool
//! invocation at a time against it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    capabilities::{detect_profile, CapabilityProfile, CapabilityReport, Detection},
    config::Config,
    coordination::{CoordinationEngine, EngineError},
    device::ActuatorPort,
    dispatch::{Channel, ChannelLevels, FallbackDispatcher},
    hold::ExtendedHoldSequencer,
    scheduler::Pacer,
    tools::{
        request::{ComboRequest, EdgeRequest, LevelsRequest, ToolRequest, Validator, WaveformRequest},
        ToolResponse,
    },
};

/// Exclusive owner of one actuator device
///
/// The capability profile is read once in [`HapticSession::open`] and never
/// re-detected. [`HapticSession::execute`] takes `&mut self`, so two
/// invocations can never drive the device at the same time.
pub struct HapticSession {
    config: Config,
    detection: Detection,
    dispatcher: FallbackDispatcher,
}

impl HapticSession {
    pub async fn open(port: Arc<dyn ActuatorPort>, config: Config) -> Self {
        let attributes = port.capability_attributes().await;
        let detection = detect_profile(attributes.as_ref());

        info!(
            "Session opened on '{}': {} ({})",
            config.device.name, detection.profile, detection.reason
        );

        let dispatcher =
            FallbackDispatcher::new(port, detection.profile, config.dispatch_options());

        Self {
            config,
            detection,
            dispatcher,
        }
    }

    pub fn profile(&self) -> CapabilityProfile {
        self.detection.profile
    }

    pub fn detection(&self) -> &Detection {
        &self.detection
    }

    /// Last-known channel levels
    pub fn levels(&self) -> ChannelLevels {
        self.dispatcher.levels()
    }

    pub fn report(&self) -> CapabilityReport {
        CapabilityReport::new(&self.config.device.name, &self.detection)
    }

    /// Run one tool invocation
    ///
    /// Cancelling `cancel` stops issuing steps and stops both channels
    /// before the response is produced.
    pub async fn execute(&mut self, request: ToolRequest, cancel: CancellationToken) -> ToolResponse {
        let tool = request.name();
        debug!("Executing {tool}: {request:?}");

        let pacer = Pacer::new(cancel);
        let result = match &request {
            ToolRequest::DeviceInfo => Ok(self.device_info(tool)),
            ToolRequest::Vibrate(r) => self.waveform(tool, Channel::Vibration, r, pacer).await,
            ToolRequest::Vacuum(r) => self.waveform(tool, Channel::Vacuum, r, pacer).await,
            ToolRequest::Combo(r) => self.combo(tool, r, pacer).await,
            ToolRequest::SetLevels(r) => self.set_levels(tool, r, &pacer).await,
            ToolRequest::Edge(r) => self.edge(tool, r, pacer).await,
            ToolRequest::Stop => self.stop(tool).await,
        };

        match result {
            Ok(response) => {
                info!("{tool}: {}", response.summary);
                response
            }
            Err(e) => {
                warn!("{tool} failed: {e}");
                ToolResponse::failure(tool, &e)
            }
        }
    }

    fn device_info(&self, tool: &str) -> ToolResponse {
        let report = self.report();
        ToolResponse::ok(tool, report.to_text().trim_end())
            .with_encodings(&report.vacuum_encodings)
            .with_notices(report.notes)
    }

    async fn waveform(
        &self,
        tool: &str,
        channel: Channel,
        request: &WaveformRequest,
        pacer: Pacer,
    ) -> Result<ToolResponse, EngineError> {
        let plan = Validator::new(&self.config).waveform(request)?;

        let engine = CoordinationEngine::new(&self.dispatcher, pacer);
        let (steps, encodings) = engine
            .run_channel(channel, plan.shape, plan.target, plan.duration)
            .await?;

        let via = if encodings.is_empty() {
            String::new()
        } else {
            format!(" via {}", encodings.join(", "))
        };
        let summary = format!(
            "{channel} {} at {:.2} for {}ms{via}: {steps} steps, actuators stopped",
            request.pattern,
            plan.target,
            plan.duration.as_millis()
        );
        Ok(ToolResponse::ok(tool, summary).with_encodings(&encodings))
    }

    async fn combo(
        &self,
        tool: &str,
        request: &ComboRequest,
        pacer: Pacer,
    ) -> Result<ToolResponse, EngineError> {
        let plan = Validator::new(&self.config).combo(request)?;

        let engine = CoordinationEngine::new(&self.dispatcher, pacer);
        let report = engine.run_combo(&plan).await?;

        let summary = format!(
            "Combo {} for {}ms (vibration {:.2}, vacuum {:.2}): {} vibration / {} vacuum steps via {}, actuators stopped",
            report.applied_policy,
            plan.duration.as_millis(),
            plan.vibration_power,
            plan.vacuum_intensity,
            report.vibration_steps,
            report.vacuum_steps,
            if report.vacuum_encodings.is_empty() {
                "no vacuum command".to_string()
            } else {
                report.vacuum_encodings.join(", ")
            }
        );
        Ok(ToolResponse::ok(tool, summary)
            .with_encodings(&report.vacuum_encodings)
            .with_notices(report.notices))
    }

    async fn set_levels(
        &self,
        tool: &str,
        request: &LevelsRequest,
        pacer: &Pacer,
    ) -> Result<ToolResponse, EngineError> {
        let (vibration, vacuum) = Validator::new(&self.config).levels(request)?;
        pacer.checkpoint()?;

        let mut encodings = Vec::new();
        let result = async {
            if let Some(level) = vibration {
                self.dispatcher.set_vibration(level).await?;
            }
            if let Some(level) = vacuum {
                encodings.push(self.dispatcher.set_vacuum(level).await?.to_string());
            }
            Ok::<_, EngineError>(())
        }
        .await;

        if let Err(e) = result {
            self.dispatcher.release().await;
            return Err(e);
        }

        let levels = self.dispatcher.levels();
        let summary = format!(
            "Levels set: vibration {:.2}, vacuum {:.2}",
            levels.vibration, levels.vacuum
        );
        Ok(ToolResponse::ok(tool, summary).with_encodings(&encodings))
    }

    async fn edge(
        &self,
        tool: &str,
        request: &EdgeRequest,
        pacer: Pacer,
    ) -> Result<ToolResponse, EngineError> {
        let plan = Validator::new(&self.config).edge(request, self.dispatcher.levels())?;

        let report = ExtendedHoldSequencer::new(&self.dispatcher, pacer)
            .run(&plan)
            .await?;

        let restore = if report.restore_steps == 0 {
            "directly".to_string()
        } else {
            format!(
                "in {} steps over {}ms",
                report.restore_steps,
                plan.restore.as_millis()
            )
        };
        let summary = format!(
            "Extended hold: dropped to {:.2} for {}ms, restored to vibration {:.2} / vacuum {:.2} {restore}",
            report.minimum_level,
            plan.hold.as_millis(),
            report.restored_to.vibration,
            report.restored_to.vacuum
        );
        Ok(ToolResponse::ok(tool, summary).with_encodings(&report.vacuum_encodings))
    }

    async fn stop(&self, tool: &str) -> Result<ToolResponse, EngineError> {
        self.dispatcher.stop_all().await?;
        Ok(ToolResponse::ok(tool, "All actuators stopped"))
    }
}
