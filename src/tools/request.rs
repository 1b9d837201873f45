//! Tool request records and boundary validation
//!
//! Requests arrive as JSON tagged by `"tool"`. Nothing here touches the
//! device: every numeric field is checked against [`LimitsConfig`] and turned
//! into a plan the engine can run without further checks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, DefaultsConfig, LimitsConfig},
    coordination::{ComboPlan, CoordinationPolicy},
    dispatch::ChannelLevels,
    hold::HoldPlan,
    waveform::{InvalidParameters, Pattern, Shape},
};

/// One tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    DeviceInfo,
    Vibrate(WaveformRequest),
    Vacuum(WaveformRequest),
    Combo(ComboRequest),
    SetLevels(LevelsRequest),
    Edge(EdgeRequest),
    Stop,
}

impl ToolRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceInfo => "device_info",
            Self::Vibrate(_) => "vibrate",
            Self::Vacuum(_) => "vacuum",
            Self::Combo(_) => "combo",
            Self::SetLevels(_) => "set_levels",
            Self::Edge(_) => "edge",
            Self::Stop => "stop",
        }
    }

    /// Parse a JSON request
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

/// Single-channel waveform (`vibrate`, `vacuum`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformRequest {
    pub intensity: f64,
    pub duration_ms: u64,
    #[serde(default)]
    pub pattern: Pattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_interval_ms: Option<u64>,
}

/// Two-channel coordinated waveform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboRequest {
    pub vibration_power: f64,
    pub vacuum_intensity: f64,
    pub duration_ms: u64,
    #[serde(default)]
    pub policy: CoordinationPolicy,
    #[serde(default)]
    pub vibration_pattern: Pattern,
    #[serde(default = "default_vacuum_pattern")]
    pub vacuum_pattern: Pattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_interval_ms: Option<u64>,
}

fn default_vacuum_pattern() -> Pattern {
    Pattern::Hold
}

/// Direct level-set; at least one channel must be given
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacuum: Option<f64>,
}

/// Extended hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRequest {
    pub minimum_level: f64,
    pub hold_duration_ms: u64,
    #[serde(default)]
    pub restore_duration_ms: u64,
    /// Pre-drop vibration level; last-known level when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_vibration: Option<f64>,
    /// Pre-drop vacuum level; last-known level when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_vacuum: Option<f64>,
}

/// A validated single-channel waveform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelPlan {
    pub target: f64,
    pub duration: Duration,
    pub shape: Shape,
}

/// Checks request fields against the configured bounds
pub struct Validator<'a> {
    limits: &'a LimitsConfig,
    defaults: &'a DefaultsConfig,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            limits: &config.limits,
            defaults: &config.defaults,
        }
    }

    /// Intensity or level in `[0.0, 1.0]`
    pub fn level(&self, field: &str, value: f64) -> Result<f64, InvalidParameters> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(InvalidParameters::new(
                field,
                format!("must be between 0.0 and 1.0, got {value}"),
            ));
        }
        Ok(value)
    }

    /// Waveform run length: `1..=max_duration_ms`
    pub fn run_duration(&self, field: &str, ms: u64) -> Result<Duration, InvalidParameters> {
        if ms == 0 {
            return Err(InvalidParameters::new(field, "must be greater than 0"));
        }
        bounded(field, ms, self.limits.max_duration_ms)
    }

    /// Resolve a pattern's resolution, filling unset fields from defaults
    pub fn shape(
        &self,
        pattern: Pattern,
        steps: Option<u32>,
        pulse_interval_ms: Option<u64>,
    ) -> Result<Shape, InvalidParameters> {
        let steps = steps.unwrap_or(self.defaults.steps);
        let interval = pulse_interval_ms.unwrap_or(self.defaults.pulse_interval_ms);

        let shape = Shape::from_pattern(pattern, steps, interval)?;
        match shape {
            Shape::Ramp { steps } | Shape::Wave { steps } if steps.get() > self.limits.max_steps => {
                Err(InvalidParameters::new(
                    "steps",
                    format!("must be at most {}, got {}", self.limits.max_steps, steps),
                ))
            }
            Shape::Pulse { interval_ms }
                if !(self.limits.min_pulse_interval_ms..=self.limits.max_pulse_interval_ms)
                    .contains(&interval_ms.get()) =>
            {
                Err(InvalidParameters::new(
                    "pulse_interval_ms",
                    format!(
                        "must be between {} and {}, got {}",
                        self.limits.min_pulse_interval_ms,
                        self.limits.max_pulse_interval_ms,
                        interval_ms
                    ),
                ))
            }
            shape => Ok(shape),
        }
    }

    pub fn waveform(&self, request: &WaveformRequest) -> Result<ChannelPlan, InvalidParameters> {
        Ok(ChannelPlan {
            target: self.level("intensity", request.intensity)?,
            duration: self.run_duration("duration_ms", request.duration_ms)?,
            shape: self.shape(request.pattern, request.steps, request.pulse_interval_ms)?,
        })
    }

    /// `vacuum_pattern` is only used, and only checked, by an independent run
    pub fn combo(&self, request: &ComboRequest) -> Result<ComboPlan, InvalidParameters> {
        let vacuum = match request.policy {
            CoordinationPolicy::Independent => {
                self.shape(request.vacuum_pattern, request.steps, request.pulse_interval_ms)?
            }
            CoordinationPolicy::Synchronized | CoordinationPolicy::Alternating => Shape::Hold,
        };

        Ok(ComboPlan {
            vibration_power: self.level("vibration_power", request.vibration_power)?,
            vacuum_intensity: self.level("vacuum_intensity", request.vacuum_intensity)?,
            duration: self.run_duration("duration_ms", request.duration_ms)?,
            policy: request.policy,
            driving: self.shape(request.vibration_pattern, request.steps, request.pulse_interval_ms)?,
            vacuum,
        })
    }

    /// Validated `(vibration, vacuum)` pair, each optional
    pub fn levels(
        &self,
        request: &LevelsRequest,
    ) -> Result<(Option<f64>, Option<f64>), InvalidParameters> {
        if request.vibration.is_none() && request.vacuum.is_none() {
            return Err(InvalidParameters::new(
                "vibration",
                "at least one of vibration or vacuum is required",
            ));
        }
        let vibration = request
            .vibration
            .map(|v| self.level("vibration", v))
            .transpose()?;
        let vacuum = request.vacuum.map(|v| self.level("vacuum", v)).transpose()?;
        Ok((vibration, vacuum))
    }

    /// `current` supplies the pre-drop levels the request leaves out
    pub fn edge(
        &self,
        request: &EdgeRequest,
        current: ChannelLevels,
    ) -> Result<HoldPlan, InvalidParameters> {
        let restore_to = ChannelLevels {
            vibration: match request.restore_vibration {
                Some(v) => self.level("restore_vibration", v)?,
                None => current.vibration,
            },
            vacuum: match request.restore_vacuum {
                Some(v) => self.level("restore_vacuum", v)?,
                None => current.vacuum,
            },
        };

        Ok(HoldPlan {
            minimum_level: self.level("minimum_level", request.minimum_level)?,
            hold: bounded("hold_duration_ms", request.hold_duration_ms, self.limits.max_hold_ms)?,
            restore: bounded(
                "restore_duration_ms",
                request.restore_duration_ms,
                self.limits.max_restore_ms,
            )?,
            restore_to,
        })
    }
}

fn bounded(field: &str, ms: u64, max: u64) -> Result<Duration, InvalidParameters> {
    if ms > max {
        return Err(InvalidParameters::new(
            field,
            format!("must be at most {max}ms, got {ms}ms"),
        ));
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn waveform(pattern: Pattern) -> WaveformRequest {
        WaveformRequest {
            intensity: 0.5,
            duration_ms: 1000,
            pattern,
            steps: None,
            pulse_interval_ms: None,
        }
    }

    #[test]
    fn test_parse_tagged_requests() {
        let request = ToolRequest::from_json(
            r#"{"tool": "combo", "vibration_power": 1.0, "vacuum_intensity": 0.5,
                "duration_ms": 1000, "policy": "alternating", "steps": 20}"#,
        )
        .unwrap();
        let ToolRequest::Combo(combo) = request else {
            panic!("expected combo");
        };
        assert_eq!(combo.policy, CoordinationPolicy::Alternating);
        assert_eq!(combo.vibration_pattern, Pattern::Ramp);
        assert_eq!(combo.vacuum_pattern, Pattern::Hold);

        assert_eq!(ToolRequest::from_json(r#"{"tool": "stop"}"#).unwrap(), ToolRequest::Stop);
        assert_eq!(
            ToolRequest::from_json(r#"{"tool": "device_info"}"#).unwrap().name(),
            "device_info"
        );
    }

    #[test]
    fn test_unknown_pattern_is_rejected() {
        let result = ToolRequest::from_json(
            r#"{"tool": "vibrate", "intensity": 0.5, "duration_ms": 100, "pattern": "sawtooth"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_fill_resolution() {
        let config = Config::default_config();
        let plan = Validator::new(&config).waveform(&waveform(Pattern::Ramp)).unwrap();
        assert_eq!(
            plan.shape,
            Shape::Ramp {
                steps: NonZeroU32::new(20).unwrap()
            }
        );

        let plan = Validator::new(&config).waveform(&waveform(Pattern::Pulse)).unwrap();
        assert!(matches!(plan.shape, Shape::Pulse { interval_ms } if interval_ms.get() == 500));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let config = Config::default_config();
        let mut request = waveform(Pattern::Wave);
        request.steps = Some(0);
        let err = Validator::new(&config).waveform(&request).unwrap_err();
        assert_eq!(err.field, "steps");
    }

    #[test]
    fn test_zero_pulse_interval_rejected() {
        let config = Config::default_config();
        let mut request = waveform(Pattern::Pulse);
        request.pulse_interval_ms = Some(0);
        let err = Validator::new(&config).waveform(&request).unwrap_err();
        assert_eq!(err.field, "pulse_interval_ms");
    }

    #[test]
    fn test_unused_resolution_is_not_checked() {
        let config = Config::default_config();
        let mut request = waveform(Pattern::Hold);
        request.steps = Some(0);
        request.pulse_interval_ms = Some(0);
        assert!(Validator::new(&config).waveform(&request).is_ok());
    }

    #[test]
    fn test_limits_enforced() {
        let config = Config::default_config();
        let validator = Validator::new(&config);

        let mut request = waveform(Pattern::Ramp);
        request.steps = Some(1001);
        assert_eq!(validator.waveform(&request).unwrap_err().field, "steps");

        let mut request = waveform(Pattern::Pulse);
        request.pulse_interval_ms = Some(5);
        assert_eq!(validator.waveform(&request).unwrap_err().field, "pulse_interval_ms");

        let mut request = waveform(Pattern::Hold);
        request.duration_ms = 600_001;
        assert_eq!(validator.waveform(&request).unwrap_err().field, "duration_ms");

        request.duration_ms = 0;
        assert_eq!(validator.waveform(&request).unwrap_err().field, "duration_ms");
    }

    #[test]
    fn test_intensity_out_of_range() {
        let config = Config::default_config();
        let validator = Validator::new(&config);

        for bad in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let mut request = waveform(Pattern::Hold);
            request.intensity = bad;
            assert_eq!(validator.waveform(&request).unwrap_err().field, "intensity");
        }
        assert_eq!(validator.level("x", 1.0).unwrap(), 1.0);
        assert_eq!(validator.level("x", 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_vacuum_pattern_checked_only_when_independent() {
        let config = Config::default_config();
        let validator = Validator::new(&config);
        let mut request = ComboRequest {
            vibration_power: 0.8,
            vacuum_intensity: 0.5,
            duration_ms: 1000,
            policy: CoordinationPolicy::Synchronized,
            vibration_pattern: Pattern::Ramp,
            vacuum_pattern: Pattern::Pulse,
            steps: None,
            pulse_interval_ms: Some(5),
        };

        let plan = validator.combo(&request).unwrap();
        assert_eq!(plan.vacuum, Shape::Hold);

        request.policy = CoordinationPolicy::Alternating;
        assert!(validator.combo(&request).is_ok());

        request.policy = CoordinationPolicy::Independent;
        assert_eq!(validator.combo(&request).unwrap_err().field, "pulse_interval_ms");

        request.pulse_interval_ms = Some(250);
        let plan = validator.combo(&request).unwrap();
        assert!(matches!(plan.vacuum, Shape::Pulse { interval_ms } if interval_ms.get() == 250));
    }

    #[test]
    fn test_levels_requires_a_channel() {
        let config = Config::default_config();
        let validator = Validator::new(&config);
        assert!(validator.levels(&LevelsRequest::default()).is_err());
        assert_eq!(
            validator
                .levels(&LevelsRequest {
                    vibration: None,
                    vacuum: Some(0.4)
                })
                .unwrap(),
            (None, Some(0.4))
        );
    }

    #[test]
    fn test_edge_defaults_to_current_levels() {
        let config = Config::default_config();
        let request = EdgeRequest {
            minimum_level: 0.1,
            hold_duration_ms: 10_000,
            restore_duration_ms: 500,
            restore_vibration: Some(0.9),
            restore_vacuum: None,
        };
        let current = ChannelLevels {
            vibration: 0.3,
            vacuum: 0.6,
        };
        let plan = Validator::new(&config).edge(&request, current).unwrap();
        assert_eq!(plan.restore_to.vibration, 0.9);
        assert_eq!(plan.restore_to.vacuum, 0.6);
        assert_eq!(plan.hold, Duration::from_secs(10));
        assert_eq!(plan.restore, Duration::from_millis(500));
    }

    #[test]
    fn test_edge_hold_bounded() {
        let config = Config::default_config();
        let request = EdgeRequest {
            minimum_level: 0.1,
            hold_duration_ms: 300_001,
            restore_duration_ms: 0,
            restore_vibration: None,
            restore_vacuum: None,
        };
        let err = Validator::new(&config)
            .edge(&request, ChannelLevels::default())
            .unwrap_err();
        assert_eq!(err.field, "hold_duration_ms");
    }
}
