//! Capability profile detection
//!
//! Classifies a device into one of the supported hardware variants from the
//! command attributes its protocol client reports. Detection never fails:
//! when the attributes carry no usable signal the profile resolves to
//! [`CapabilityProfile::Legacy`], which only relies on the combined command.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::{ActuatorKind, CommandAttributes};

/// Hardware variant / command dialect of the connected device
///
/// Computed once per session and passed into every engine call as
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityProfile {
    /// Two vibration channels behind the combined vibration command
    #[default]
    Legacy,
    /// One vibration actuator plus a constriction actuator, addressed per index
    IndexedDual,
}

impl CapabilityProfile {
    /// Per-actuator indexed commands are available
    pub fn supports_indexed(&self) -> bool {
        matches!(self, Self::IndexedDual)
    }

    /// Both channels can run on independent time bases
    ///
    /// The combined command packs both channels into one call, so two
    /// independent timers would overwrite each other's values.
    pub fn supports_independent(&self) -> bool {
        self.supports_indexed()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Legacy => "Legacy",
            Self::IndexedDual => "IndexedDual",
        }
    }
}

impl fmt::Display for CapabilityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub profile: CapabilityProfile,
    /// Distinct vibration actuators seen across all command kinds
    pub vibration_count: usize,
    pub has_constriction: bool,
    /// No usable signal; the profile is the fail-safe default
    pub indeterminate: bool,
    pub reason: String,
}

/// Classify a device from its reported command attributes
///
/// Vibration actuators are counted by distinct index, not by descriptor: a
/// motor listed under both the scalar and the vibrate command counts once.
///
/// Pure: the same input always yields the same detection.
pub fn detect_profile(attributes: Option<&CommandAttributes>) -> Detection {
    let Some(attributes) = attributes.filter(|a| !a.is_empty()) else {
        let detection = Detection {
            profile: CapabilityProfile::Legacy,
            vibration_count: 0,
            has_constriction: false,
            indeterminate: true,
            reason: "No attribute data reported".to_string(),
        };
        warn!(
            "Capability indeterminate ({}), defaulting to {}",
            detection.reason, detection.profile
        );
        return detection;
    };

    // The same actuator may be listed under several command kinds
    let mut vibration_indices = BTreeSet::new();
    let mut has_constriction = false;
    let mut unrecognised = 0usize;

    for (command, descriptors) in attributes {
        for descriptor in descriptors {
            match descriptor.actuator_kind() {
                Some(ActuatorKind::Vibrate) => {
                    vibration_indices.insert(descriptor.index);
                }
                Some(ActuatorKind::Constrict) => has_constriction = true,
                Some(_) => {}
                None => {
                    unrecognised += 1;
                    debug!(
                        "Ignoring unrecognised actuator kind '{}' under {:?}",
                        descriptor.kind, command
                    );
                }
            }
        }
    }

    let vibration_count = vibration_indices.len();

    let (profile, indeterminate, reason) = if has_constriction && vibration_count == 1 {
        (
            CapabilityProfile::IndexedDual,
            false,
            "One vibration actuator with a constriction actuator".to_string(),
        )
    } else if vibration_count >= 2 {
        (
            CapabilityProfile::Legacy,
            false,
            format!("{vibration_count} vibration actuators"),
        )
    } else {
        (
            CapabilityProfile::Legacy,
            true,
            format!(
                "Unrecognised layout: {vibration_count} vibration, constriction={has_constriction}, \
                 {unrecognised} unrecognised descriptor(s)"
            ),
        )
    };

    if indeterminate {
        warn!("Capability indeterminate ({reason}), defaulting to {profile}");
    } else {
        info!("Capability profile: {profile} ({reason})");
    }

    Detection {
        profile,
        vibration_count,
        has_constriction,
        indeterminate,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ActuatorDescriptor, CommandKind};

    fn attrs(entries: Vec<(CommandKind, Vec<(&str, u32)>)>) -> CommandAttributes {
        entries
            .into_iter()
            .map(|(command, descriptors)| {
                (
                    command,
                    descriptors
                        .into_iter()
                        .map(|(kind, index)| ActuatorDescriptor::new(kind, index))
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_indexed_dual_detection() {
        let a = attrs(vec![(
            CommandKind::Scalar,
            vec![("Vibrate", 0), ("Constrict", 1)],
        )]);
        let detection = detect_profile(Some(&a));
        assert_eq!(detection.profile, CapabilityProfile::IndexedDual);
        assert!(!detection.indeterminate);
        assert_eq!(detection.vibration_count, 1);
    }

    #[test]
    fn test_vibration_listed_twice_counts_once() {
        let a = attrs(vec![
            (CommandKind::Scalar, vec![("Vibrate", 0), ("Constrict", 1)]),
            (CommandKind::Vibrate, vec![("Vibrate", 0)]),
        ]);
        assert_eq!(
            detect_profile(Some(&a)).profile,
            CapabilityProfile::IndexedDual
        );
    }

    #[test]
    fn test_two_vibrators_is_legacy() {
        let a = attrs(vec![(CommandKind::Vibrate, vec![("Vibrate", 0), ("Vibrate", 1)])]);
        let detection = detect_profile(Some(&a));
        assert_eq!(detection.profile, CapabilityProfile::Legacy);
        assert!(!detection.indeterminate);
    }

    #[test]
    fn test_constriction_with_two_vibrators_is_legacy() {
        let a = attrs(vec![(
            CommandKind::Scalar,
            vec![("Vibrate", 0), ("Vibrate", 1), ("Constrict", 2)],
        )]);
        assert_eq!(detect_profile(Some(&a)).profile, CapabilityProfile::Legacy);
    }

    #[test]
    fn test_missing_attributes_default_to_legacy() {
        let detection = detect_profile(None);
        assert_eq!(detection.profile, CapabilityProfile::Legacy);
        assert!(detection.indeterminate);

        let empty = CommandAttributes::new();
        assert!(detect_profile(Some(&empty)).indeterminate);
    }

    #[test]
    fn test_malformed_attributes_default_to_legacy() {
        let a = attrs(vec![(CommandKind::Scalar, vec![("???", 0), ("", 1)])]);
        let detection = detect_profile(Some(&a));
        assert_eq!(detection.profile, CapabilityProfile::Legacy);
        assert!(detection.indeterminate);

        let lone_constrict = attrs(vec![(CommandKind::Scalar, vec![("Constrict", 0)])]);
        assert!(detect_profile(Some(&lone_constrict)).indeterminate);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let a = attrs(vec![(
            CommandKind::Scalar,
            vec![("Vibrate", 0), ("Constrict", 1)],
        )]);
        assert_eq!(detect_profile(Some(&a)), detect_profile(Some(&a)));
    }

    #[test]
    fn test_profile_capabilities() {
        assert!(!CapabilityProfile::Legacy.supports_independent());
        assert!(CapabilityProfile::IndexedDual.supports_independent());
        assert_eq!(CapabilityProfile::default(), CapabilityProfile::Legacy);
    }
}
