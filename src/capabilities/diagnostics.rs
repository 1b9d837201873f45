//! Capability reporting
//!
//! Human- and machine-readable description of what the engine will do with
//! the connected device: which profile was detected, how each channel is
//! encoded and whether independent coordination is available.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{
    capabilities::{CapabilityProfile, Detection},
    dispatch::{LEGACY_VACUUM_LABEL, VACUUM_CHAIN},
};

/// Capability report for `device_info` and `--show-capabilities`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub device: String,
    pub profile: CapabilityProfile,
    pub detection: Detection,
    pub vibration_encoding: String,
    /// Vacuum encodings in the order they are tried
    pub vacuum_encodings: Vec<String>,
    pub independent_supported: bool,
    pub notes: Vec<String>,
}

impl CapabilityReport {
    pub fn new(device: impl Into<String>, detection: &Detection) -> Self {
        let profile = detection.profile;

        let (vibration_encoding, vacuum_encodings) = match profile {
            CapabilityProfile::Legacy => (
                "Combined command, channel 0".to_string(),
                vec![LEGACY_VACUUM_LABEL.to_string()],
            ),
            CapabilityProfile::IndexedDual => (
                "Indexed vibrate, index 0".to_string(),
                VACUUM_CHAIN.iter().map(|e| e.label().to_string()).collect(),
            ),
        };

        let mut notes = Vec::new();
        if detection.indeterminate {
            notes.push(format!(
                "Capability indeterminate ({}); using the {} profile",
                detection.reason, profile
            ));
        }
        if !profile.supports_independent() {
            notes.push("Independent coordination runs as Synchronized on this device".to_string());
        }

        Self {
            device: device.into(),
            profile,
            detection: detection.clone(),
            vibration_encoding,
            vacuum_encodings,
            independent_supported: profile.supports_independent(),
            notes,
        }
    }

    /// Multi-line text rendering
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Device: {}", self.device);
        let _ = writeln!(out, "Profile: {} ({})", self.profile, self.detection.reason);
        let _ = writeln!(
            out,
            "  Vibration actuators: {}, constriction: {}",
            self.detection.vibration_count,
            if self.detection.has_constriction { "yes" } else { "no" }
        );
        let _ = writeln!(out, "Vibration encoding: {}", self.vibration_encoding);
        let _ = writeln!(out, "Vacuum encodings (in order):");
        for (i, label) in self.vacuum_encodings.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, label);
        }
        let _ = writeln!(
            out,
            "Independent coordination: {}",
            if self.independent_supported { "available" } else { "unavailable" }
        );
        for note in &self.notes {
            let _ = writeln!(out, "Note: {note}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::detect_profile;

    #[test]
    fn test_indexed_report_lists_chain() {
        let mut attrs = crate::device::CommandAttributes::new();
        attrs.insert(
            crate::device::CommandKind::Scalar,
            vec![
                crate::device::ActuatorDescriptor::new("Vibrate", 0),
                crate::device::ActuatorDescriptor::new("Constrict", 1),
            ],
        );
        let report = CapabilityReport::new("test", &detect_profile(Some(&attrs)));
        assert!(report.independent_supported);
        assert_eq!(report.vacuum_encodings.len(), 4);
        assert!(report.notes.is_empty());

        let text = report.to_text();
        assert!(text.contains("Profile: IndexedDual"));
        assert!(text.contains("3. Inflate-Index1"));
    }

    #[test]
    fn test_indeterminate_report_has_notes() {
        let report = CapabilityReport::new("unknown", &detect_profile(None));
        assert_eq!(report.profile, CapabilityProfile::Legacy);
        assert_eq!(report.vacuum_encodings, vec!["OriginalVibrate".to_string()]);
        assert_eq!(report.notes.len(), 2);
        assert!(report.to_text().contains("unavailable"));
    }
}
