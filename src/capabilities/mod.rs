//! Device capability detection
//!
//! Classifies the connected device once, when a session opens, and
//! describes what the engine will do with it.
//!
//! # Usage
//!
//! ```ignore
//! use haptic_coordinator::capabilities::{detect_profile, CapabilityReport};
//!
//! let attributes = port.capability_attributes().await;
//! let detection = detect_profile(attributes.as_ref());
//!
//! if detection.profile.supports_independent() {
//!     // two independently timed channels are possible
//! }
//!
//! println!("{}", CapabilityReport::new("device", &detection).to_text());
//! ```

mod diagnostics;
mod profile;

pub use diagnostics::CapabilityReport;
pub use profile::{detect_profile, CapabilityProfile, Detection};
