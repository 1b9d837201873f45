//! User-facing error formatting for the binary

use std::io;

use crate::device::DeviceError;

/// Render an application error with a hint where one is known
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut message = format!("Error: {error}");

    let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    for cause in &causes {
        message.push_str(&format!("\n  caused by: {cause}"));
    }

    if let Some(hint) = hint_for(error) {
        message.push_str(&format!("\n\nHint: {hint}"));
    }
    message
}

fn hint_for(error: &anyhow::Error) -> Option<&'static str> {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return match e.kind() {
                io::ErrorKind::NotFound => Some("check that the file path exists"),
                io::ErrorKind::PermissionDenied => Some("check the file permissions"),
                _ => None,
            };
        }
        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return Some("the configuration file must be valid TOML");
        }
        if cause.downcast_ref::<serde_json::Error>().is_some() {
            return Some(r#"requests are JSON objects tagged by "tool", e.g. {"tool": "stop"}"#);
        }
        if let Some(e) = cause.downcast_ref::<DeviceError>() {
            return match e {
                DeviceError::Disconnected => Some("reconnect the device and retry"),
                DeviceError::Timeout(_) => Some("the device did not answer in time; retry"),
                _ => None,
            };
        }
    }
    None
}
