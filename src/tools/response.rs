//! Tool response records

use serde::{Deserialize, Serialize};

use crate::{
    coordination::EngineError,
    dispatch::{AttemptResult, DispatchError},
};

/// Outcome of one tool invocation
///
/// Failures are reported here rather than as `Err`; the device stays usable
/// for the next invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool: String,
    pub success: bool,
    /// Human-readable description of what happened
    pub summary: String,
    /// Vacuum encoding(s) that succeeded, comma separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
    /// Every encoding tried when the vacuum chain was exhausted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptResult>,
}

impl ToolResponse {
    pub fn ok(tool: &str, summary: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            success: true,
            summary: summary.into(),
            encoding: None,
            notices: Vec::new(),
            attempts: Vec::new(),
        }
    }

    /// Record the encodings used; an empty list leaves the field unset
    pub fn with_encodings(mut self, encodings: &[String]) -> Self {
        if !encodings.is_empty() {
            self.encoding = Some(encodings.join(", "));
        }
        self
    }

    pub fn with_notices(mut self, notices: Vec<String>) -> Self {
        self.notices = notices;
        self
    }

    pub fn failure(tool: &str, error: &EngineError) -> Self {
        let (summary, attempts) = match error {
            EngineError::Dispatch(DispatchError::AllEncodingsFailed(e)) => {
                (format!("{tool} failed: {}", e.detailed_report().trim_end()), e.attempts.clone())
            }
            EngineError::Dispatch(e) => (format!("{tool} failed: {e}"), e.attempts().to_vec()),
            EngineError::Cancelled(_) => {
                (format!("{tool} cancelled; actuators stopped"), Vec::new())
            }
            EngineError::InvalidParameters(e) => (format!("{tool} rejected: {e}"), Vec::new()),
        };

        Self {
            tool: tool.to_string(),
            success: false,
            summary,
            encoding: None,
            notices: Vec::new(),
            attempts,
        }
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(r#"{{"tool":"{}","success":false,"summary":"serialization failed: {e}"}}"#, self.tool)
        })
    }
}
