//! Tool invocation surface
//!
//! The records exchanged with the surrounding tool framework, their
//! validation, and the [`HapticSession`] that executes them.
//!
//! ```json
//! {"tool": "combo", "vibration_power": 1.0, "vacuum_intensity": 0.6,
//!  "duration_ms": 1000, "policy": "alternating", "steps": 20}
//! ```

pub mod request;
mod response;
mod session;

pub use request::{
    ChannelPlan, ComboRequest, EdgeRequest, LevelsRequest, ToolRequest, Validator,
    WaveformRequest,
};
pub use response::ToolResponse;
pub use session::HapticSession;
