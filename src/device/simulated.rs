//! In-process simulated device
//!
//! Records every command it receives together with the (tokio) instant it
//! was issued, and can be told to reject specific command shapes. Used by
//! the CLI dry-run mode and by the test suites.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{
    ActuatorDescriptor, ActuatorKind, ActuatorPort, CommandAttributes, CommandKind, DeviceError,
    IndexedEntry, PositionPoint,
};

/// A command as it reached the device
#[derive(Debug, Clone, PartialEq)]
pub enum IssuedCommand {
    Combined([f64; 2]),
    Indexed(Vec<IndexedEntry>),
    Positional(Vec<PositionPoint>),
    Halt,
}

/// Command log entry
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub at: Instant,
    pub command: IssuedCommand,
    pub accepted: bool,
}

/// Command shapes the simulated device can be told to reject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Any indexed command touching this actuator kind
    Indexed(ActuatorKind),
    /// Indexed commands for this kind at this index only
    IndexedAt(ActuatorKind, u32),
    Positional,
    Combined,
    Halt,
}

impl Rejection {
    /// The rejection that makes the named encoding fail
    pub fn for_encoding(label: &str) -> Option<Self> {
        let rejection = match label.to_ascii_lowercase().as_str() {
            "constrict-index1" => Self::IndexedAt(ActuatorKind::Constrict, 1),
            "linear-position" => Self::Positional,
            "inflate-index1" => Self::IndexedAt(ActuatorKind::Inflate, 1),
            "inflate-index0" => Self::IndexedAt(ActuatorKind::Inflate, 0),
            "originalvibrate" => Self::Combined,
            _ => return None,
        };
        Some(rejection)
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    log: Vec<RecordedCommand>,
    rejections: HashSet<Rejection>,
    /// Reject everything once this many commands have been accepted
    fail_after: Option<usize>,
    accepted: usize,
}

/// Recording [`ActuatorPort`] implementation
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    attributes: Option<CommandAttributes>,
    atomic_rejects: bool,
    state: Mutex<SimulatedState>,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>, attributes: Option<CommandAttributes>) -> Self {
        Self {
            name: name.into(),
            attributes,
            atomic_rejects: true,
            state: Mutex::new(SimulatedState::default()),
        }
    }

    /// Older firmware: two vibration motors behind the combined command
    pub fn legacy() -> Self {
        let mut attributes = CommandAttributes::new();
        attributes.insert(
            CommandKind::Vibrate,
            vec![
                ActuatorDescriptor::new("Vibrate", 0),
                ActuatorDescriptor::new("Vibrate", 1),
            ],
        );
        attributes.insert(CommandKind::Stop, Vec::new());
        Self::new("simulated-legacy", Some(attributes))
    }

    /// Newer firmware: one vibration motor plus a constriction actuator
    pub fn indexed_dual() -> Self {
        let mut attributes = CommandAttributes::new();
        attributes.insert(
            CommandKind::Scalar,
            vec![
                ActuatorDescriptor::new("Vibrate", 0),
                ActuatorDescriptor::new("Constrict", 1),
            ],
        );
        attributes.insert(
            CommandKind::Vibrate,
            vec![ActuatorDescriptor::new("Vibrate", 0)],
        );
        attributes.insert(CommandKind::Stop, Vec::new());
        Self::new("simulated-indexed-dual", Some(attributes))
    }

    /// A device whose client has no attribute data
    pub fn without_attributes() -> Self {
        Self::new("simulated-unknown", None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reject(&self, rejection: Rejection) -> &Self {
        self.state.lock().rejections.insert(rejection);
        self
    }

    pub fn accept(&self, rejection: Rejection) -> &Self {
        self.state.lock().rejections.remove(&rejection);
        self
    }

    /// Reject every command after `accepted` commands have gone through
    pub fn fail_after(&self, accepted: usize) -> &Self {
        self.state.lock().fail_after = Some(accepted);
        self
    }

    /// Report non-atomic rejections so the dispatcher zeroes failed encodings
    pub fn with_non_atomic_rejects(mut self) -> Self {
        self.atomic_rejects = false;
        self
    }

    /// Snapshot of the command log
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.lock().log.clone()
    }

    /// Accepted commands only, without timestamps
    pub fn accepted_commands(&self) -> Vec<IssuedCommand> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|c| c.accepted)
            .map(|c| c.command.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    fn record(&self, command: IssuedCommand) -> Result<(), DeviceError> {
        let mut state = self.state.lock();

        let exhausted = state
            .fail_after
            .is_some_and(|limit| state.accepted >= limit);
        let rejected = exhausted || Self::is_rejected(&state.rejections, &command);

        trace!(device = %self.name, ?command, rejected, "Simulated command");
        state.log.push(RecordedCommand {
            at: Instant::now(),
            command: command.clone(),
            accepted: !rejected,
        });

        if exhausted {
            debug!("Simulated device {} refusing further commands", self.name);
            return Err(DeviceError::Disconnected);
        }
        if rejected {
            return Err(DeviceError::Rejected(format!("{command:?}")));
        }

        state.accepted += 1;
        Ok(())
    }

    fn is_rejected(rejections: &HashSet<Rejection>, command: &IssuedCommand) -> bool {
        match command {
            IssuedCommand::Combined(_) => rejections.contains(&Rejection::Combined),
            IssuedCommand::Positional(_) => rejections.contains(&Rejection::Positional),
            IssuedCommand::Halt => rejections.contains(&Rejection::Halt),
            IssuedCommand::Indexed(entries) => entries.iter().any(|e| {
                rejections.contains(&Rejection::Indexed(e.kind))
                    || rejections.contains(&Rejection::IndexedAt(e.kind, e.index))
            }),
        }
    }
}

#[async_trait]
impl ActuatorPort for SimulatedDevice {
    async fn combined_command(&self, values: [f64; 2]) -> Result<(), DeviceError> {
        self.record(IssuedCommand::Combined(values))
    }

    async fn indexed_command(&self, entries: &[IndexedEntry]) -> Result<(), DeviceError> {
        self.record(IssuedCommand::Indexed(entries.to_vec()))
    }

    async fn positional_command(&self, points: &[PositionPoint]) -> Result<(), DeviceError> {
        self.record(IssuedCommand::Positional(points.to_vec()))
    }

    async fn halt(&self) -> Result<(), DeviceError> {
        self.record(IssuedCommand::Halt)
    }

    async fn capability_attributes(&self) -> Option<CommandAttributes> {
        self.attributes.clone()
    }

    fn rejects_atomically(&self) -> bool {
        self.atomic_rejects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_accepted_and_rejected_commands() {
        let device = SimulatedDevice::indexed_dual();
        device.reject(Rejection::Indexed(ActuatorKind::Constrict));

        let vib = [IndexedEntry::new(0, 0.5, ActuatorKind::Vibrate)];
        let suck = [IndexedEntry::new(1, 0.5, ActuatorKind::Constrict)];

        assert!(device.indexed_command(&vib).await.is_ok());
        assert!(device.indexed_command(&suck).await.is_err());

        let log = device.commands();
        assert_eq!(log.len(), 2);
        assert!(log[0].accepted);
        assert!(!log[1].accepted);
        assert_eq!(device.accepted_commands().len(), 1);
    }

    #[test]
    fn test_rejection_for_encoding_label() {
        assert_eq!(
            Rejection::for_encoding("Constrict-Index1"),
            Some(Rejection::IndexedAt(ActuatorKind::Constrict, 1))
        );
        assert_eq!(Rejection::for_encoding("linear-position"), Some(Rejection::Positional));
        assert_eq!(Rejection::for_encoding("OriginalVibrate"), Some(Rejection::Combined));
        assert_eq!(Rejection::for_encoding("Suction-Index2"), None);
    }

    #[tokio::test]
    async fn test_index_specific_rejection() {
        let device = SimulatedDevice::indexed_dual();
        device.reject(Rejection::IndexedAt(ActuatorKind::Inflate, 1));

        let at_one = [IndexedEntry::new(1, 0.3, ActuatorKind::Inflate)];
        let at_zero = [IndexedEntry::new(0, 0.3, ActuatorKind::Inflate)];

        assert!(device.indexed_command(&at_one).await.is_err());
        assert!(device.indexed_command(&at_zero).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_after_limit() {
        let device = SimulatedDevice::legacy();
        device.fail_after(2);

        assert!(device.combined_command([0.1, 0.1]).await.is_ok());
        assert!(device.combined_command([0.2, 0.2]).await.is_ok());
        assert_eq!(
            device.combined_command([0.3, 0.3]).await,
            Err(DeviceError::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_attribute_presets() {
        assert!(SimulatedDevice::without_attributes()
            .capability_attributes()
            .await
            .is_none());

        let attrs = SimulatedDevice::indexed_dual()
            .capability_attributes()
            .await
            .unwrap_or_default();
        assert!(attrs.contains_key(&CommandKind::Scalar));
    }
}
