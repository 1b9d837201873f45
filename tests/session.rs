//! End-to-end tests driving a session through JSON tool requests

use std::{sync::Arc, time::Duration};

use haptic_coordinator::{
    config::Config,
    device::{ActuatorKind, IssuedCommand, PositionPoint, Rejection, SimulatedDevice},
    HapticSession, ToolRequest, ToolResponse,
};
use tokio_util::sync::CancellationToken;

async fn open(device: &Arc<SimulatedDevice>) -> HapticSession {
    HapticSession::open(device.clone(), Config::default_config()).await
}

async fn call(session: &mut HapticSession, json: &str) -> ToolResponse {
    let request = ToolRequest::from_json(json).unwrap();
    session.execute(request, CancellationToken::new()).await
}

fn indexed(command: &IssuedCommand) -> (ActuatorKind, u32, f64) {
    match command {
        IssuedCommand::Indexed(entries) => (entries[0].kind, entries[0].index, entries[0].value),
        other => panic!("unexpected command {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_synchronized_combo_json() {
    let device = Arc::new(SimulatedDevice::indexed_dual());
    let mut session = open(&device).await;

    let response = call(
        &mut session,
        r#"{"tool": "combo", "vibration_power": 1.0, "vacuum_intensity": 1.0,
            "duration_ms": 1000, "policy": "synchronized", "steps": 20}"#,
    )
    .await;

    assert!(response.success, "{}", response.summary);
    assert_eq!(response.encoding.as_deref(), Some("Constrict-Index1"));
    assert!(response.notices.is_empty());

    let log = device.commands();
    assert_eq!(log.len(), 42);
    let origin = log[0].at;
    for step in 0..20 {
        let (kind, index, value) = indexed(&log[2 * step].command);
        assert_eq!((kind, index), (ActuatorKind::Vibrate, 0));
        assert!((value - step as f64 / 20.0).abs() < 1e-12);
        assert_eq!(log[2 * step].at - origin, Duration::from_millis(50 * step as u64));

        let (kind, index, _) = indexed(&log[2 * step + 1].command);
        assert_eq!((kind, index), (ActuatorKind::Constrict, 1));
    }
    assert_eq!(indexed(&log[40].command).2, 0.0);
    assert_eq!(indexed(&log[41].command).2, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_independent_on_legacy_carries_notice() {
    let device = Arc::new(SimulatedDevice::legacy());
    let mut session = open(&device).await;

    let response = call(
        &mut session,
        r#"{"tool": "combo", "vibration_power": 0.6, "vacuum_intensity": 0.4,
            "duration_ms": 500, "policy": "independent", "steps": 5}"#,
    )
    .await;

    assert!(response.success, "{}", response.summary);
    assert_eq!(response.notices.len(), 1);
    assert!(response.summary.starts_with("Combo synchronized"));
    assert_eq!(response.encoding.as_deref(), Some("OriginalVibrate"));
    assert!(device
        .accepted_commands()
        .iter()
        .all(|c| matches!(c, IssuedCommand::Combined(_))));
}

#[tokio::test(start_paused = true)]
async fn test_vacuum_falls_back_to_positional() {
    let device = Arc::new(SimulatedDevice::indexed_dual());
    device.reject(Rejection::IndexedAt(ActuatorKind::Constrict, 1));
    let mut session = open(&device).await;

    let response = call(
        &mut session,
        r#"{"tool": "vacuum", "intensity": 0.5, "duration_ms": 200, "pattern": "hold"}"#,
    )
    .await;

    assert!(response.success, "{}", response.summary);
    assert_eq!(response.encoding.as_deref(), Some("Linear-Position"));
    assert!(device
        .accepted_commands()
        .contains(&IssuedCommand::Positional(vec![PositionPoint {
            value: 0.5,
            duration_ms: 100
        }])));
}

#[tokio::test(start_paused = true)]
async fn test_edge_interpolated_restore() {
    let device = Arc::new(SimulatedDevice::indexed_dual());
    let mut session = open(&device).await;

    let response = call(
        &mut session,
        r#"{"tool": "edge", "minimum_level": 0.1, "hold_duration_ms": 10000,
            "restore_duration_ms": 500, "restore_vibration": 0.8, "restore_vacuum": 0.6}"#,
    )
    .await;
    assert!(response.success, "{}", response.summary);
    assert!(response.summary.contains("in 10 steps over 500ms"));

    let log = device.commands();
    // Two drop commands, then ten vibration/vacuum pairs
    assert_eq!(log.len(), 22);
    assert_eq!(indexed(&log[0].command).2, 0.1);
    assert_eq!(indexed(&log[1].command).2, 0.1);

    let origin = log[0].at;
    for k in 0..10 {
        let at = log[2 + 2 * k].at - origin;
        assert_eq!(at, Duration::from_millis(10_000 + 50 * k as u64));
    }
    let (_, _, vibration) = indexed(&log[20].command);
    let (_, _, vacuum) = indexed(&log[21].command);
    assert!((vibration - 0.8).abs() < 1e-9);
    assert!((vacuum - 0.6).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_invocation_stops_device() {
    let device = Arc::new(SimulatedDevice::legacy());
    let mut session = open(&device).await;

    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(330)).await;
        timer.cancel();
    });

    let request = ToolRequest::from_json(
        r#"{"tool": "vibrate", "intensity": 1.0, "duration_ms": 1000, "pattern": "pulse",
            "pulse_interval_ms": 100}"#,
    )
    .unwrap();
    let response = session.execute(request, cancel).await;

    assert!(!response.success);
    assert!(response.summary.contains("cancelled"));

    let accepted = device.accepted_commands();
    // Pulses at 0, 100, 200, 300ms, then the stop
    assert_eq!(accepted.len(), 5);
    assert_eq!(accepted.last(), Some(&IssuedCommand::Combined([0.0, 0.0])));

    // Session keeps working after an abandoned call
    let response = call(&mut session, r#"{"tool": "stop"}"#).await;
    assert!(response.success);
}

#[tokio::test]
async fn test_rejected_parameters_touch_nothing() {
    let device = Arc::new(SimulatedDevice::indexed_dual());
    let mut session = open(&device).await;

    for json in [
        r#"{"tool": "vibrate", "intensity": 0.5, "duration_ms": 100, "pattern": "ramp", "steps": 0}"#,
        r#"{"tool": "vacuum", "intensity": 0.5, "duration_ms": 100, "pattern": "pulse", "pulse_interval_ms": 0}"#,
        r#"{"tool": "combo", "vibration_power": 2.0, "vacuum_intensity": 0.5, "duration_ms": 100}"#,
        r#"{"tool": "set_levels"}"#,
    ] {
        let response = call(&mut session, json).await;
        assert!(!response.success, "{json}");
        assert!(response.summary.contains("rejected"), "{}", response.summary);
    }
    assert!(device.commands().is_empty());
}
