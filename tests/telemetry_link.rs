//! Link resilience tests: reconnect scheduling, teardown, and slot
//! semantics, driven end to end through the spawned link thread with
//! scripted transports standing in for the wire.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use argus_console::telemetry::{
    spawn_link, SharedTelemetry, StreamEvent, TelemetryStream, TelemetryTransport, RECONNECT_DELAY,
};

/// A stream that replays canned events, then reports an idle tick forever so
/// the link stays up until told otherwise.
struct ScriptedStream {
    events: VecDeque<Result<StreamEvent>>,
    hold_open: bool,
}

impl TelemetryStream for ScriptedStream {
    fn next_event(&mut self) -> Result<StreamEvent> {
        match self.events.pop_front() {
            Some(event) => event,
            None if self.hold_open => {
                std::thread::sleep(Duration::from_millis(10));
                Ok(StreamEvent::Idle)
            }
            None => Ok(StreamEvent::Closed),
        }
    }
}

struct ScriptedTransport {
    sessions: Mutex<VecDeque<ScriptedStream>>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(sessions: Vec<ScriptedStream>) -> (Self, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sessions: Mutex::new(sessions.into()),
                opens: opens.clone(),
            },
            opens,
        )
    }
}

impl TelemetryTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&mut self) -> Result<Box<dyn TelemetryStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.sessions.lock().unwrap().pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(anyhow!("connection refused")),
        }
    }
}

fn message(timestamp: &str) -> Result<StreamEvent> {
    Ok(StreamEvent::Message(format!(
        r#"{{"timestamp": "{}", "status": "CONNECTED", "counts": {{"persons": 1, "weapons": 0}}}}"#,
        timestamp
    )))
}

fn session(events: Vec<Result<StreamEvent>>, hold_open: bool) -> ScriptedStream {
    ScriptedStream {
        events: events.into(),
        hold_open,
    }
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn messages_flow_end_to_end() {
    let shared = SharedTelemetry::new();
    let (transport, _opens) =
        ScriptedTransport::new(vec![session(vec![message("t1"), message("t2")], true)]);

    let handle = spawn_link(Box::new(transport), shared.clone());
    assert!(wait_until(Duration::from_secs(2), || {
        shared.latest().map(|m| m.timestamp == "t2").unwrap_or(false)
    }));
    assert!(shared.link_up());
    handle.stop().unwrap();
    assert!(!shared.link_up());
}

#[test]
fn drop_schedules_exactly_one_reconnect_after_the_fixed_delay() {
    let shared = SharedTelemetry::new();
    // First session ends immediately; second holds the link open.
    let (transport, opens) = ScriptedTransport::new(vec![
        session(vec![message("first")], false),
        session(vec![message("second")], true),
    ]);

    let handle = spawn_link(Box::new(transport), shared.clone());

    // The first connection comes up and drains.
    assert!(wait_until(Duration::from_secs(2), || {
        shared.latest().is_some()
    }));
    assert!(wait_until(Duration::from_secs(2), || !shared.link_up()));
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    // While the fixed delay is pending, no second attempt is outstanding.
    std::thread::sleep(RECONNECT_DELAY / 2);
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    // After the delay, exactly one reconnect fires and the link comes back.
    assert!(wait_until(RECONNECT_DELAY + Duration::from_secs(2), || {
        opens.load(Ordering::SeqCst) == 2
    }));
    assert!(wait_until(Duration::from_secs(2), || shared.link_up()));
    assert_eq!(
        shared.latest().map(|m| m.timestamp),
        Some("second".to_string())
    );
    assert_eq!(opens.load(Ordering::SeqCst), 2);

    handle.stop().unwrap();
}

#[test]
fn repeated_refusals_retry_one_at_a_time() {
    let shared = SharedTelemetry::new();
    let (transport, opens) = ScriptedTransport::new(vec![]);

    let handle = spawn_link(Box::new(transport), shared.clone());

    assert!(wait_until(Duration::from_secs(1), || {
        opens.load(Ordering::SeqCst) == 1
    }));
    // Only the pending delay exists; no piled-up attempts.
    std::thread::sleep(RECONNECT_DELAY / 2);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(wait_until(RECONNECT_DELAY + Duration::from_secs(2), || {
        opens.load(Ordering::SeqCst) == 2
    }));
    assert!(!shared.link_up());

    handle.stop().unwrap();
}

#[test]
fn teardown_cancels_a_pending_reconnect() {
    let shared = SharedTelemetry::new();
    let (transport, opens) = ScriptedTransport::new(vec![]);

    let handle = spawn_link(Box::new(transport), shared.clone());
    assert!(wait_until(Duration::from_secs(1), || {
        opens.load(Ordering::SeqCst) == 1
    }));

    // Stop lands inside the reconnect delay; the join must return well
    // before the delay would have elapsed, and no further attempt fires.
    let start = Instant::now();
    handle.stop().unwrap();
    assert!(start.elapsed() < RECONNECT_DELAY);

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[test]
fn malformed_payload_does_not_disturb_the_link() {
    let shared = SharedTelemetry::new();
    let (transport, opens) = ScriptedTransport::new(vec![session(
        vec![
            message("valid"),
            Ok(StreamEvent::Message("][ not json".to_string())),
            Ok(StreamEvent::Message(
                // Valid JSON, invalid tick: empty label box.
                r#"{"boxes": [{"label": "", "conf": 0.5, "x1": 0, "y1": 0, "x2": 1, "y2": 1}]}"#
                    .to_string(),
            )),
        ],
        true,
    )]);

    let handle = spawn_link(Box::new(transport), shared.clone());
    assert!(wait_until(Duration::from_secs(2), || {
        shared.latest().is_some()
    }));
    // Give the two bad ticks time to be consumed and dropped.
    std::thread::sleep(Duration::from_millis(200));

    assert_eq!(shared.latest().unwrap().timestamp, "valid");
    assert!(shared.link_up());
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    handle.stop().unwrap();
}

#[test]
fn connection_transitions_reach_the_alert_log() {
    let shared = SharedTelemetry::new();
    let (transport, _opens) =
        ScriptedTransport::new(vec![session(vec![message("only")], false)]);

    let handle = spawn_link(Box::new(transport), shared.clone());
    assert!(wait_until(Duration::from_secs(2), || !shared.link_up()
        && shared.alerts().len() >= 2));
    handle.stop().unwrap();

    let alerts = shared.alerts();
    // Newest first: the drop, then the successful open.
    assert!(alerts[0].message.contains("uplink lost"));
    assert!(alerts[1].message.contains("uplink established"));
}
