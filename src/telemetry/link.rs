//! Telemetry link state machine.
//!
//! The link owns its connection handle and its reconnect delay outright: one
//! `TelemetryLink` runs on one thread, so at any instant there is at most one
//! open connection or one pending reconnect, never both and never two. A
//! dropped connection is retried forever at a fixed cadence; there is no
//! backoff growth and no retry cap.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::alerts::{AlertEntry, AlertLog, Severity};
use crate::{lock, sleep_unless_shutdown};

use super::message::DetectionMessage;
use super::transport::{StreamEvent, TelemetryStream, TelemetryTransport};

/// Fixed delay between a drop and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// State shared between the link thread and its readers (render loop, HUD).
///
/// The latest-message slot is replaced wholesale on every valid tick; no
/// merging, no history. The alert log is appended to only from the link
/// thread and read everywhere else.
#[derive(Clone, Default)]
pub struct SharedTelemetry {
    inner: Arc<TelemetryCell>,
}

#[derive(Default)]
struct TelemetryCell {
    latest: Mutex<Option<DetectionMessage>>,
    alerts: Mutex<AlertLog>,
    link_up: AtomicBool,
}

impl SharedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest fully parsed tick, if any has arrived.
    pub fn latest(&self) -> Option<DetectionMessage> {
        lock(&self.inner.latest).clone()
    }

    /// True while the link is `Connected`.
    pub fn link_up(&self) -> bool {
        self.inner.link_up.load(Ordering::SeqCst)
    }

    /// Newest-first copy of the alert log.
    pub fn alerts(&self) -> Vec<AlertEntry> {
        lock(&self.inner.alerts).iter().cloned().collect()
    }

    pub fn push_alert(&self, severity: Severity, message: impl Into<String>) {
        lock(&self.inner.alerts).push(severity, message);
    }

    fn store(&self, msg: DetectionMessage) {
        *lock(&self.inner.latest) = Some(msg);
    }

    fn set_link_up(&self, up: bool) {
        self.inner.link_up.store(up, Ordering::SeqCst);
    }

    fn record_threats(&self, threats: &[String]) {
        lock(&self.inner.alerts).record_threats(threats);
    }
}

/// The connection-resilience state machine.
pub struct TelemetryLink {
    transport: Box<dyn TelemetryTransport>,
    stream: Option<Box<dyn TelemetryStream>>,
    state: LinkState,
    shared: SharedTelemetry,
}

impl TelemetryLink {
    pub fn new(transport: Box<dyn TelemetryTransport>, shared: SharedTelemetry) -> Self {
        Self {
            transport,
            stream: None,
            state: LinkState::Disconnected,
            shared,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Disconnected -> Connecting -> Connected, or back to Disconnected when
    /// the attempt fails. Returns true when the link came up.
    pub fn connect(&mut self) -> bool {
        self.state = LinkState::Connecting;
        match self.transport.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = LinkState::Connected;
                self.shared.set_link_up(true);
                self.shared
                    .push_alert(Severity::Info, "telemetry uplink established");
                log::info!("telemetry link up ({})", self.transport.name());
                true
            }
            Err(e) => {
                log::error!("telemetry connect failed: {:#}", e);
                self.drop_link("telemetry uplink unavailable, retrying");
                false
            }
        }
    }

    /// Process one inbound event while Connected. Returns false once the
    /// stream ended and the link moved back to Disconnected.
    pub fn pump(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.next_event() {
            Ok(StreamEvent::Message(payload)) => {
                self.handle_payload(&payload);
                true
            }
            Ok(StreamEvent::Idle) => true,
            Ok(StreamEvent::Closed) => {
                log::error!("telemetry stream closed by peer");
                self.drop_link("telemetry uplink lost, reconnect scheduled");
                false
            }
            Err(e) => {
                log::error!("telemetry stream error: {:#}", e);
                self.drop_link("telemetry uplink lost, reconnect scheduled");
                false
            }
        }
    }

    /// A malformed tick is dropped whole; the previous message stays current
    /// and no state changes.
    fn handle_payload(&mut self, payload: &str) {
        match DetectionMessage::from_json(payload) {
            Ok(msg) => {
                let threats = msg.threats.clone();
                self.shared.store(msg);
                self.shared.record_threats(&threats);
            }
            Err(e) => log::debug!("dropping malformed tick: {}", e),
        }
    }

    fn drop_link(&mut self, alert: &str) {
        self.stream = None;
        self.state = LinkState::Disconnected;
        self.shared.set_link_up(false);
        self.shared.push_alert(Severity::Error, alert);
    }

    /// Explicit teardown. Drops the connection handle and flips the
    /// indicator; no alert, no reconnect, no further transitions.
    pub fn close(&mut self) {
        self.stream = None;
        self.state = LinkState::Disconnected;
        self.shared.set_link_up(false);
    }

    /// Drive the link until shutdown: connect, pump until drop, then wait
    /// out the fixed delay and reconnect. The delay is slept in short slices
    /// that observe the shutdown flag, so teardown cancels a pending
    /// reconnect promptly instead of letting it fire.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            if self.connect() {
                while !shutdown.load(Ordering::SeqCst) && self.pump() {}
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            if !sleep_unless_shutdown(RECONNECT_DELAY, shutdown) {
                break;
            }
        }
        self.close();
    }
}

/// Handle to a running link thread. `stop` raises the shutdown flag first,
/// then joins, so no transition can happen after it returns.
pub struct LinkHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl LinkHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("telemetry link thread panicked"))?;
        }
        Ok(())
    }
}

/// Spawn the link thread over the given transport.
pub fn spawn_link(transport: Box<dyn TelemetryTransport>, shared: SharedTelemetry) -> LinkHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    let join = std::thread::spawn(move || {
        let mut link = TelemetryLink::new(transport, shared);
        link.run(&shutdown_thread);
    });
    LinkHandle {
        shutdown,
        join: Some(join),
    }
}
