//! Argus situational-awareness console.
//!
//! A headless client for a remote detection backend. The backend emits one
//! detection message per frame tick over a WebSocket, serves a continuous
//! MJPEG feed and a REST incident archive; this crate ingests the telemetry,
//! classifies and scales the detection boxes, paints an annotated overlay
//! aligned with the feed, keeps a bounded operator alert log, and mirrors
//! the incident archive.
//!
//! # Module Structure
//!
//! - `telemetry`: wire format, stream transports, and the reconnecting link
//! - `classify`: person/object split and the asymmetric display gate
//! - `overlay`: coordinate transform, RGBA surface, HUD glyphs, render pass
//! - `alerts`: bounded newest-first operator log
//! - `archive`: incident snapshot, selection state, and poller
//! - `feed`: MJPEG feed tap and preview sink
//! - `health`: backend reachability probe

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod alerts;
pub mod archive;
pub mod classify;
pub mod config;
pub mod feed;
pub mod health;
pub mod overlay;
pub mod telemetry;

pub use alerts::{AlertEntry, AlertLog, Severity, ALERT_LOG_CAPACITY};
pub use archive::{ArchiveClient, ArchiveView, SurveillanceEvent, ARCHIVE_POLL_INTERVAL};
pub use classify::{ContactClass, OBJECT_MIN_CONFIDENCE, PERSON_MIN_CONFIDENCE};
pub use config::ConsoleConfig;
pub use feed::{FeedConfig, FeedFrame, FeedSource, FrameSlot};
pub use health::{HealthProbe, HEALTH_PROBE_INTERVAL};
pub use overlay::{render_overlay, FrameScale, OverlaySurface};
pub use telemetry::{
    DetectionBox, DetectionCounts, DetectionMessage, LinkState, LinkStatus, SharedTelemetry,
    TelemetryLink, WsTransport, RECONNECT_DELAY,
};

/// Milliseconds since the Unix epoch; alert entry ids derive from this.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Poison-tolerant lock. A panicked writer must not take the console down;
/// the shared slots hold plain data that stays usable.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sleep `delay` in short slices, watching the shutdown flag. Returns false
/// when shutdown was requested before the delay elapsed, so pending
/// reconnects and poll timers are abandoned promptly at teardown.
pub(crate) fn sleep_unless_shutdown(delay: Duration, shutdown: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = delay;
    while remaining > Duration::ZERO {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !shutdown.load(Ordering::SeqCst)
}
