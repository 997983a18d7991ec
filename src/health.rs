//! Backend reachability probe.
//!
//! A small independent concern: every five seconds, one idempotent GET
//! against the backend status endpoint flips a boolean indicator. The probe
//! does not coordinate with the telemetry link's own reconnect machinery.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::sleep_unless_shutdown;

/// Probe cadence.
pub const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(5);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HealthProbe {
    base_url: String,
    agent: ureq::Agent,
}

impl HealthProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    /// One probe round-trip: reachable iff the status endpoint answers with
    /// HTTP success. The response body is not interpreted.
    pub fn check(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        match self.agent.get(&url).call() {
            Ok(_) => true,
            Err(e) => {
                log::debug!("health probe failed: {}", e);
                false
            }
        }
    }
}

/// Handle to the background probe thread.
pub struct ProbeHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("health probe thread panicked"))?;
        }
        Ok(())
    }
}

/// Probe immediately, then every [`HEALTH_PROBE_INTERVAL`], publishing the
/// binary result into the shared indicator.
pub fn spawn_probe(probe: HealthProbe, reachable: Arc<AtomicBool>) -> ProbeHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    let join = std::thread::spawn(move || loop {
        let up = probe.check();
        let was = reachable.swap(up, Ordering::SeqCst);
        if was != up {
            if up {
                log::info!("backend reachable");
            } else {
                log::warn!("backend unreachable");
            }
        }
        if !sleep_unless_shutdown(HEALTH_PROBE_INTERVAL, &shutdown_thread) {
            break;
        }
    });
    ProbeHandle {
        shutdown,
        join: Some(join),
    }
}
