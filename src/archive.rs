//! Incident archive client.
//!
//! The backend owns incident persistence; the console keeps a read-only,
//! periodically refreshed snapshot plus an optional selected record for
//! detail display. A failed refresh keeps the stale snapshot and is logged
//! diagnostically only, never surfaced into the live overlay state.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use url::Url;

use crate::telemetry::DetectionBox;
use crate::{lock, sleep_unless_shutdown};

/// Snapshot refresh cadence.
pub const ARCHIVE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Per-request timeout for archive fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

/// One recorded incident, as served by the backend.
#[derive(Clone, Debug, Deserialize)]
pub struct SurveillanceEvent {
    pub id: i64,

    /// ISO-8601 capture timestamp.
    pub timestamp: String,

    /// Incident category, e.g. `WEAPON_DETECTED`, `PERSON_WITH_WEAPON`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub confidence: f64,

    /// Relative path of the stored evidence still.
    #[serde(default)]
    pub image_path: String,

    /// JSON-encoded list of detection labels.
    #[serde(default)]
    pub labels: String,

    /// JSON-encoded list of recorded boxes (same shape as live boxes).
    #[serde(default)]
    pub bboxes: String,
}

impl SurveillanceEvent {
    /// Decode the JSON-in-string label list.
    pub fn decode_labels(&self) -> Result<Vec<String>> {
        serde_json::from_str(&self.labels).context("decode event labels")
    }

    /// Decode the JSON-in-string recorded boxes.
    pub fn decode_boxes(&self) -> Result<Vec<DetectionBox>> {
        serde_json::from_str(&self.bboxes).context("decode event boxes")
    }

    /// Evidence still URL, cache-busted with the event timestamp so a reused
    /// path is always fetched fresh.
    pub fn evidence_url(&self, base_url: &str) -> Result<String> {
        let base = Url::parse(base_url).context("parse archive base url")?;
        let mut url = base
            .join(&format!("images/{}", self.image_path))
            .context("join evidence image path")?;
        url.query_pairs_mut().append_pair("t", &self.timestamp);
        Ok(url.into())
    }

    /// Human-readable variant of the incident category.
    pub fn kind_display(&self) -> String {
        self.kind.replace('_', " ")
    }
}

/// Read-only HTTP client for the archive endpoints.
pub struct ArchiveClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ArchiveClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn get_body(&self, url: &str) -> Result<String> {
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("fetch {}", url))?;
        let mut body = String::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_string(&mut body)
            .context("read archive response")?;
        Ok(body)
    }

    /// Fetch the full ordered incident list.
    pub fn fetch_events(&self) -> Result<Vec<SurveillanceEvent>> {
        let body = self.get_body(&self.endpoint("events"))?;
        serde_json::from_str(&body).context("decode incident list")
    }

    /// Fetch one incident by id.
    pub fn fetch_event(&self, id: i64) -> Result<SurveillanceEvent> {
        let body = self.get_body(&self.endpoint(&format!("events/{}", id)))?;
        serde_json::from_str(&body).context("decode incident")
    }

    /// Download the evidence still for an incident.
    pub fn fetch_evidence_image(&self, event: &SurveillanceEvent) -> Result<Vec<u8>> {
        let url = event.evidence_url(&self.base_url)?;
        let response = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("fetch {}", url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)
            .context("read evidence image")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty evidence image"));
        }
        Ok(bytes)
    }
}

/// Local snapshot of the archive plus independent selection state.
#[derive(Debug, Default)]
pub struct ArchiveView {
    events: Vec<SurveillanceEvent>,
    selected: Option<SurveillanceEvent>,
}

impl ArchiveView {
    /// Current snapshot, backend order preserved.
    pub fn events(&self) -> &[SurveillanceEvent] {
        &self.events
    }

    /// Replace the snapshot wholesale on success. On failure the stale
    /// snapshot stays; the error goes to the diagnostic log only.
    pub fn apply_refresh(&mut self, refresh: Result<Vec<SurveillanceEvent>>) {
        match refresh {
            Ok(events) => self.events = events,
            Err(e) => log::warn!(
                "archive refresh failed, keeping {} stale records: {:#}",
                self.events.len(),
                e
            ),
        }
    }

    /// Select a record for detail display. The selection owns its copy, so
    /// later refreshes never invalidate it; only [`ArchiveView::clear_selection`]
    /// releases it.
    pub fn select(&mut self, id: i64) -> bool {
        match self.events.iter().find(|ev| ev.id == id) {
            Some(ev) => {
                self.selected = Some(ev.clone());
                true
            }
            None => false,
        }
    }

    pub fn selected(&self) -> Option<&SurveillanceEvent> {
        self.selected.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }
}

/// Handle to the background snapshot poller.
pub struct PollerHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("archive poller thread panicked"))?;
        }
        Ok(())
    }
}

/// Refresh the shared view immediately, then every [`ARCHIVE_POLL_INTERVAL`].
pub fn spawn_poller(client: ArchiveClient, view: Arc<Mutex<ArchiveView>>) -> PollerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    let join = std::thread::spawn(move || loop {
        let refresh = client.fetch_events();
        lock(&view).apply_refresh(refresh);
        if !sleep_unless_shutdown(ARCHIVE_POLL_INTERVAL, &shutdown_thread) {
            break;
        }
    });
    PollerHandle {
        shutdown,
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: i64) -> SurveillanceEvent {
        SurveillanceEvent {
            id,
            timestamp: "2025-09-10T14:03:07.412000".to_string(),
            kind: "WEAPON_DETECTED".to_string(),
            confidence: 0.82,
            image_path: format!("incident_{}.jpg", id),
            labels: r#"["[GUN/SPEC] 0.82", "[PERSON/GEN] 0.91"]"#.to_string(),
            bboxes: r#"[{"cls": 3, "label": "[GUN/SPEC] 0.82", "conf": 0.82,
                         "x1": 10.0, "y1": 12.0, "x2": 44.0, "y2": 31.0}]"#
                .to_string(),
        }
    }

    #[test]
    fn decode_labels_and_boxes() {
        let ev = event(1);
        let labels = ev.decode_labels().unwrap();
        assert_eq!(labels.len(), 2);
        let boxes = ev.decode_boxes().unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].cls, 3);
        assert!((boxes[0].conf - 0.82).abs() < 1e-6);
    }

    #[test]
    fn undecodable_fields_error_instead_of_panicking() {
        let mut ev = event(1);
        ev.labels = "not json".to_string();
        ev.bboxes.clear();
        assert!(ev.decode_labels().is_err());
        assert!(ev.decode_boxes().is_err());
    }

    #[test]
    fn evidence_url_is_cache_busted() {
        let ev = event(7);
        let url = ev.evidence_url("http://127.0.0.1:8000").unwrap();
        assert!(url.starts_with("http://127.0.0.1:8000/images/incident_7.jpg?t="));
        assert!(url.contains("2025-09-10T14"));
    }

    #[test]
    fn failed_refresh_keeps_stale_snapshot() {
        let mut view = ArchiveView::default();
        view.apply_refresh(Ok(vec![event(1), event(2)]));
        assert_eq!(view.events().len(), 2);
        view.apply_refresh(Err(anyhow!("backend unreachable")));
        assert_eq!(view.events().len(), 2);
    }

    #[test]
    fn successful_refresh_replaces_wholesale() {
        let mut view = ArchiveView::default();
        view.apply_refresh(Ok(vec![event(1), event(2)]));
        view.apply_refresh(Ok(vec![event(3)]));
        assert_eq!(view.events().len(), 1);
        assert_eq!(view.events()[0].id, 3);
    }

    #[test]
    fn selection_survives_refresh_that_drops_the_record() {
        let mut view = ArchiveView::default();
        view.apply_refresh(Ok(vec![event(1), event(2)]));
        assert!(view.select(2));
        view.apply_refresh(Ok(vec![event(1)]));
        // The operator closes the detail view explicitly; a refresh never
        // clears it for them.
        assert_eq!(view.selected().unwrap().id, 2);
        view.clear_selection();
        assert!(view.selected().is_none());
    }

    #[test]
    fn selecting_a_missing_record_is_refused() {
        let mut view = ArchiveView::default();
        view.apply_refresh(Ok(vec![event(1)]));
        assert!(!view.select(99));
        assert!(view.selected().is_none());
    }
}
