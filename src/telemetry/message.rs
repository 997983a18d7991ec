//! Detection telemetry wire format.
//!
//! One `DetectionMessage` arrives per frame tick over the telemetry stream.
//! Parsing is strict: a tick that fails to decode, or that carries a box
//! violating the wire invariants, is dropped whole and the previous message
//! stays current. Nothing downstream ever sees a partial tick.

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Frame dimensions assumed when the backend omits `frame_dims` or reports
/// them as zero (the capture default is QVGA).
pub const DEFAULT_FRAME_DIMS: (u32, u32) = (320, 240);

/// One detected object in one frame, in source-frame pixel space.
#[derive(Clone, Debug, Deserialize)]
pub struct DetectionBox {
    /// Numeric model class id (informational).
    #[serde(default)]
    pub cls: i64,

    /// Display label, pre-formatted by the backend: class name, source tag
    /// and confidence already rendered (e.g. `[GUN/SPEC] 0.87`). The console
    /// uppercases it for display and does no further formatting.
    pub label: String,

    /// Detection confidence (0.0-1.0).
    pub conf: f32,

    /// Top-left corner.
    pub x1: f32,
    pub y1: f32,

    /// Bottom-right corner. `x2 >= x1` and `y2 >= y1` are assumed but not
    /// enforced; rendering clamps inverted boxes to zero area.
    pub x2: f32,
    pub y2: f32,
}

/// Aggregate tallies computed by the backend.
///
/// These are authoritative display values. They are deliberately decoupled
/// from the console's own display gate and are never recomputed from the
/// filtered box set.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DetectionCounts {
    #[serde(default)]
    pub persons: u32,
    #[serde(default)]
    pub weapons: u32,
}

/// Stream status reported by the backend inside each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkStatus {
    /// Detector running and frames flowing (`CONNECTED`).
    Synced,
    /// Backend is still loading model weights (`MODEL_SYNC`).
    ModelSyncing,
    /// Backend lost its own camera uplink (`OFFLINE`).
    LinkDown,
    /// Frames stalled (`UPLINK_STALL`), plus anything unrecognized such as
    /// the backend's transient `INITIALIZING`.
    #[default]
    Stalled,
}

impl LinkStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "CONNECTED" => LinkStatus::Synced,
            "MODEL_SYNC" => LinkStatus::ModelSyncing,
            "OFFLINE" => LinkStatus::LinkDown,
            _ => LinkStatus::Stalled,
        }
    }

    /// Short operator-facing status word.
    pub fn label(&self) -> &'static str {
        match self {
            LinkStatus::Synced => "SYNCED",
            LinkStatus::ModelSyncing => "MODEL SYNC",
            LinkStatus::LinkDown => "LINK DOWN",
            LinkStatus::Stalled => "STALLED",
        }
    }
}

impl<'de> Deserialize<'de> for LinkStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(LinkStatus::from_wire(&raw))
    }
}

/// Diagnostic block attached to each tick.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DebugInfo {
    /// Model identifier advertised by the backend, displayed verbatim.
    #[serde(default)]
    pub model_used: String,
}

/// One telemetry tick.
///
/// Instantiated fresh on each received tick, replaces the prior message as
/// the sole state driving the current render, and is never mutated after
/// receipt. Only the most recent message is retained.
#[derive(Clone, Debug, Deserialize)]
pub struct DetectionMessage {
    /// Backend capture timestamp (opaque string, informational).
    #[serde(default)]
    pub timestamp: String,

    /// Ingest rate reported by the backend (informational).
    #[serde(default)]
    pub fps: f32,

    #[serde(default)]
    pub counts: DetectionCounts,

    /// Distinct threat identifiers raised this tick, e.g. `WEAPON_DETECTED`,
    /// `PERSON_WITH_WEAPON`, `SUSPICIOUS_GROUP`. May be empty.
    #[serde(default)]
    pub threats: Vec<String>,

    #[serde(default)]
    pub boxes: Vec<DetectionBox>,

    #[serde(default)]
    pub status: LinkStatus,

    /// Dimensions of the frame the boxes are expressed in. Absent or zero
    /// means the capture default applies; use [`DetectionMessage::source_dims`].
    #[serde(default)]
    pub frame_dims: Option<(u32, u32)>,

    #[serde(default)]
    pub debug: DebugInfo,
}

impl DetectionMessage {
    /// Parse one telemetry tick.
    ///
    /// Returns an error if the JSON is malformed or any box violates the
    /// wire invariants (empty label, non-finite confidence). Callers drop
    /// the tick and keep the previous message current.
    pub fn from_json(payload: &str) -> Result<Self> {
        let msg: DetectionMessage =
            serde_json::from_str(payload).map_err(|e| anyhow!("parse error: {}", e))?;
        for bx in &msg.boxes {
            if bx.label.is_empty() {
                return Err(anyhow!("box with empty label"));
            }
            if !bx.conf.is_finite() {
                return Err(anyhow!("box '{}' with non-finite confidence", bx.label));
            }
        }
        Ok(msg)
    }

    /// Source frame dimensions, with the capture default applied when the
    /// backend omitted them or reported zero on either axis.
    pub fn source_dims(&self) -> (u32, u32) {
        match self.frame_dims {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            _ => DEFAULT_FRAME_DIMS,
        }
    }
}
