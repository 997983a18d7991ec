//! Telemetry ingestion: wire format, stream transports, and the
//! connection-resilience link.

pub mod link;
pub mod message;
pub mod transport;

pub use link::{spawn_link, LinkHandle, LinkState, SharedTelemetry, TelemetryLink, RECONNECT_DELAY};
pub use message::{
    DebugInfo, DetectionBox, DetectionCounts, DetectionMessage, LinkStatus, DEFAULT_FRAME_DIMS,
};
pub use transport::{StreamEvent, TelemetryStream, TelemetryTransport, WsTransport};
