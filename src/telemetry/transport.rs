//! Telemetry stream transports.
//!
//! `TelemetryTransport` is the seam between the link state machine and the
//! wire. The production transport speaks WebSocket; tests plug in scripted
//! transports that replay canned event sequences.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

/// Read timeout on the underlying socket. Keeps the link thread responsive
/// to shutdown while it waits between frames.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// One inbound occurrence on a telemetry stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A complete serialized detection tick.
    Message(String),
    /// Read timeout expired with nothing inbound. Lets the caller observe
    /// its shutdown flag between frames; not a connection drop.
    Idle,
    /// Orderly end of stream.
    Closed,
}

/// Factory for telemetry streams. `open` blocks until the connection is
/// established or failed.
pub trait TelemetryTransport: Send {
    /// Transport identifier for logs.
    fn name(&self) -> &'static str;

    /// Open one streaming connection.
    fn open(&mut self) -> Result<Box<dyn TelemetryStream>>;
}

/// A live streaming connection delivering detection ticks. Dropping the
/// stream closes the connection.
pub trait TelemetryStream: Send {
    /// Block for the next event. `Err` means the connection dropped.
    fn next_event(&mut self) -> Result<StreamEvent>;
}

/// Blocking WebSocket transport. The client never sends application frames
/// on this channel; control frames are handled inside tungstenite.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl TelemetryTransport for WsTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn open(&mut self) -> Result<Box<dyn TelemetryStream>> {
        let (socket, _response) = connect(self.url.as_str())
            .with_context(|| format!("connect telemetry stream {}", self.url))?;
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream
                .set_read_timeout(Some(READ_TIMEOUT))
                .context("set telemetry read timeout")?;
        }
        Ok(Box::new(WsStream { socket }))
    }
}

struct WsStream {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl TelemetryStream for WsStream {
    fn next_event(&mut self) -> Result<StreamEvent> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(StreamEvent::Message(text)),
                // Ping/pong bookkeeping happens inside tungstenite; binary
                // frames are not part of this protocol.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_)) => continue,
                Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => return Ok(StreamEvent::Closed),
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(StreamEvent::Idle);
                }
                Err(e) => return Err(e).context("telemetry stream read"),
            }
        }
    }
}
