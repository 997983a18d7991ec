//! Live video feed tap.
//!
//! Reads the backend's multipart MJPEG stream, decodes each JPEG in memory
//! and publishes the most recent frame for the render pass. The console
//! never interprets feed bytes beyond decoding for display; what matters
//! downstream is the frame's pixel dimensions, which the render loop re-reads
//! on every pass rather than caching.
//!
//! Also hosts the preview sink: the composited frame+overlay encoded as JPEG
//! and atomically published to a configured path.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::{lock, sleep_unless_shutdown};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Delay before reconnecting a dropped feed.
const FEED_RETRY_DELAY: Duration = Duration::from_secs(3);

/// JPEG quality of the published preview.
const PREVIEW_QUALITY: u8 = 85;

/// Configuration for the feed tap.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Stream URL: multipart MJPEG, or a single-JPEG snapshot endpoint.
    pub url: String,
    /// Target decode rate (frames per second); the tap decimates to this.
    pub target_fps: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/video".to_string(),
            target_fps: 15,
        }
    }
}

/// One decoded RGB frame.
#[derive(Clone)]
pub struct FeedFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Latest-frame slot shared with the render loop. Replaced wholesale per
/// frame; cleared when the feed drops so a stale image never lingers.
pub type FrameSlot = Arc<Mutex<Option<FeedFrame>>>;

/// Statistics for a feed source.
#[derive(Clone, Debug)]
pub struct FeedStats {
    pub frames_captured: u64,
    pub source: String,
}

enum FeedStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

/// MJPEG-over-HTTP frame source.
pub struct FeedSource {
    config: FeedConfig,
    stream: Option<FeedStream>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

impl FeedSource {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    /// Connect to the feed. A multipart content type means a continuous
    /// MJPEG stream; anything else is treated as a snapshot endpoint that is
    /// re-fetched per frame.
    pub fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url)
            .call()
            .context("connect to video feed")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(FeedStream::Mjpeg(MjpegStream::new(reader)));
        } else {
            self.stream = Some(FeedStream::SingleJpeg);
        }
        self.connected_at = Some(Instant::now());
        Ok(())
    }

    /// Capture and decode the next frame, decimated to the target rate.
    pub fn next_frame(&mut self) -> Result<FeedFrame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("feed source not connected; call connect() first"))?;
        let min_interval = frame_interval(self.config.target_fps);
        loop {
            let jpeg_bytes = match stream {
                FeedStream::Mjpeg(stream) => stream.read_next_jpeg(),
                FeedStream::SingleJpeg => fetch_single_jpeg(&self.config.url),
            }?;

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let frame = decode_jpeg(&jpeg_bytes)?;
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            return Ok(frame);
        }
    }

    /// Check if the feed is delivering frames at a plausible rate.
    pub fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<FeedFrame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(FeedFrame {
        pixels: rgb.into_raw(),
        width,
        height,
    })
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut start = None;
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == 0xFF && buffer[i + 1] == 0xD8 {
            start = Some(i);
            break;
        }
        i += 1;
    }
    let start = start?;
    let mut j = start + 2;
    while j + 1 < buffer.len() {
        if buffer[j] == 0xFF && buffer[j + 1] == 0xD9 {
            return Some((start, j + 2));
        }
        j += 1;
    }
    None
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

/// Handle to the background feed thread.
pub struct FeedHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("video feed thread panicked"))?;
        }
        Ok(())
    }
}

/// Run the tap on its own thread: connect, decode, publish into the slot,
/// and reconnect after a short delay when the stream drops.
pub fn spawn_feed(config: FeedConfig, slot: FrameSlot) -> FeedHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    let join = std::thread::spawn(move || {
        while !shutdown_thread.load(Ordering::SeqCst) {
            let mut source = FeedSource::new(config.clone());
            match source.connect() {
                Ok(()) => {
                    log::info!("video feed connected: {}", config.url);
                    while !shutdown_thread.load(Ordering::SeqCst) {
                        match source.next_frame() {
                            Ok(frame) => {
                                *lock(&slot) = Some(frame);
                            }
                            Err(e) => {
                                log::warn!("video feed dropped: {:#}", e);
                                *lock(&slot) = None;
                                break;
                            }
                        }
                    }
                }
                Err(e) => log::warn!("video feed connect failed: {:#}", e),
            }
            if !sleep_unless_shutdown(FEED_RETRY_DELAY, &shutdown_thread) {
                break;
            }
        }
    });
    FeedHandle {
        shutdown,
        join: Some(join),
    }
}

/// Atomically publish the composited preview: encode to a scratch file next
/// to the target, then rename over it, so an external viewer never reads a
/// torn image.
pub fn write_preview(path: &Path, frame: &FeedFrame) -> Result<()> {
    let encoded = encode_jpeg(frame)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &encoded).with_context(|| format!("write preview {}", tmp.display()))?;
    std::fs::rename(&tmp, path).context("publish preview")?;
    Ok(())
}

fn encode_jpeg(frame: &FeedFrame) -> Result<Vec<u8>> {
    let img =
        image::RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, PREVIEW_QUALITY);
    encoder.encode_image(&img).context("encode preview jpeg")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_bounds_found_inside_multipart_noise() {
        let mut data = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        let jpeg_start = data.len();
        data.extend_from_slice(&[0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9]);
        let jpeg_end = data.len();
        data.extend_from_slice(b"\r\n--frame");
        assert_eq!(find_jpeg_bounds(&data), Some((jpeg_start, jpeg_end)));
    }

    #[test]
    fn incomplete_jpeg_waits_for_more_data() {
        let data = [0xFF, 0xD8, 0x01, 0x02];
        assert_eq!(find_jpeg_bounds(&data), None);
        assert_eq!(find_jpeg_bounds(b"no markers here"), None);
    }

    #[test]
    fn frame_interval_handles_zero_fps() {
        assert_eq!(frame_interval(0), Duration::from_millis(0));
        assert_eq!(frame_interval(10), Duration::from_millis(100));
    }

    #[test]
    fn preview_writes_are_atomic_renames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.jpg");
        let frame = FeedFrame {
            pixels: vec![128; 8 * 8 * 3],
            width: 8,
            height: 8,
        };
        write_preview(&path, &frame).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        // Published file round-trips through the decoder.
        let bytes = std::fs::read(&path).unwrap();
        let decoded = decode_jpeg(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 8));
    }

    #[test]
    fn mismatched_frame_buffer_is_rejected() {
        let frame = FeedFrame {
            pixels: vec![0; 10],
            width: 8,
            height: 8,
        };
        assert!(encode_jpeg(&frame).is_err());
    }
}
