//! argus_console - live situational-awareness console
//!
//! This daemon:
//! 1. Opens the telemetry WebSocket and keeps it alive through drops
//! 2. Taps the MJPEG feed for frames and their current pixel dimensions
//! 3. Filters, scales and paints detection boxes over each frame
//! 4. Maintains the operator alert log and the backend health indicator
//! 5. Polls the incident archive snapshot
//! 6. Optionally publishes the annotated frame as a preview JPEG

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use argus_console::archive::{spawn_poller, ArchiveClient, ArchiveView};
use argus_console::config::ConsoleConfig;
use argus_console::feed::{self, spawn_feed, FeedConfig, FrameSlot};
use argus_console::health::{spawn_probe, HealthProbe};
use argus_console::lock;
use argus_console::overlay::{render_overlay, OverlaySurface};
use argus_console::telemetry::{spawn_link, SharedTelemetry, WsTransport};

#[path = "../ui.rs"]
mod ui;

/// Cadence of the render loop. Every pass re-reads the latest frame and the
/// latest message; nothing is cached between passes.
const RENDER_INTERVAL: Duration = Duration::from_millis(50);

/// Cadence of the periodic link/feed health log line.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Argus live situational-awareness console")]
struct Args {
    /// UI mode for the stderr status line (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = ConsoleConfig::load()?;

    log::info!("argus console starting");
    log::info!("  backend:   {}", cfg.base_url);
    log::info!("  telemetry: {}", cfg.telemetry_url);
    log::info!("  feed:      {}", cfg.feed.url);
    match &cfg.preview_path {
        Some(path) => log::info!("  preview:   {}", path.display()),
        None => log::info!("  preview:   disabled"),
    }

    let telemetry = SharedTelemetry::new();
    let frames: FrameSlot = Arc::new(Mutex::new(None));
    let archive = Arc::new(Mutex::new(ArchiveView::default()));
    let backend_reachable = Arc::new(AtomicBool::new(false));

    let link = spawn_link(
        Box::new(WsTransport::new(cfg.telemetry_url.clone())),
        telemetry.clone(),
    );
    let feed_handle = spawn_feed(
        FeedConfig {
            url: cfg.feed.url.clone(),
            target_fps: cfg.feed.target_fps,
        },
        frames.clone(),
    );
    let poller = spawn_poller(ArchiveClient::new(cfg.base_url.clone()), archive.clone());
    let probe = spawn_probe(
        HealthProbe::new(cfg.base_url.clone()),
        backend_reachable.clone(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("error setting Ctrl-C handler");
    }

    let is_tty = std::io::stderr().is_terminal();
    let status = ui::Ui::from_args(Some(&args.ui), is_tty, false).status_line();

    let mut surface = OverlaySurface::new(0, 0);
    let mut last_health_log = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        render_pass(
            &telemetry,
            &frames,
            &mut surface,
            cfg.preview_path.as_deref(),
        );
        status.set(status_message(&telemetry, &backend_reachable, &archive));

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let model = telemetry
                .latest()
                .map(|msg| msg.debug.model_used)
                .unwrap_or_default();
            log::debug!(
                "link_up={} backend_reachable={} model='{}' archive_records={} alerts={}",
                telemetry.link_up(),
                backend_reachable.load(Ordering::SeqCst),
                model,
                lock(&archive).events().len(),
                telemetry.alerts().len()
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(RENDER_INTERVAL);
    }

    log::info!("shutdown signal received, stopping console...");
    status.finish();
    link.stop()?;
    feed_handle.stop()?;
    poller.stop()?;
    probe.stop()?;
    Ok(())
}

/// One render pass: join the latest frame and the latest message, size the
/// surface to the frame, draw, composite, publish. Missing frame or message
/// makes the pass a no-op, retried naturally on the next tick.
fn render_pass(
    telemetry: &SharedTelemetry,
    frames: &FrameSlot,
    surface: &mut OverlaySurface,
    preview: Option<&Path>,
) {
    let Some(mut frame) = lock(frames).clone() else {
        return;
    };
    let Some(msg) = telemetry.latest() else {
        return;
    };

    // The feed can resize between ticks; dimensions come from the frame in
    // hand, never from a previous pass.
    surface.resize_to(frame.width, frame.height);
    render_overlay(&msg, surface);
    surface.blend_onto(&mut frame.pixels, frame.width, frame.height);

    if let Some(path) = preview {
        if let Err(e) = feed::write_preview(path, &frame) {
            log::warn!("preview write failed: {:#}", e);
        }
    }
}

fn status_message(
    telemetry: &SharedTelemetry,
    backend_reachable: &AtomicBool,
    archive: &Arc<Mutex<ArchiveView>>,
) -> String {
    let backend = if backend_reachable.load(Ordering::SeqCst) {
        "UP"
    } else {
        "DOWN"
    };
    let records = lock(archive).events().len();

    match telemetry.latest() {
        Some(msg) if telemetry.link_up() => {
            let threats = if msg.threats.is_empty() {
                "sector clear".to_string()
            } else {
                msg.threats.join(" + ").replace('_', " ")
            };
            format!(
                "LINK {} | backend {} | persons {} weapons {} | {:.1} fps | {} | archive {}",
                msg.status.label(),
                backend,
                msg.counts.persons,
                msg.counts.weapons,
                msg.fps,
                threats,
                records
            )
        }
        _ => format!(
            "LINK DOWN | backend {} | reconnecting | archive {}",
            backend, records
        ),
    }
}
