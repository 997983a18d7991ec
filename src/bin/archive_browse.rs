//! argus_archive - browse the backend incident archive
//!
//! Fetches the recorded incident list, prints one incident's decoded detail,
//! and downloads evidence stills.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use argus_console::archive::ArchiveClient;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse the Argus incident archive")]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "ARGUS_BASE_URL", default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List recorded incidents (the default).
    List {
        /// Only show incidents of this category (e.g. WEAPON_DETECTED).
        #[arg(long)]
        kind: Option<String>,
    },
    /// Show one incident with decoded labels and boxes.
    Show {
        /// Incident id.
        id: i64,
    },
    /// Download an incident's evidence still.
    Image {
        /// Incident id.
        id: i64,
        /// Output file path.
        #[arg(long, default_value = "evidence.jpg")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);
    let client = ArchiveClient::new(args.base_url);

    match args.command.unwrap_or(Command::List { kind: None }) {
        Command::List { kind } => list_incidents(&ui, &client, kind.as_deref()),
        Command::Show { id } => show_incident(&ui, &client, id),
        Command::Image { id, output } => save_evidence(&ui, &client, id, &output),
    }
}

fn list_incidents(ui: &ui::Ui, client: &ArchiveClient, kind: Option<&str>) -> Result<()> {
    let events = {
        let _stage = ui.stage("Fetch incident archive");
        client.fetch_events()?
    };

    let mut shown = 0usize;
    for ev in &events {
        if let Some(kind) = kind {
            if !ev.kind.eq_ignore_ascii_case(kind) {
                continue;
            }
        }
        let labels = ev.decode_labels().unwrap_or_default();
        println!(
            "#{:04}  {}  {:<20}  conf {:.2}  [{}]",
            ev.id,
            ev.timestamp,
            ev.kind_display(),
            ev.confidence,
            labels.join(", ")
        );
        shown += 1;
    }
    println!("{} incidents shown ({} recorded)", shown, events.len());
    Ok(())
}

fn show_incident(ui: &ui::Ui, client: &ArchiveClient, id: i64) -> Result<()> {
    let ev = {
        let _stage = ui.stage("Fetch incident");
        client.fetch_event(id)?
    };

    println!("id:         {}", ev.id);
    println!("timestamp:  {}", ev.timestamp);
    println!("type:       {}", ev.kind_display());
    println!("confidence: {:.2}", ev.confidence);
    println!("image:      {}", ev.image_path);
    match ev.decode_labels() {
        Ok(labels) => println!("labels:     {}", labels.join(", ")),
        Err(e) => println!("labels:     <undecodable: {}>", e),
    }
    match ev.decode_boxes() {
        Ok(boxes) => {
            for bx in &boxes {
                println!(
                    "  box {}  conf {:.2}  ({:.0},{:.0})-({:.0},{:.0})",
                    bx.label, bx.conf, bx.x1, bx.y1, bx.x2, bx.y2
                );
            }
        }
        Err(e) => println!("bboxes:     <undecodable: {}>", e),
    }
    Ok(())
}

fn save_evidence(ui: &ui::Ui, client: &ArchiveClient, id: i64, output: &PathBuf) -> Result<()> {
    let ev = {
        let _stage = ui.stage("Fetch incident");
        client.fetch_event(id)?
    };
    let bytes = {
        let _stage = ui.stage("Download evidence still");
        client.fetch_evidence_image(&ev)?
    };
    std::fs::write(output, &bytes).with_context(|| format!("write {}", output.display()))?;
    println!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}
