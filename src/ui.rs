// Included by both binaries via #[path]; each uses only part of this surface.
#![allow(dead_code)]

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal presentation policy shared by the binaries: pretty output only
/// when stderr is a tty and stdout is not being piped somewhere.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    fn spinner(&self) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar
    }

    /// Scoped progress marker for a one-shot operation; reports duration on
    /// drop.
    pub fn stage(&self, name: &str) -> Stage {
        if self.use_pretty() {
            let spinner = self.spinner();
            spinner.set_message(format!("{name}…"));
            Stage {
                name: name.to_string(),
                start: Instant::now(),
                spinner: Some(spinner),
            }
        } else {
            eprintln!("==> {}", name);
            Stage {
                name: name.to_string(),
                start: Instant::now(),
                spinner: None,
            }
        }
    }

    /// Persistent single-line HUD for the live console. Plain mode stays
    /// quiet; state changes are already on the log stream.
    pub fn status_line(&self) -> StatusLine {
        if self.use_pretty() {
            StatusLine {
                bar: Some(self.spinner()),
            }
        } else {
            StatusLine { bar: None }
        }
    }
}

pub struct Stage {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for Stage {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct StatusLine {
    bar: Option<ProgressBar>,
}

impl StatusLine {
    pub fn set(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.set_message(message);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
