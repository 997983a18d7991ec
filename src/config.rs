use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_FEED_FPS: u32 = 15;
const TELEMETRY_PATH: &str = "ws/detections";
const FEED_PATH: &str = "video";

#[derive(Debug, Deserialize, Default)]
struct ConsoleConfigFile {
    base_url: Option<String>,
    telemetry_url: Option<String>,
    feed: Option<FeedConfigFile>,
    preview_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct FeedConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
}

/// Resolved console configuration: defaults, then config file, then
/// environment overrides, then validation.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub telemetry_url: String,
    pub feed: FeedSettings,
    pub preview_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub url: String,
    pub target_fps: u32,
}

#[derive(Debug, Default)]
struct RawConfig {
    base_url: Option<String>,
    telemetry_url: Option<String>,
    feed_url: Option<String>,
    feed_fps: Option<u32>,
    preview_path: Option<PathBuf>,
}

impl ConsoleConfig {
    /// Load from the file named by `ARGUS_CONFIG` (when set), apply
    /// environment overrides, and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ARGUS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut raw = RawConfig::from_file(file_cfg.unwrap_or_default());
        raw.apply_env()?;
        raw.finish()
    }
}

impl RawConfig {
    fn from_file(file: ConsoleConfigFile) -> Self {
        Self {
            base_url: file.base_url,
            telemetry_url: file.telemetry_url,
            feed_url: file.feed.as_ref().and_then(|feed| feed.url.clone()),
            feed_fps: file.feed.and_then(|feed| feed.target_fps),
            preview_path: file.preview_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(base) = std::env::var("ARGUS_BASE_URL") {
            if !base.trim().is_empty() {
                self.base_url = Some(base);
            }
        }
        if let Ok(url) = std::env::var("ARGUS_TELEMETRY_URL") {
            if !url.trim().is_empty() {
                self.telemetry_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("ARGUS_FEED_URL") {
            if !url.trim().is_empty() {
                self.feed_url = Some(url);
            }
        }
        if let Ok(fps) = std::env::var("ARGUS_FEED_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("ARGUS_FEED_FPS must be an integer frame rate"))?;
            self.feed_fps = Some(fps);
        }
        if let Ok(path) = std::env::var("ARGUS_PREVIEW_PATH") {
            if !path.trim().is_empty() {
                self.preview_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    /// Resolve defaults and derivations, then validate. URLs not set
    /// explicitly derive from the base URL, so pointing `ARGUS_BASE_URL` at
    /// another host moves all three endpoints together.
    fn finish(self) -> Result<ConsoleConfig> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let telemetry_url = match self.telemetry_url {
            Some(url) => url,
            None => derive_telemetry_url(&base_url),
        };
        let feed_url = self
            .feed_url
            .unwrap_or_else(|| join_base(&base_url, FEED_PATH));
        let cfg = ConsoleConfig {
            base_url,
            telemetry_url,
            feed: FeedSettings {
                url: feed_url,
                target_fps: self.feed_fps.unwrap_or(DEFAULT_FEED_FPS),
            },
            preview_path: self.preview_path,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

impl ConsoleConfig {
    fn validate(&self) -> Result<()> {
        expect_scheme(&self.base_url, &["http", "https"], "base_url")?;
        expect_scheme(&self.telemetry_url, &["ws", "wss"], "telemetry_url")?;
        expect_scheme(&self.feed.url, &["http", "https"], "feed url")?;
        Ok(())
    }
}

fn expect_scheme(raw: &str, schemes: &[&str], what: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|e| anyhow!("invalid {} '{}': {}", what, raw, e))?;
    if !schemes.contains(&url.scheme()) {
        return Err(anyhow!(
            "invalid {} '{}': expected scheme {}",
            what,
            raw,
            schemes.join(" or ")
        ));
    }
    Ok(())
}

fn join_base(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Telemetry endpoint derived from the HTTP base: same host, ws(s) scheme.
fn derive_telemetry_url(base: &str) -> String {
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    join_base(&ws_base, TELEMETRY_PATH)
}

fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
