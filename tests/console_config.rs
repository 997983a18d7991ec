use std::sync::Mutex;

use tempfile::NamedTempFile;

use argus_console::config::ConsoleConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ARGUS_CONFIG",
        "ARGUS_BASE_URL",
        "ARGUS_TELEMETRY_URL",
        "ARGUS_FEED_URL",
        "ARGUS_FEED_FPS",
        "ARGUS_PREVIEW_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ConsoleConfig::load().expect("load config");

    assert_eq!(cfg.base_url, "http://127.0.0.1:8000");
    assert_eq!(cfg.telemetry_url, "ws://127.0.0.1:8000/ws/detections");
    assert_eq!(cfg.feed.url, "http://127.0.0.1:8000/video");
    assert_eq!(cfg.feed.target_fps, 15);
    assert!(cfg.preview_path.is_none());

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "base_url": "http://ops-station:8000",
        "telemetry_url": "ws://ops-station:8000/ws/detections",
        "feed": {
            "url": "http://ops-station:8000/video",
            "target_fps": 12
        },
        "preview_path": "/tmp/argus_preview.jpg"
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ARGUS_CONFIG", file.path());
    std::env::set_var("ARGUS_FEED_FPS", "8");
    std::env::set_var("ARGUS_TELEMETRY_URL", "ws://fallback-station:9000/ws/detections");

    let cfg = ConsoleConfig::load().expect("load config");

    assert_eq!(cfg.base_url, "http://ops-station:8000");
    assert_eq!(cfg.telemetry_url, "ws://fallback-station:9000/ws/detections");
    assert_eq!(cfg.feed.url, "http://ops-station:8000/video");
    assert_eq!(cfg.feed.target_fps, 8);
    assert_eq!(
        cfg.preview_path.as_deref().unwrap().to_str().unwrap(),
        "/tmp/argus_preview.jpg"
    );

    clear_env();
}

#[test]
fn derived_endpoints_follow_the_base_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARGUS_BASE_URL", "https://observer.example:8443");

    let cfg = ConsoleConfig::load().expect("load config");
    assert_eq!(
        cfg.telemetry_url,
        "wss://observer.example:8443/ws/detections"
    );
    assert_eq!(cfg.feed.url, "https://observer.example:8443/video");

    clear_env();
}

#[test]
fn invalid_urls_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARGUS_BASE_URL", "not a url");
    assert!(ConsoleConfig::load().is_err());

    std::env::set_var("ARGUS_BASE_URL", "http://127.0.0.1:8000");
    std::env::set_var("ARGUS_TELEMETRY_URL", "http://127.0.0.1:8000/ws/detections");
    // Telemetry must be a ws(s) endpoint.
    assert!(ConsoleConfig::load().is_err());

    clear_env();
}

#[test]
fn bad_fps_override_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARGUS_FEED_FPS", "fast");
    assert!(ConsoleConfig::load().is_err());

    clear_env();
}
