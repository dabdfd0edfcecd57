use std::sync::Mutex;

use tempfile::NamedTempFile;

use sign_overlay::config::OverlayConfig;
use sign_overlay::CompletionOrder;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SIGN_OVERLAY_CONFIG",
        "SIGN_OVERLAY_SOURCE",
        "SIGN_OVERLAY_BACKEND",
        "SIGN_OVERLAY_MODEL",
        "SIGN_OVERLAY_CLASSES",
        "SIGN_OVERLAY_SKIP_FRAMES",
        "SIGN_OVERLAY_ORDERING",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": {
            "url": "/dev/video2",
            "target_fps": 15,
            "width": 1280,
            "height": 720
        },
        "backend": {
            "name": "stub",
            "input_width": 320,
            "input_height": 320,
            "threshold": 0.4
        },
        "throttle": { "skip_frames": 4 },
        "ordering": "as_received",
        "container": { "width": 1080.0, "height": 1920.0 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SIGN_OVERLAY_CONFIG", file.path());
    std::env::set_var("SIGN_OVERLAY_SOURCE", "stub://bench");
    std::env::set_var("SIGN_OVERLAY_ORDERING", "latest_sample");
    std::env::set_var("SIGN_OVERLAY_CLASSES", "stop_sign, oneway_sign, yield_sign");

    let cfg = OverlayConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "stub://bench");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.source.width, 1280);
    assert_eq!(cfg.source.height, 720);
    assert_eq!(cfg.backend.name, "stub");
    assert_eq!(cfg.backend.input_width, 320);
    assert_eq!(cfg.backend.threshold, 0.4);
    assert_eq!(
        cfg.backend.classes,
        vec!["stop_sign", "oneway_sign", "yield_sign"]
    );
    assert_eq!(cfg.skip_frames, 4);
    assert_eq!(cfg.ordering, CompletionOrder::LatestSample);
    assert_eq!(cfg.container.width, 1080.0);
    assert_eq!(cfg.container.height, 1920.0);

    clear_env();
}

#[test]
fn rejects_invalid_skip_frames_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGN_OVERLAY_SKIP_FRAMES", "ten");
    assert!(OverlayConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unreadable_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGN_OVERLAY_CONFIG", "/nonexistent/sign_overlay.json");
    assert!(OverlayConfig::load().is_err());

    clear_env();
}

#[test]
fn tract_backend_needs_a_model() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGN_OVERLAY_BACKEND", "tract");
    assert!(OverlayConfig::load().is_err());

    std::env::set_var("SIGN_OVERLAY_MODEL", "/models/signs.onnx");
    let cfg = OverlayConfig::load().expect("load config");
    assert_eq!(
        cfg.backend.model_path.as_deref(),
        Some(std::path::Path::new("/models/signs.onnx"))
    );

    clear_env();
}
