//! sign_overlay - classify camera frames or a still image and report the
//! bounding-box overlay.
//!
//! `camera` runs the live loop until interrupted; `image` classifies one file
//! and prints the resulting overlay as JSON.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sign_overlay::config::BackendSettings;
use sign_overlay::ui::{Ui, UiMode};
use sign_overlay::{
    load_still, CameraConfig, CameraSource, DetectError, Detector, FrameThrottle, OverlayConfig,
    OverlaySet, RuntimeRegistry, Session, Size, StubRuntime,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Progress output: auto, plain or pretty.
    #[arg(long, global = true)]
    ui: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify frames from the configured camera until interrupted.
    Camera {
        /// Stop after this many frames.
        #[arg(long)]
        frames: Option<u64>,
    },
    /// Classify one image file and print the overlay as JSON.
    Image {
        path: PathBuf,
        /// EXIF orientation tag of the image (1..=8).
        #[arg(long)]
        orientation: Option<u32>,
        /// Seconds to wait for the classification.
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(args.ui.as_deref()), std::io::stderr().is_terminal());
    let cfg = OverlayConfig::load()?;

    let detector = {
        let _stage = ui.stage("load model");
        build_detector(&cfg.backend)?
    };
    let session = Session::new(
        detector,
        OverlaySet::new(),
        FrameThrottle::new(cfg.skip_frames),
        cfg.ordering,
    );

    match args.command {
        Command::Camera { frames } => run_camera(&cfg, session, &ui, frames),
        Command::Image {
            path,
            orientation,
            timeout,
        } => run_image(&cfg, session, &ui, path, orientation, Duration::from_secs(timeout)),
    }
}

fn build_detector(backend: &BackendSettings) -> Result<Detector> {
    let mut registry = RuntimeRegistry::new();
    registry.register(StubRuntime::demo());

    if backend.name == "tract" {
        register_tract(&mut registry, backend)?;
    }

    registry
        .set_default(&backend.name)
        .context("model runtime unavailable")?;
    let detector = registry
        .detector(None)
        .context("model runtime unavailable")?;
    log::info!(
        "using model runtime '{}' (available: {})",
        backend.name,
        registry.list().join(", ")
    );
    Ok(detector)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut RuntimeRegistry, backend: &BackendSettings) -> Result<()> {
    use sign_overlay::detect::{TractConfig, TractRuntime};

    let model_path = backend
        .model_path
        .clone()
        .ok_or_else(|| anyhow!("the tract backend requires a model_path"))?;
    let runtime = TractRuntime::new(TractConfig {
        model_path,
        input_width: backend.input_width,
        input_height: backend.input_height,
        threshold: backend.threshold,
        classes: backend.classes.clone(),
    })
    .context("model runtime unavailable")?;
    registry.register(runtime);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut RuntimeRegistry, _backend: &BackendSettings) -> Result<()> {
    Err(anyhow!(
        "the tract backend requires building with the backend-tract feature"
    ))
}

fn run_camera(
    cfg: &OverlayConfig,
    mut session: Session<OverlaySet>,
    ui: &Ui,
    max_frames: Option<u64>,
) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("install ctrl-c handler")?;
    }

    let mut source = CameraSource::new(CameraConfig::from(&cfg.source))?;
    {
        let _stage = ui.stage("connect camera");
        source.connect()?;
    }
    session.toggle_camera(Box::new(source.preview(cfg.container)));

    let frame_interval = Duration::from_millis(1000 / cfg.source.target_fps.max(1) as u64);
    let status = ui.status("waiting for frames");
    let mut last_status = Instant::now();

    while running.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("camera frame failed: {:#}", e);
                std::thread::sleep(frame_interval);
                continue;
            }
        };
        let sequence = frame.sequence;
        session.on_video_frame(frame);
        session.pump();

        if last_status.elapsed() >= Duration::from_secs(2) {
            let stats = session.stats();
            let boxes = session.surface().map_or(0, |s| s.len());
            status.update(format!(
                "frames={} classified={} boxes={} busy={} camera_healthy={}",
                stats.frames_seen,
                stats.frames_dispatched,
                boxes,
                session.detector().is_busy(),
                source.is_healthy()
            ));
            last_status = Instant::now();
        }

        if max_frames.is_some_and(|max| sequence >= max) {
            break;
        }
        std::thread::sleep(frame_interval);
    }

    session.stop_camera();
    session.cleanup();
    session.release_surface();
    let stats = session.stats();
    status.finish(format!(
        "camera stopped after {} frames ({} classified, {} boxes drawn)",
        stats.frames_seen, stats.frames_dispatched, stats.boxes_drawn
    ));
    Ok(())
}

fn run_image(
    cfg: &OverlayConfig,
    mut session: Session<OverlaySet>,
    ui: &Ui,
    path: PathBuf,
    orientation: Option<u32>,
    timeout: Duration,
) -> Result<()> {
    let frame = {
        let _stage = ui.stage("decode image");
        load_still(&path, orientation)?
    };
    let container: Size = cfg.container;

    {
        let _stage = ui.stage("classify");
        match session.open_still(frame, container) {
            Ok(()) => {
                if !session.pump_blocking(timeout) {
                    return Err(anyhow!(
                        "no classification result within {}s",
                        timeout.as_secs()
                    ));
                }
            }
            // An undecodable image leaves the overlay empty.
            Err(DetectError::Decode(reason)) => {
                log::warn!("skipping {}: {}", path.display(), reason);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot classify {}", path.display()));
            }
        }
    }

    let overlay = session
        .surface()
        .ok_or_else(|| anyhow!("display surface released"))?;
    println!("{}", serde_json::to_string_pretty(overlay)?);
    Ok(())
}
