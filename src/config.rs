use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::geometry::Size;
use crate::ingest::camera::MAX_FRAME_DIMENSION;
use crate::session::CompletionOrder;
use crate::throttle::DEFAULT_SKIP_FRAMES;

const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 416;
const DEFAULT_THRESHOLD: f32 = 0.5;
const DEFAULT_CLASSES: [&str; 2] = ["stop_sign", "oneway_sign"];
const DEFAULT_CONTAINER_WIDTH: f64 = 390.0;
const DEFAULT_CONTAINER_HEIGHT: f64 = 844.0;

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    source: Option<SourceConfigFile>,
    backend: Option<BackendConfigFile>,
    throttle: Option<ThrottleConfigFile>,
    ordering: Option<String>,
    container: Option<ContainerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendConfigFile {
    name: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    threshold: Option<f32>,
    classes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ThrottleConfigFile {
    skip_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ContainerConfigFile {
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub source: SourceSettings,
    pub backend: BackendSettings,
    /// Camera frames skipped between two classifications.
    pub skip_frames: u32,
    pub ordering: CompletionOrder,
    /// Size of the view the overlay is drawn into.
    pub container: Size,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub name: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub threshold: f32,
    pub classes: Vec<String>,
}

impl OverlayConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SIGN_OVERLAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Result<Self> {
        let source = file.source.unwrap_or_default();
        let backend = file.backend.unwrap_or_default();
        let container = file.container.unwrap_or_default();
        let ordering = match file.ordering.as_deref() {
            Some(order) => order.parse()?,
            None => CompletionOrder::default(),
        };

        Ok(Self {
            source: SourceSettings {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            backend: BackendSettings {
                name: backend.name.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: backend.model_path,
                input_width: backend.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
                input_height: backend.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
                threshold: backend.threshold.unwrap_or(DEFAULT_THRESHOLD),
                classes: backend
                    .classes
                    .unwrap_or_else(|| DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect()),
            },
            skip_frames: file
                .throttle
                .and_then(|throttle| throttle.skip_frames)
                .unwrap_or(DEFAULT_SKIP_FRAMES),
            ordering,
            container: Size::new(
                container.width.unwrap_or(DEFAULT_CONTAINER_WIDTH),
                container.height.unwrap_or(DEFAULT_CONTAINER_HEIGHT),
            ),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SIGN_OVERLAY_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(name) = std::env::var("SIGN_OVERLAY_BACKEND") {
            if !name.trim().is_empty() {
                self.backend.name = name.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("SIGN_OVERLAY_MODEL") {
            if !path.trim().is_empty() {
                self.backend.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(classes) = std::env::var("SIGN_OVERLAY_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.backend.classes = parsed;
            }
        }
        if let Ok(skip) = std::env::var("SIGN_OVERLAY_SKIP_FRAMES") {
            self.skip_frames = skip.trim().parse().map_err(|_| {
                anyhow!("SIGN_OVERLAY_SKIP_FRAMES must be a non-negative integer")
            })?;
        }
        if let Ok(order) = std::env::var("SIGN_OVERLAY_ORDERING") {
            if !order.trim().is_empty() {
                self.ordering = order.parse()?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.source.width > MAX_FRAME_DIMENSION || self.source.height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "source width and height must be at most {}",
                MAX_FRAME_DIMENSION
            ));
        }
        if !(0.0..=1.0).contains(&self.backend.threshold) {
            return Err(anyhow!("backend threshold must be within 0..=1"));
        }
        if self.backend.classes.is_empty() {
            return Err(anyhow!("backend classes must not be empty"));
        }
        if self.backend.name == "tract" && self.backend.model_path.is_none() {
            return Err(anyhow!("the tract backend requires a model_path"));
        }
        if self.container.is_empty() {
            return Err(anyhow!("container width and height must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
