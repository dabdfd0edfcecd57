//! Camera frame source.
//!
//! `CameraSource` delivers a continuous stream of RGB24 frames. Device paths
//! use libv4l (feature: ingest-v4l2); `stub://` paths generate synthetic
//! frames for tests and demos.

use anyhow::{anyhow, Result};
#[cfg(feature = "ingest-v4l2")]
use anyhow::Context;
#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;
#[cfg(feature = "ingest-v4l2")]
use std::time::{Duration, Instant};

use crate::config::SourceSettings;
use crate::frame::Frame;
use crate::geometry::{ResizeAspectPreview, Size};

/// Largest accepted frame width or height.
pub const MAX_FRAME_DIMENSION: u32 = 16_384;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://<name>".
    pub device: String,
    /// Frame rate requested from the device.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

impl From<&SourceSettings> for CameraConfig {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            device: settings.url.clone(),
            target_fps: settings.target_fps,
            width: settings.width,
            height: settings.height,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        if config.width > MAX_FRAME_DIMENSION || config.height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "camera frame size {}x{} exceeds {} pixels per side",
                config.width,
                config.height,
                MAX_FRAME_DIMENSION
            ));
        }
        let frame_len = rgb_frame_len(config.width, config.height).ok_or_else(|| {
            anyhow!(
                "camera frame size {}x{} is too large",
                config.width,
                config.height
            )
        })?;
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config, frame_len)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceCamera::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow!(
                "camera device {} requires the ingest-v4l2 feature",
                config.device
            ))
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Capture the next frame.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }

    /// Frame size currently delivered (may differ from the requested size
    /// once a device has negotiated its format).
    pub fn frame_size(&self) -> Size {
        let (width, height) = match &self.backend {
            CameraBackend::Synthetic(source) => (source.config.width, source.config.height),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => (source.active_width, source.active_height),
        };
        Size::new(width as f64, height as f64)
    }

    /// Preview transform for showing this camera aspect-fit in `layer_bounds`.
    pub fn preview(&self, layer_bounds: Size) -> ResizeAspectPreview {
        ResizeAspectPreview::new(self.frame_size(), layer_bounds)
    }
}

/// Byte length of one RGB24 frame, or `None` if it does not fit in memory.
fn rgb_frame_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
        .filter(|len| isize::try_from(*len).is_ok())
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_len: usize,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig, frame_len: usize) -> Self {
        Self {
            config,
            frame_len,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Frame {
        self.frame_count += 1;
        // Slowly scrolling gradient.
        let pixels = (0..self.frame_len)
            .map(|i| ((i as u64 + self.frame_count) % 256) as u8)
            .collect();
        Frame::video(pixels, self.config.width, self.config.height, self.frame_count)
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let rgb = v4l::FourCC::new(b"RGB3");
        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = rgb;
        let format = device
            .set_format(&format)
            .with_context(|| format!("set RGB3 format on {}", self.config.device))?;
        if format.fourcc != rgb {
            return Err(anyhow!(
                "{} does not deliver RGB3 frames (got {})",
                self.config.device,
                format.fourcc
            ));
        }

        let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
        if let Err(err) = device.set_params(&params) {
            log::warn!(
                "CameraSource: failed to set fps on {}: {}",
                self.config.device,
                err
            );
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Frame::video(
            buf.to_vec(),
            self.active_width,
            self.active_height,
            self.frame_count,
        ))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        self.last_frame_at
            .map_or(true, |at| at.elapsed() <= Duration::from_secs(2))
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}
