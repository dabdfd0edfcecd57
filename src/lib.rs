//! Road-sign detection overlay.
//!
//! Frames from a camera or a still image are classified by an object
//! detection model and the results are drawn as labelled bounding boxes.
//!
//! # Pipeline
//!
//! ```text
//! camera ──► FrameThrottle ──┐
//!                             ├─► Detector (worker) ─► Session::pump ─► render ─► DisplaySurface
//! still image ───────────────┘
//! ```
//!
//! # Module Structure
//!
//! - `throttle`: 1-in-N sampling of camera frames
//! - `frame`: owned frames and the validated view runtimes receive
//! - `detect`: model runtimes, label selection, the background detector
//! - `geometry`: normalized/screen rectangles, letterboxing, preview transforms
//! - `overlay`: bounding boxes, label text, display surfaces
//! - `session`: camera toggle, still-image flow, completion marshalling
//! - `ingest`: camera and still-image sources
//! - `config`: file + environment configuration

pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod label;
pub mod overlay;
pub mod session;
pub mod throttle;
pub mod ui;

pub use config::OverlayConfig;
pub use detect::{
    select_label, Classification, DetectError, Detection, Detector, ModelRuntime, Observation,
    RuntimeRegistry, StubRuntime,
};
pub use frame::{Frame, FrameKind, FrameView, Orientation};
pub use geometry::{Point, PreviewTransform, Rect, ResizeAspectPreview, Size, VisibleRegion};
pub use ingest::{load_still, CameraConfig, CameraSource};
pub use label::{Color, Label};
pub use overlay::{format_label, render, BoundingBox, DisplaySurface, OverlaySet, Viewport};
pub use session::{CompletionOrder, Mode, Session, SessionStats};
pub use throttle::FrameThrottle;
