//! Frame sources.
//!
//! - Camera: synthetic `stub://` stream, or a V4L2 device (feature: ingest-v4l2)
//! - Still: a single image file picked by the user
//!
//! Sources only produce `Frame`s. Sampling, classification and drawing happen
//! in the session.

pub mod camera;
pub mod still;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use still::load_still;
