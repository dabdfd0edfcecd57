//! Object detection.
//!
//! A `ModelRuntime` is the black-box model; the `Detector` runs it off the
//! caller's thread and reports back through a completion callback.

mod backend;
mod backends;
mod detector;
mod registry;
mod result;

pub use backend::ModelRuntime;
#[cfg(feature = "backend-tract")]
pub use backends::{TractConfig, TractRuntime};
pub use backends::StubRuntime;
pub use detector::Detector;
pub use registry::RuntimeRegistry;
pub use result::{select_label, Classification, Detection, Observation};

/// Failures reported by the detector.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// The model could not be loaded. Only raised at startup.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    /// The frame could not be turned into model input; nothing was run.
    #[error("frame decode failed: {0}")]
    Decode(String),
    /// The model ran and failed.
    #[error("inference failed: {0}")]
    Inference(String),
}
