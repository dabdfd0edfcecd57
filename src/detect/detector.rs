use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::detect::backend::ModelRuntime;
use crate::detect::result::Observation;
use crate::detect::DetectError;
use crate::frame::Frame;

/// Runs a model runtime on a background worker.
///
/// Cheap to clone; clones share the runtime and the busy flag. Nothing here
/// serializes calls: a second `detect` may start while the first is still
/// running, and completions may arrive in any order.
#[derive(Clone)]
pub struct Detector {
    runtime: Arc<Mutex<dyn ModelRuntime>>,
    busy: Arc<AtomicBool>,
}

impl Detector {
    pub fn new(runtime: Arc<Mutex<dyn ModelRuntime>>) -> Self {
        Self {
            runtime,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Take ownership of a runtime, warming it up first.
    ///
    /// A runtime that fails to warm up is treated as an unavailable model.
    pub fn with_runtime<R: ModelRuntime + 'static>(mut runtime: R) -> Result<Self, DetectError> {
        runtime
            .warm_up()
            .map_err(|e| DetectError::ModelUnavailable(format!("{}: {:#}", runtime.name(), e)))?;
        Ok(Self::new(Arc::new(Mutex::new(runtime))))
    }

    /// Advisory flag: true while some classification is in flight.
    ///
    /// Never used to gate calls.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    /// Classify a frame in the background.
    ///
    /// The frame is validated first; a frame that cannot be decoded is
    /// rejected here and `completion` is never called. Otherwise the model
    /// runs on a worker thread and `completion` is called there with the
    /// result.
    pub fn detect<F>(&self, frame: Frame, completion: F) -> Result<(), DetectError>
    where
        F: FnOnce(Result<Vec<Observation>, DetectError>) + Send + 'static,
    {
        frame.view()?;

        self.busy.store(true, Ordering::Relaxed);
        let runtime = Arc::clone(&self.runtime);
        let busy = Arc::clone(&self.busy);
        std::thread::spawn(move || {
            let result = run_inference(&runtime, &frame);
            busy.store(false, Ordering::Relaxed);
            if let Err(e) = &result {
                log::warn!("classification of frame #{} failed: {}", frame.sequence, e);
            }
            completion(result);
        });
        Ok(())
    }
}

fn run_inference(
    runtime: &Mutex<dyn ModelRuntime>,
    frame: &Frame,
) -> Result<Vec<Observation>, DetectError> {
    let view = frame.view()?;
    let mut guard = runtime
        .lock()
        .map_err(|_| DetectError::Inference("model runtime lock poisoned".to_string()))?;
    guard
        .infer(&view)
        .map_err(|e| DetectError::Inference(format!("{:#}", e)))
}
