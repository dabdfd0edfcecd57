use anyhow::{anyhow, Result};

use crate::detect::backend::ModelRuntime;
use crate::detect::result::{Classification, Observation};
use crate::frame::FrameView;
use crate::geometry::Rect;

/// Scripted runtime for tests and demos.
///
/// Replays a fixed sequence of outcomes, one per `infer` call, wrapping
/// around at the end. The frame content is ignored.
pub struct StubRuntime {
    script: Vec<std::result::Result<Vec<Observation>, String>>,
    calls: usize,
}

impl StubRuntime {
    pub fn scripted(batches: Vec<Vec<Observation>>) -> Self {
        Self {
            script: batches.into_iter().map(Ok).collect(),
            calls: 0,
        }
    }

    /// Return the same observations on every call.
    pub fn repeating(observations: Vec<Observation>) -> Self {
        Self::scripted(vec![observations])
    }

    /// Fail every call with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            script: vec![Err(message.to_string())],
            calls: 0,
        }
    }

    /// A stop sign, a one-way sign and a region with a label the overlay
    /// does not know.
    pub fn demo() -> Self {
        Self::repeating(vec![
            Observation {
                bounding_box: Rect::new(0.10, 0.55, 0.25, 0.30),
                confidence: 0.91,
                labels: vec![
                    Classification::new("stop_sign", 0.91),
                    Classification::new("oneway_sign", 0.04),
                ],
            },
            Observation {
                bounding_box: Rect::new(0.60, 0.20, 0.30, 0.12),
                confidence: 0.78,
                labels: vec![
                    Classification::new("oneway_sign", 0.78),
                    Classification::new("stop_sign", 0.10),
                ],
            },
            Observation {
                bounding_box: Rect::new(0.40, 0.40, 0.10, 0.10),
                confidence: 0.66,
                labels: vec![Classification::new("yield_sign", 0.66)],
            },
        ])
    }

    /// Number of `infer` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for StubRuntime {
    fn default() -> Self {
        Self::demo()
    }
}

impl ModelRuntime for StubRuntime {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _frame: &FrameView<'_>) -> Result<Vec<Observation>> {
        if self.script.is_empty() {
            self.calls += 1;
            return Ok(Vec::new());
        }
        let outcome = &self.script[self.calls % self.script.len()];
        self.calls += 1;
        match outcome {
            Ok(observations) => Ok(observations.clone()),
            Err(message) => Err(anyhow!("{}", message)),
        }
    }
}
