//! Detection session: wires a frame source, the throttle, the detector and a
//! display surface together.
//!
//! Inference completes on worker threads. Completions are queued and only
//! touch the surface when the owning thread calls [`Session::pump`] or
//! [`Session::pump_blocking`], so the surface is never shared across threads.

use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use anyhow::anyhow;

use crate::detect::{DetectError, Detector, Observation};
use crate::frame::Frame;
use crate::geometry::{PreviewTransform, Size, VisibleRegion};
use crate::overlay::{self, DisplaySurface, Viewport};
use crate::throttle::FrameThrottle;

/// What to do with completions that arrive after a newer frame was sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Apply every completion in arrival order, even if it is for an older
    /// frame than the one currently displayed.
    #[default]
    AsReceived,
    /// Drop a completion when another frame has been dispatched since.
    LatestSample,
}

impl FromStr for CompletionOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim() {
            "as_received" => Ok(CompletionOrder::AsReceived),
            "latest_sample" => Ok(CompletionOrder::LatestSample),
            other => Err(anyhow!(
                "unknown completion order '{}' (expected as_received or latest_sample)",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Camera,
    Still,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_seen: u64,
    pub frames_dispatched: u64,
    pub frames_rejected: u64,
    pub updates_applied: u64,
    pub updates_dropped: u64,
    pub boxes_drawn: u64,
}

enum Target {
    Camera,
    Still(VisibleRegion),
}

struct Update {
    generation: u64,
    target: Target,
    result: Result<Vec<Observation>, DetectError>,
}

pub struct Session<S: DisplaySurface> {
    detector: Detector,
    throttle: FrameThrottle,
    order: CompletionOrder,
    surface: Option<S>,
    preview: Option<Box<dyn PreviewTransform>>,
    mode: Mode,
    generation: u64,
    stats: SessionStats,
    tx: Sender<Update>,
    rx: Receiver<Update>,
}

impl<S: DisplaySurface> Session<S> {
    pub fn new(detector: Detector, surface: S, throttle: FrameThrottle, order: CompletionOrder) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            detector,
            throttle,
            order,
            surface: Some(surface),
            preview: None,
            mode: Mode::Idle,
            generation: 0,
            stats: SessionStats::default(),
            tx,
            rx,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Current display surface, or `None` once released.
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Tear down the display surface. Completions that arrive afterwards are
    /// discarded.
    pub fn release_surface(&mut self) -> Option<S> {
        self.surface.take()
    }

    /// Remove every displayed box.
    pub fn cleanup(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    pub fn is_camera_running(&self) -> bool {
        self.mode == Mode::Camera
    }

    pub fn start_camera(&mut self, preview: Box<dyn PreviewTransform>) {
        self.preview = Some(preview);
        self.throttle.reset();
        self.mode = Mode::Camera;
        log::info!(
            "camera started (sampling 1 in {} frames)",
            self.throttle.skip() + 1
        );
    }

    /// Stop the camera. In-flight classifications are not cancelled.
    pub fn stop_camera(&mut self) {
        if self.mode == Mode::Camera {
            log::info!("camera stopped");
            self.mode = Mode::Idle;
        }
        self.preview = None;
    }

    /// Camera button: clear the overlay, then start or stop the camera.
    ///
    /// `preview` is only used when the camera starts. Returns whether the
    /// camera is running afterwards.
    pub fn toggle_camera(&mut self, preview: Box<dyn PreviewTransform>) -> bool {
        self.cleanup();
        if self.is_camera_running() {
            self.stop_camera();
        } else {
            self.start_camera(preview);
        }
        self.is_camera_running()
    }

    /// Show a still image inside `container` and classify it.
    ///
    /// Stops the camera and clears the overlay first. Boxes are drawn on the
    /// aspect-fit region of the image once classification completes.
    pub fn open_still(&mut self, frame: Frame, container: Size) -> Result<(), DetectError> {
        self.cleanup();
        self.stop_camera();
        self.mode = Mode::Still;

        let region = VisibleRegion::aspect_fit(frame.display_size(), container);
        self.stats.frames_seen += 1;
        self.dispatch(frame, Target::Still(region))
    }

    /// Camera frame callback. Returns true when the frame was sent to the
    /// detector.
    pub fn on_video_frame(&mut self, frame: Frame) -> bool {
        if self.mode != Mode::Camera {
            return false;
        }
        self.stats.frames_seen += 1;
        if !self.throttle.should_sample() {
            return false;
        }
        match self.dispatch(frame, Target::Camera) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("skipping camera frame: {}", e);
                false
            }
        }
    }

    fn dispatch(&mut self, frame: Frame, target: Target) -> Result<(), DetectError> {
        let sequence = frame.sequence;
        let generation = self.generation + 1;
        let tx = self.tx.clone();
        let sent = self.detector.detect(frame, move |result| {
            // The session may be gone by now; nothing to update then.
            let _ = tx.send(Update {
                generation,
                target,
                result,
            });
        });
        match sent {
            Ok(()) => {
                self.generation = generation;
                self.stats.frames_dispatched += 1;
                log::debug!("dispatched frame #{} (generation {})", sequence, generation);
                Ok(())
            }
            Err(e) => {
                self.stats.frames_rejected += 1;
                Err(e)
            }
        }
    }

    /// Apply every completion that has arrived. Returns how many changed the
    /// overlay.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.rx.try_recv() {
            if self.apply(update) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait up to `timeout` for one completion and apply it, then drain any
    /// others. Returns false if nothing arrived in time.
    pub fn pump_blocking(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => {
                self.apply(update);
                self.pump();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn apply(&mut self, update: Update) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            log::debug!(
                "surface released; dropping completion for generation {}",
                update.generation
            );
            self.stats.updates_dropped += 1;
            return false;
        };
        if self.order == CompletionOrder::LatestSample && update.generation != self.generation {
            log::debug!(
                "dropping stale completion (generation {}, latest {})",
                update.generation,
                self.generation
            );
            self.stats.updates_dropped += 1;
            return false;
        }

        let observations = match update.result {
            Ok(observations) => observations,
            Err(e) => {
                log::warn!("classification failed, clearing overlay: {}", e);
                surface.clear();
                self.stats.updates_applied += 1;
                return true;
            }
        };

        let drawn = match update.target {
            Target::Still(region) => overlay::render(&observations, &Viewport::Image(region), surface),
            Target::Camera => match self.preview.as_deref() {
                Some(preview) => overlay::render(&observations, &Viewport::Camera(preview), surface),
                None => {
                    // Camera already stopped: the old boxes go, nothing new is drawn.
                    surface.clear();
                    0
                }
            },
        };
        log::debug!(
            "overlay updated: {} of {} observations drawn",
            drawn,
            observations.len()
        );
        self.stats.updates_applied += 1;
        self.stats.boxes_drawn += drawn as u64;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Classification, StubRuntime};
    use crate::geometry::{Rect, ResizeAspectPreview};
    use crate::overlay::OverlaySet;

    const WAIT: Duration = Duration::from_secs(5);

    fn stop_sign() -> Observation {
        Observation {
            bounding_box: Rect::new(0.25, 0.25, 0.5, 0.5),
            confidence: 0.873,
            labels: vec![Classification::new("stop_sign", 0.873)],
        }
    }

    fn session(runtime: StubRuntime, order: CompletionOrder) -> anyhow::Result<Session<OverlaySet>> {
        Ok(Session::new(
            Detector::with_runtime(runtime)?,
            OverlaySet::new(),
            FrameThrottle::default(),
            order,
        ))
    }

    fn preview() -> Box<dyn PreviewTransform> {
        Box::new(ResizeAspectPreview::new(
            Size::new(100.0, 100.0),
            Size::new(100.0, 100.0),
        ))
    }

    fn video(sequence: u64) -> Frame {
        Frame::video(vec![0u8; 4 * 4 * 3], 4, 4, sequence)
    }

    #[test]
    fn completion_order_parses() -> anyhow::Result<()> {
        assert_eq!("as_received".parse::<CompletionOrder>()?, CompletionOrder::AsReceived);
        assert_eq!("latest_sample".parse::<CompletionOrder>()?, CompletionOrder::LatestSample);
        assert!("newest".parse::<CompletionOrder>().is_err());
        Ok(())
    }

    #[test]
    fn still_image_is_drawn_on_visible_region() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::repeating(vec![stop_sign()]), CompletionOrder::AsReceived)?;
        let still = Frame::still(vec![0u8; 4 * 2 * 3], 4, 2, 1);
        session.open_still(still, Size::new(200.0, 200.0))?;
        assert_eq!(session.mode(), Mode::Still);

        assert!(session.pump_blocking(WAIT));
        let surface = session.surface().expect("surface");
        assert_eq!(surface.len(), 1);
        // 4x2 image in a 200x200 container: visible region (0, 50, 200, 100).
        assert_eq!(surface.boxes()[0].frame, Rect::new(50.0, 75.0, 100.0, 50.0));
        assert_eq!(surface.boxes()[0].text, "stop_sign 87.3");
        Ok(())
    }

    #[test]
    fn camera_frames_are_throttled() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::repeating(vec![stop_sign()]), CompletionOrder::AsReceived)?;
        assert!(session.toggle_camera(preview()));

        let dispatched: Vec<bool> = (0..22).map(|i| session.on_video_frame(video(i))).collect();
        let sampled: Vec<usize> = dispatched
            .iter()
            .enumerate()
            .filter(|(_, sent)| **sent)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(sampled, vec![10, 21]);
        assert_eq!(session.stats().frames_seen, 22);
        assert_eq!(session.stats().frames_dispatched, 2);

        assert!(session.pump_blocking(WAIT));
        Ok(())
    }

    #[test]
    fn frames_are_ignored_while_camera_is_off() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::demo(), CompletionOrder::AsReceived)?;
        assert!(!session.on_video_frame(video(1)));
        assert_eq!(session.stats().frames_seen, 0);
        Ok(())
    }

    #[test]
    fn toggling_twice_stops_the_camera() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::demo(), CompletionOrder::AsReceived)?;
        assert!(session.toggle_camera(preview()));
        assert!(!session.toggle_camera(preview()));
        assert_eq!(session.mode(), Mode::Idle);
        Ok(())
    }

    #[test]
    fn undecodable_camera_frame_is_skipped() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::demo(), CompletionOrder::AsReceived)?;
        session.start_camera(preview());
        for i in 0..10 {
            session.on_video_frame(video(i));
        }
        assert!(!session.on_video_frame(Frame::video(vec![1, 2, 3], 4, 4, 10)));
        assert_eq!(session.stats().frames_rejected, 1);
        assert!(!session.pump_blocking(Duration::from_millis(50)));
        Ok(())
    }

    #[test]
    fn inference_failure_clears_overlay() -> anyhow::Result<()> {
        let runtime = StubRuntime::scripted(vec![vec![stop_sign()]]);
        let mut session = session(runtime, CompletionOrder::AsReceived)?;
        session.open_still(Frame::still(vec![0u8; 3], 1, 1, 1), Size::new(10.0, 10.0))?;
        assert!(session.pump_blocking(WAIT));
        assert_eq!(session.surface().map(|s| s.len()), Some(1));

        let mut failing = Session::new(
            Detector::with_runtime(StubRuntime::failing("no result"))?,
            session.release_surface().expect("surface"),
            FrameThrottle::default(),
            CompletionOrder::AsReceived,
        );
        failing.open_still(Frame::still(vec![0u8; 3], 1, 1, 1), Size::new(10.0, 10.0))?;
        assert!(failing.pump_blocking(WAIT));
        assert_eq!(failing.surface().map(|s| s.len()), Some(0));
        Ok(())
    }

    #[test]
    fn late_completion_after_release_is_a_noop() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::repeating(vec![stop_sign()]), CompletionOrder::AsReceived)?;
        session.open_still(Frame::still(vec![0u8; 3], 1, 1, 1), Size::new(10.0, 10.0))?;
        let released = session.release_surface().expect("surface");
        assert!(released.is_empty());

        assert!(session.pump_blocking(WAIT));
        assert!(session.surface().is_none());
        assert_eq!(session.stats().updates_dropped, 1);
        Ok(())
    }

    #[test]
    fn latest_sample_drops_superseded_completions() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::repeating(vec![stop_sign()]), CompletionOrder::LatestSample)?;
        session.open_still(Frame::still(vec![0u8; 3], 1, 1, 1), Size::new(10.0, 10.0))?;
        session.open_still(Frame::still(vec![0u8; 3], 1, 1, 1), Size::new(10.0, 10.0))?;

        let mut received = 0;
        while received < 2 && session.pump_blocking(WAIT) {
            received = session.stats().updates_applied + session.stats().updates_dropped;
        }
        assert_eq!(session.stats().updates_applied, 1);
        assert_eq!(session.stats().updates_dropped, 1);
        assert_eq!(session.surface().map(|s| s.len()), Some(1));
        Ok(())
    }

    #[test]
    fn camera_completion_after_stop_only_clears() -> anyhow::Result<()> {
        let mut session = session(StubRuntime::repeating(vec![stop_sign()]), CompletionOrder::AsReceived)?;
        session.start_camera(preview());
        for i in 0..11 {
            session.on_video_frame(video(i));
        }
        session.stop_camera();

        assert!(session.pump_blocking(WAIT));
        assert_eq!(session.surface().map(|s| s.len()), Some(0));
        assert_eq!(session.stats().boxes_drawn, 0);
        Ok(())
    }
}
