//! Counter-based frame sampler.

/// Frames skipped between two sampled frames.
pub const DEFAULT_SKIP_FRAMES: u32 = 10;

/// Admits one frame out of every `skip + 1` to the detector.
///
/// Owned by the frame-delivery loop; not shared across threads. There is no
/// feedback from inference, so slow inference can still overlap.
#[derive(Clone, Debug)]
pub struct FrameThrottle {
    skip: u32,
    frames_since_sample: u32,
}

impl FrameThrottle {
    pub fn new(skip: u32) -> Self {
        Self {
            skip,
            frames_since_sample: 0,
        }
    }

    /// Returns true when the current frame should be classified.
    pub fn should_sample(&mut self) -> bool {
        if self.frames_since_sample >= self.skip {
            self.frames_since_sample = 0;
            true
        } else {
            self.frames_since_sample += 1;
            false
        }
    }

    pub fn reset(&mut self) {
        self.frames_since_sample = 0;
    }

    pub fn skip(&self) -> u32 {
        self.skip
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_FRAMES)
    }
}
