//! Frames handed to the detector.
//!
//! - `Frame`: owned RGB24 pixel buffer from a camera or a still image.
//! - `FrameView`: validated, read-only view that model runtimes receive.
//!
//! Frames are validated when a view is taken, not when they are built, so a
//! source can hand over whatever it captured and the detector decides whether
//! the frame is usable.

use crate::detect::DetectError;
use crate::geometry::Size;

/// Image orientation, numbered like EXIF / `CGImagePropertyOrientation` (1..=8).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl Orientation {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => Orientation::Up,
            2 => Orientation::UpMirrored,
            3 => Orientation::Down,
            4 => Orientation::DownMirrored,
            5 => Orientation::LeftMirrored,
            6 => Orientation::Right,
            7 => Orientation::RightMirrored,
            8 => Orientation::Left,
            _ => return None,
        })
    }

    pub fn raw(&self) -> u32 {
        match self {
            Orientation::Up => 1,
            Orientation::UpMirrored => 2,
            Orientation::Down => 3,
            Orientation::DownMirrored => 4,
            Orientation::LeftMirrored => 5,
            Orientation::Right => 6,
            Orientation::RightMirrored => 7,
            Orientation::Left => 8,
        }
    }

    /// Rotated by a quarter turn, so width and height swap on display.
    pub fn is_transposed(&self) -> bool {
        matches!(
            self,
            Orientation::LeftMirrored
                | Orientation::Right
                | Orientation::RightMirrored
                | Orientation::Left
        )
    }
}

/// Where a frame came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Single image picked by the user, with its raw orientation tag.
    Still { orientation: u32 },
    /// Buffer delivered by the camera.
    Video,
}

/// Owned RGB24 frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub kind: FrameKind,
    /// Capture sequence number assigned by the source (0 for stills).
    pub sequence: u64,
}

impl Frame {
    pub fn video(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            kind: FrameKind::Video,
            sequence,
        }
    }

    pub fn still(data: Vec<u8>, width: u32, height: u32, orientation: u32) -> Self {
        Self {
            data,
            width,
            height,
            kind: FrameKind::Still { orientation },
            sequence: 0,
        }
    }

    /// Size of the frame as it is shown on screen, after orientation.
    pub fn display_size(&self) -> Size {
        let (w, h) = (self.width as f64, self.height as f64);
        match self.kind {
            FrameKind::Still { orientation } => match Orientation::from_raw(orientation) {
                Some(o) if o.is_transposed() => Size::new(h, w),
                _ => Size::new(w, h),
            },
            FrameKind::Video => Size::new(w, h),
        }
    }

    /// Validate the frame and borrow it for inference.
    pub fn view(&self) -> Result<FrameView<'_>, DetectError> {
        let orientation = match self.kind {
            FrameKind::Still { orientation } => Orientation::from_raw(orientation).ok_or(
                DetectError::Decode(format!("unknown image orientation {}", orientation)),
            )?,
            FrameKind::Video => Orientation::Up,
        };

        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| DetectError::Decode("frame dimensions overflow".to_string()))?;
        if expected == 0 {
            return Err(DetectError::Decode("frame has no pixels".to_string()));
        }
        if self.data.len() != expected {
            return Err(DetectError::Decode(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                self.data.len()
            )));
        }

        Ok(FrameView {
            frame: self,
            orientation,
        })
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("kind", &self.kind)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Read-only view of a validated frame.
pub struct FrameView<'a> {
    frame: &'a Frame,
    orientation: Orientation,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Interleaved RGB24 pixels, row-major.
    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_frame_view_exposes_metadata() -> anyhow::Result<()> {
        let frame = Frame::video(vec![0u8; 4 * 2 * 3], 4, 2, 7);
        let view = frame.view()?;
        assert_eq!(view.width(), 4);
        assert_eq!(view.height(), 2);
        assert_eq!(view.orientation(), Orientation::Up);
        assert_eq!(view.pixels().len(), 24);
        Ok(())
    }

    #[test]
    fn short_buffer_is_a_decode_error() {
        let frame = Frame::video(vec![0u8; 10], 4, 2, 1);
        assert!(matches!(frame.view(), Err(DetectError::Decode(_))));
    }

    #[test]
    fn empty_frame_is_a_decode_error() {
        let frame = Frame::video(Vec::new(), 0, 0, 1);
        assert!(matches!(frame.view(), Err(DetectError::Decode(_))));
    }

    #[test]
    fn unknown_orientation_is_a_decode_error() {
        let frame = Frame::still(vec![0u8; 3], 1, 1, 0);
        assert!(matches!(frame.view(), Err(DetectError::Decode(_))));

        let frame = Frame::still(vec![0u8; 3], 1, 1, 9);
        assert!(frame.view().is_err());
    }

    #[test]
    fn rotated_still_swaps_display_size() {
        let frame = Frame::still(vec![0u8; 4 * 2 * 3], 4, 2, Orientation::Right.raw());
        assert_eq!(frame.display_size(), Size::new(2.0, 4.0));

        let frame = Frame::still(vec![0u8; 4 * 2 * 3], 4, 2, Orientation::Down.raw());
        assert_eq!(frame.display_size(), Size::new(4.0, 2.0));
    }

    #[test]
    fn orientation_raw_values_round_trip() {
        for raw in 1..=8 {
            let orientation = Orientation::from_raw(raw).expect("valid orientation");
            assert_eq!(orientation.raw(), raw);
        }
    }
}
