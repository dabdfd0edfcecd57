//! Bounding-box overlay.
//!
//! Turns detector observations into labelled screen rectangles and pushes
//! them to a display surface. Every render replaces the whole overlay set.

use serde::Serialize;

use crate::detect::{Detection, Observation};
use crate::geometry::{PreviewTransform, Rect, Size, VisibleRegion};
use crate::label::{Color, Label};

/// Border width of a drawn box, in points.
pub const BORDER_WIDTH: f64 = 3.0;

/// Extra space around the label text inside its chip.
pub const LABEL_PADDING: Size = Size::new(15.0, 6.0);

/// Caption shown on a box: identifier and confidence as a percentage.
pub fn format_label(label: Label, confidence: f32) -> String {
    format!("{} {:.1}", label.identifier(), confidence as f64 * 100.0)
}

/// One drawable box.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Screen-space frame, top-left origin.
    pub frame: Rect,
    pub text: String,
    /// Border colour; the label chip background uses the same colour.
    pub color: Color,
    pub text_color: Color,
    pub border_width: f64,
}

impl BoundingBox {
    pub fn new(frame: Rect, detection: &Detection) -> Self {
        Self {
            frame,
            text: format_label(detection.label, detection.confidence),
            color: detection.label.color(),
            text_color: Color::BLACK,
            border_width: BORDER_WIDTH,
        }
    }

    /// Frame of the label chip, relative to the box origin.
    ///
    /// The chip sits on the top edge, overlapping the border, and grows
    /// upwards. `text_size` is the measured size of `text`.
    pub fn label_chip(&self, text_size: Size) -> Rect {
        let width = text_size.width + LABEL_PADDING.width;
        let height = text_size.height + LABEL_PADDING.height;
        Rect::new(0.0, -height + self.border_width, width, height)
    }
}

/// Something that displays overlay boxes.
pub trait DisplaySurface {
    /// Remove every box currently displayed.
    fn clear(&mut self);

    /// Add a box on top of those already displayed.
    fn add(&mut self, bounding_box: BoundingBox);
}

/// In-memory display surface.
#[derive(Clone, Debug, Default, Serialize)]
pub struct OverlaySet {
    boxes: Vec<BoundingBox>,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

impl DisplaySurface for OverlaySet {
    fn clear(&mut self) {
        self.boxes.clear();
    }

    fn add(&mut self, bounding_box: BoundingBox) {
        self.boxes.push(bounding_box);
    }
}

/// How normalized boxes reach screen space.
pub enum Viewport<'a> {
    /// A still image shown aspect-fit; boxes map onto its visible region.
    Image(VisibleRegion),
    /// Live camera preview; boxes go through the preview's point transform.
    Camera(&'a dyn PreviewTransform),
}

impl Viewport<'_> {
    pub fn to_screen(&self, normalized: Rect) -> Rect {
        match self {
            Viewport::Image(region) => region.denormalize(normalized),
            Viewport::Camera(preview) => preview.layer_rect(normalized),
        }
    }
}

/// Replace the contents of `surface` with boxes for `observations`.
///
/// Observations without a known best label are skipped. Returns the number
/// of boxes drawn.
pub fn render<S>(observations: &[Observation], viewport: &Viewport<'_>, surface: &mut S) -> usize
where
    S: DisplaySurface + ?Sized,
{
    surface.clear();
    let mut drawn = 0;
    for detection in observations.iter().filter_map(Detection::resolve) {
        let frame = viewport.to_screen(detection.bounding_box);
        surface.add(BoundingBox::new(frame, &detection));
        drawn += 1;
    }
    drawn
}
