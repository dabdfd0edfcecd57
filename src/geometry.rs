//! Screen and normalized geometry.
//!
//! Detector output uses normalized rectangles: fractions of the image size with
//! the origin in the bottom-left corner. Screen rectangles use points with the
//! origin in the top-left corner of the overlay surface.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle.
///
/// Used for both normalized detector boxes and screen-space frames; the
/// coordinate space is a property of where the value came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Rectangle spanning two arbitrary corners.
    ///
    /// Corners may arrive in any order (a transform can invert either axis).
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
        )
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x.min(self.origin.x + self.size.width)
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x.max(self.origin.x + self.size.width)
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y.min(self.origin.y + self.size.height)
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y.max(self.origin.y + self.size.height)
    }

    pub fn width(&self) -> f64 {
        self.size.width.abs()
    }

    pub fn height(&self) -> f64 {
        self.size.height.abs()
    }
}

/// Region of a container actually covered by a displayed image.
///
/// An aspect-fit image leaves letterbox padding on two sides; normalized
/// detector boxes map only onto this region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibleRegion {
    pub origin: Point,
    pub size: Size,
}

impl VisibleRegion {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Region that fills the whole container (no letterbox).
    pub fn filling(container: Size) -> Self {
        Self::new(Point::default(), container)
    }

    /// Region covered by `image` scaled to fit inside `container`, centred.
    pub fn aspect_fit(image: Size, container: Size) -> Self {
        if image.is_empty() || container.is_empty() {
            return Self::new(Point::default(), Size::default());
        }
        let scale = (container.width / image.width).min(container.height / image.height);
        let size = Size::new(image.width * scale, image.height * scale);
        let origin = Point::new(
            (container.width - size.width) / 2.0,
            (container.height - size.height) / 2.0,
        );
        Self::new(origin, size)
    }

    /// Map a normalized (bottom-left origin) box onto this region.
    pub fn denormalize(&self, normalized: Rect) -> Rect {
        Rect::new(
            normalized.min_x() * self.size.width + self.origin.x,
            (1.0 - normalized.max_y()) * self.size.height + self.origin.y,
            normalized.width() * self.size.width,
            normalized.height() * self.size.height,
        )
    }
}

/// Live preview coordinate conversion.
///
/// Implemented by whatever owns the camera preview; maps a normalized capture
/// device point to a point on the preview layer.
pub trait PreviewTransform {
    fn device_point_to_layer_point(&self, point: Point) -> Point;

    /// Map a normalized detector box through both of its corners.
    fn layer_rect(&self, normalized: Rect) -> Rect {
        let p1 = self.device_point_to_layer_point(Point::new(normalized.min_x(), normalized.min_y()));
        let p2 = self.device_point_to_layer_point(Point::new(normalized.max_x(), normalized.max_y()));
        Rect::from_corners(p1, p2)
    }
}

/// Preview that shows the full camera frame aspect-fit inside its layer.
///
/// Device points use the detector convention (normalized, bottom-left
/// origin), so the vertical axis is flipped on the way to the layer.
#[derive(Clone, Copy, Debug)]
pub struct ResizeAspectPreview {
    visible: VisibleRegion,
}

impl ResizeAspectPreview {
    pub fn new(frame: Size, layer_bounds: Size) -> Self {
        Self {
            visible: VisibleRegion::aspect_fit(frame, layer_bounds),
        }
    }

    pub fn visible_region(&self) -> VisibleRegion {
        self.visible
    }
}

impl PreviewTransform for ResizeAspectPreview {
    fn device_point_to_layer_point(&self, point: Point) -> Point {
        Point::new(
            self.visible.origin.x + point.x * self.visible.size.width,
            self.visible.origin.y + (1.0 - point.y) * self.visible.size.height,
        )
    }
}
