#![cfg(feature = "backend-tract")]

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use image::{imageops, Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::ModelRuntime;
use crate::detect::result::{Classification, Observation};
use crate::frame::{FrameView, Orientation};
use crate::geometry::Rect;

/// Settings for an ONNX detector.
#[derive(Clone, Debug)]
pub struct TractConfig {
    pub model_path: PathBuf,
    /// Model input width in pixels.
    pub input_width: u32,
    /// Model input height in pixels.
    pub input_height: u32,
    /// Regions whose best score is below this are discarded.
    pub threshold: f32,
    /// Class identifiers, in model output order.
    pub classes: Vec<String>,
}

/// Tract-based runtime for ONNX detection models.
///
/// Frames are aspect-fit into the model input with black padding. Expects one
/// input of shape `[1, 3, H, W]` (RGB, 0..1) and a first output
/// of shape `[1, N, 4 + C]`: per region `x_min, y_min, x_max, y_max`
/// normalized with a top-left origin, followed by one score per class.
pub struct TractRuntime {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    config: TractConfig,
}

impl TractRuntime {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new(config: TractConfig) -> Result<Self> {
        if config.classes.is_empty() {
            return Err(anyhow!("tract runtime needs at least one class"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(&config.model_path)
            .with_context(|| {
                format!(
                    "failed to load ONNX model from {}",
                    config.model_path.display()
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, config.input_height as usize, config.input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, config })
    }

    fn build_input(&self, frame: &FrameView<'_>) -> Result<(Tensor, Letterbox)> {
        let image = RgbImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let image = orient(image, frame.orientation());
        let (canvas, letterbox) =
            letterbox(&image, self.config.input_width, self.config.input_height);

        let input = tract_ndarray::Array4::from_shape_fn(
            (
                1,
                3,
                self.config.input_height as usize,
                self.config.input_width as usize,
            ),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok((input.into_tensor(), letterbox))
    }
}

impl ModelRuntime for TractRuntime {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &FrameView<'_>) -> Result<Vec<Observation>> {
        let (input, letterbox) = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        decode_output(output, &self.config.classes, self.config.threshold, letterbox)
    }
}

/// Rotate and mirror a decoded image so it is upright.
fn orient(image: RgbImage, orientation: Orientation) -> RgbImage {
    match orientation {
        Orientation::Up => image,
        Orientation::UpMirrored => imageops::flip_horizontal(&image),
        Orientation::Down => imageops::rotate180(&image),
        Orientation::DownMirrored => imageops::flip_vertical(&image),
        Orientation::LeftMirrored => imageops::flip_horizontal(&imageops::rotate90(&image)),
        Orientation::Right => imageops::rotate90(&image),
        Orientation::RightMirrored => imageops::flip_vertical(&imageops::rotate90(&image)),
        Orientation::Left => imageops::rotate270(&image),
    }
}

/// Where the image sits inside the model input, in normalized input
/// coordinates with a top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    offset_x: f64,
    offset_y: f64,
    scale_x: f64,
    scale_y: f64,
}

impl Letterbox {
    #[cfg(test)]
    const FULL: Letterbox = Letterbox {
        offset_x: 0.0,
        offset_y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    /// Map a normalized input point back to the normalized image.
    fn unmap(&self, x: f32, y: f32) -> (f64, f64) {
        (
            ((x as f64 - self.offset_x) / self.scale_x).clamp(0.0, 1.0),
            ((y as f64 - self.offset_y) / self.scale_y).clamp(0.0, 1.0),
        )
    }
}

/// Aspect-fit `image` into a black `width` x `height` canvas, centered.
fn letterbox(image: &RgbImage, width: u32, height: u32) -> (RgbImage, Letterbox) {
    let scale = f64::min(
        width as f64 / image.width() as f64,
        height as f64 / image.height() as f64,
    );
    let fitted_w = ((image.width() as f64 * scale).round() as u32).clamp(1, width);
    let fitted_h = ((image.height() as f64 * scale).round() as u32).clamp(1, height);
    let pad_x = (width - fitted_w) / 2;
    let pad_y = (height - fitted_h) / 2;

    let resized = imageops::resize(image, fitted_w, fitted_h, imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let letterbox = Letterbox {
        offset_x: pad_x as f64 / width as f64,
        offset_y: pad_y as f64 / height as f64,
        scale_x: fitted_w as f64 / width as f64,
        scale_y: fitted_h as f64 / height as f64,
    };
    (canvas, letterbox)
}

fn decode_output(
    output: &Tensor,
    classes: &[String],
    threshold: f32,
    letterbox: Letterbox,
) -> Result<Vec<Observation>> {
    let view = output
        .to_array_view::<f32>()
        .context("model output tensor was not f32")?;
    let stride = 4 + classes.len();
    if view.shape().last().copied() != Some(stride) {
        return Err(anyhow!(
            "model output shape {:?} does not end in {} (4 box values + {} classes)",
            view.shape(),
            stride,
            classes.len()
        ));
    }

    let values: Vec<f32> = view.iter().copied().collect();
    Ok(values
        .chunks_exact(stride)
        .filter_map(|row| decode_row(row, classes, threshold, letterbox))
        .collect())
}

fn decode_row(
    row: &[f32],
    classes: &[String],
    threshold: f32,
    letterbox: Letterbox,
) -> Option<Observation> {
    let (corners, scores) = row.split_at(4);
    let confidence = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !confidence.is_finite() || confidence < threshold {
        return None;
    }

    let (x0, y0) = letterbox.unmap(corners[0], corners[1]);
    let (x1, y1) = letterbox.unmap(corners[2], corners[3]);
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));

    Some(Observation {
        // Flip to a bottom-left origin.
        bounding_box: Rect::new(x0, 1.0 - y1, x1 - x0, y1 - y0),
        confidence: confidence.clamp(0.0, 1.0),
        labels: classes
            .iter()
            .zip(scores)
            .map(|(class, score)| Classification::new(class.clone(), *score))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec!["stop_sign".to_string(), "oneway_sign".to_string()]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn assert_rect(actual: Rect, expected: Rect) {
        assert!(
            close(actual.origin.x, expected.origin.x)
                && close(actual.origin.y, expected.origin.y)
                && close(actual.size.width, expected.size.width)
                && close(actual.size.height, expected.size.height),
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn row_is_flipped_to_bottom_left_origin() {
        let observation = decode_row(
            &[0.1, 0.2, 0.5, 0.6, 0.9, 0.3],
            &classes(),
            0.5,
            Letterbox::FULL,
        )
        .expect("row above threshold");
        assert_rect(observation.bounding_box, Rect::new(0.1, 0.4, 0.4, 0.4));
        assert!((observation.confidence - 0.9).abs() < 1e-6);
        assert_eq!(observation.labels[0].identifier, "stop_sign");
        assert_eq!(observation.labels[1].identifier, "oneway_sign");
        assert!((observation.labels[1].confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn rows_below_threshold_are_dropped() -> Result<()> {
        let output = tract_ndarray::Array3::from_shape_vec(
            (1, 2, 6),
            vec![
                0.0f32, 0.0, 1.0, 1.0, 0.2, 0.1, //
                0.1, 0.1, 0.3, 0.3, 0.1, 0.8,
            ],
        )?
        .into_tensor();
        let observations = decode_output(&output, &classes(), 0.5, Letterbox::FULL)?;
        assert_eq!(observations.len(), 1);
        assert!((observations[0].confidence - 0.8).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn stride_mismatch_is_an_error() -> Result<()> {
        let output = tract_ndarray::Array3::from_shape_vec((1, 1, 5), vec![0.0f32; 5])?
            .into_tensor();
        assert!(decode_output(&output, &classes(), 0.5, Letterbox::FULL).is_err());
        Ok(())
    }

    #[test]
    fn transposed_orientation_swaps_dimensions() {
        let image = RgbImage::new(2, 3);
        for orientation in [
            Orientation::LeftMirrored,
            Orientation::Right,
            Orientation::RightMirrored,
            Orientation::Left,
        ] {
            assert_eq!(orient(image.clone(), orientation).dimensions(), (3, 2));
        }
        assert_eq!(orient(image.clone(), Orientation::Down).dimensions(), (2, 3));
    }

    #[test]
    fn wide_image_is_letterboxed_vertically() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let (canvas, letterbox) = letterbox(&image, 100, 100);
        assert_eq!(canvas.dimensions(), (100, 100));
        assert_eq!(canvas.get_pixel(50, 10), &Rgb([0, 0, 0]));
        assert!(canvas.get_pixel(50, 50)[0] > 200);
        assert_eq!(
            letterbox,
            Letterbox {
                offset_x: 0.0,
                offset_y: 0.25,
                scale_x: 1.0,
                scale_y: 0.5,
            }
        );
    }

    #[test]
    fn letterbox_padding_is_removed_from_boxes() {
        let letterbox = Letterbox {
            offset_x: 0.0,
            offset_y: 0.25,
            scale_x: 1.0,
            scale_y: 0.5,
        };
        let observation = decode_row(&[0.0, 0.25, 1.0, 0.75, 0.9, 0.0], &classes(), 0.5, letterbox)
            .expect("row above threshold");
        assert_rect(observation.bounding_box, Rect::new(0.0, 0.0, 1.0, 1.0));
    }
}
