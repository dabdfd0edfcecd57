//! Still images picked by the user.

use std::path::Path;

use anyhow::{Context, Result};

use crate::frame::{Frame, Orientation};

/// Decode an image file into a still frame.
///
/// `orientation` is the raw EXIF-style tag reported alongside the image
/// (1..=8); `None` means the pixels are already upright. The tag is not
/// checked here: an invalid one makes the detector skip the frame.
pub fn load_still(path: &Path, orientation: Option<u32>) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    log::debug!("decoded still {} ({}x{})", path.display(), width, height);
    Ok(Frame::still(
        image.into_raw(),
        width,
        height,
        orientation.unwrap_or(Orientation::Up.raw()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn png_round_trips_into_a_still_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sign.png");
        RgbImage::from_pixel(6, 4, Rgb([200, 10, 10])).save(&path)?;

        let frame = load_still(&path, None)?;
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(&frame.view()?.pixels()[..3], &[200, 10, 10]);
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_still(Path::new("/nonexistent/sign.jpg"), None).is_err());
    }
}
