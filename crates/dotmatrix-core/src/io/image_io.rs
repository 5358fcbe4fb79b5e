use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, PixelFormat};

/// Load any image the `image` crate understands as an RGB frame.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    from_dynamic(&img)
}

/// Convert a decoded image into an RGB frame.
pub fn from_dynamic(img: &DynamicImage) -> Result<Frame> {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    Frame::from_raw(w, h, PixelFormat::Rgb, rgb.into_raw())
}

/// Wrap a frame's pixels in an `image` buffer of the matching color type.
pub fn to_dynamic(frame: &Frame) -> Result<DynamicImage> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let bytes = frame.raw_bytes().into_owned();
    let invalid = || DotMatrixError::InvalidDimensions {
        width: w,
        height: h,
    };
    Ok(match frame.format() {
        PixelFormat::Gray => DynamicImage::ImageLuma8(
            GrayImage::from_raw(w, h, bytes).ok_or_else(invalid)?,
        ),
        PixelFormat::Rgb => {
            DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, bytes).ok_or_else(invalid)?)
        }
    })
}

/// Save a frame, choosing the image format from the file extension.
pub fn save_image(frame: &Frame, path: &Path) -> Result<()> {
    to_dynamic(frame)?.save(path)?;
    Ok(())
}
