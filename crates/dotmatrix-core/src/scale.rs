use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, PixelFormat};
use crate::halftone::EffectParams;

/// Output geometry after capping the longer edge at a pixel budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalePlan {
    pub width: u32,
    pub height: u32,
    /// `min(1, budget / longer_edge)`; exactly 1.0 when no scaling happens.
    pub factor: f64,
}

impl ScalePlan {
    /// Plan the downscale of a `width`x`height` stream. `None` disables the cap.
    pub fn compute(width: u32, height: u32, budget: Option<u32>) -> Self {
        let longer = width.max(height);
        let factor = match budget {
            Some(budget) if longer > budget => budget as f64 / longer as f64,
            _ => 1.0,
        };
        if factor >= 1.0 {
            return Self {
                width,
                height,
                factor: 1.0,
            };
        }
        let scale = |v: u32| ((v as f64 * factor).round() as u32).max(1);
        Self {
            width: scale(width),
            height: scale(height),
            factor,
        }
    }

    pub fn is_active(&self) -> bool {
        self.factor < 1.0
    }

    /// Effect parameters matching the scaled geometry.
    pub fn apply_to_params(&self, params: &EffectParams) -> EffectParams {
        if self.is_active() {
            params.scaled(self.factor)
        } else {
            *params
        }
    }
}

/// Largest size with the same aspect ratio that fits inside `max_width`x`max_height`.
///
/// Images already inside the box are left alone.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let mut w = width as f64;
    let mut h = height as f64;
    if w > max_width as f64 {
        h = max_width as f64 * h / w;
        w = max_width as f64;
    }
    if h > max_height as f64 {
        w = max_height as f64 * w / h;
        h = max_height as f64;
    }
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Bilinear resample of a frame to `width`x`height`.
pub fn resize_frame(frame: &Frame, width: u32, height: u32) -> Result<Frame> {
    if width == 0 || height == 0 {
        return Err(DotMatrixError::InvalidDimensions { width, height });
    }
    let (src_w, src_h) = (frame.width() as u32, frame.height() as u32);
    if (src_w, src_h) == (width, height) {
        return Ok(frame.clone());
    }

    let bytes = frame.raw_bytes().into_owned();
    let invalid = || DotMatrixError::InvalidDimensions {
        width: src_w,
        height: src_h,
    };
    let resized = match frame.format() {
        PixelFormat::Gray => {
            let img = GrayImage::from_raw(src_w, src_h, bytes).ok_or_else(invalid)?;
            imageops::resize(&img, width, height, FilterType::Triangle).into_raw()
        }
        PixelFormat::Rgb => {
            let img = RgbImage::from_raw(src_w, src_h, bytes).ok_or_else(invalid)?;
            imageops::resize(&img, width, height, FilterType::Triangle).into_raw()
        }
    };

    let mut out = Frame::from_raw(width, height, frame.format(), resized)?;
    out.metadata = frame.metadata.clone();
    Ok(out)
}
