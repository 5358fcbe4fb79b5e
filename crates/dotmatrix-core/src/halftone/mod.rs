pub mod cells;
pub mod raster;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_DOT_SIZE, DEFAULT_SPACING};
use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, PixelFormat};
use crate::scale::{fit_within, resize_frame};

use cells::cell_means;
use raster::{dot_radius, fill_circle};

/// How a dot is colored once its radius is known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    /// Dot takes the cell's mean luminance.
    #[default]
    Tone,
    /// Every dot is flat white, producing a binary dot mask.
    Mask,
}

impl std::fmt::Display for FillMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tone => write!(f, "Tone"),
            Self::Mask => write!(f, "Mask"),
        }
    }
}

/// Parameters of the dot-matrix effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    /// Cell edge length in pixels.
    pub dot_size: u32,
    /// Gap between neighboring cells in pixels.
    pub spacing: u32,
    pub fill: FillMode,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            dot_size: DEFAULT_DOT_SIZE,
            spacing: DEFAULT_SPACING,
            fill: FillMode::Tone,
        }
    }
}

impl EffectParams {
    pub fn new(dot_size: u32, spacing: u32) -> Self {
        Self {
            dot_size,
            spacing,
            fill: FillMode::Tone,
        }
    }

    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dot_size == 0 {
            return Err(DotMatrixError::InvalidParams(
                "dot size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Distance between the top-left corners of neighboring cells.
    pub fn step(&self) -> usize {
        self.dot_size as usize + self.spacing as usize
    }

    /// Radius of a dot drawn for a fully white cell.
    pub fn max_radius(&self) -> u32 {
        self.dot_size / 2
    }

    /// Rescale proportionally to a spatial downscale factor.
    ///
    /// Both values are floored and then clamped to at least 1, so the effect
    /// never collapses into a no-op grid.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |v: u32| ((v as f64 * factor).floor() as u32).max(1);
        Self {
            dot_size: scale(self.dot_size),
            spacing: scale(self.spacing),
            fill: self.fill,
        }
    }
}

/// Apply the dot-matrix effect, keeping the input's pixel format.
pub fn transform(frame: &Frame, params: &EffectParams) -> Frame {
    render(frame, params, frame.format())
}

/// Apply the dot-matrix effect and render into `format`.
///
/// The output has the same width and height as `frame`. The background is
/// black; each cell gets one filled circle whose radius grows with the cell's
/// mean luminance.
pub fn render(frame: &Frame, params: &EffectParams, format: PixelFormat) -> Frame {
    let luma = frame.luminance();
    let (h, w) = luma.dim();
    let mut canvas = Array3::<u8>::zeros((h, w, format.channels()));

    let half = (params.dot_size / 2) as i64;
    for cell in cell_means(&luma, params) {
        let radius = dot_radius(cell.mean, params.dot_size);
        if radius == 0 {
            continue;
        }
        let value = match params.fill {
            FillMode::Tone => cell.mean.round().clamp(0.0, 255.0) as u8,
            FillMode::Mask => u8::MAX,
        };
        fill_circle(
            &mut canvas,
            cell.x as i64 + half,
            cell.y as i64 + half,
            radius,
            value,
        );
    }

    Frame {
        data: canvas,
        metadata: frame.metadata.clone(),
    }
}

/// Still-image variant: shrink `image` to fit inside `max_width`x`max_height`
/// (aspect preserved, never enlarged), then apply the effect.
pub fn transform_image(
    image: &Frame,
    params: &EffectParams,
    max_width: u32,
    max_height: u32,
) -> Result<Frame> {
    params.validate()?;
    if max_width == 0 || max_height == 0 {
        return Err(DotMatrixError::InvalidDimensions {
            width: max_width,
            height: max_height,
        });
    }
    let (w, h) = fit_within(
        image.width() as u32,
        image.height() as u32,
        max_width,
        max_height,
    );
    let fitted = resize_frame(image, w, h)?;
    Ok(transform(&fitted, params))
}
