use std::borrow::Cow;

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::consts::{COLOR_CHANNEL_COUNT, LUMINANCE_B, LUMINANCE_G, LUMINANCE_R};
use crate::error::{DotMatrixError, Result};

/// Channel layout of a frame's pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray,
    Rgb,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => COLOR_CHANNEL_COUNT,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gray => write!(f, "Gray"),
            Self::Rgb => write!(f, "RGB"),
        }
    }
}

/// A single decoded video frame.
/// Pixel values are u8 in [0, 255].
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width, channels)
    pub data: Array3<u8>,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array3<u8>) -> Self {
        Self {
            data,
            metadata: FrameMetadata::default(),
        }
    }

    /// All-zero frame of the given size.
    pub fn black(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::new(Array3::zeros((
            height as usize,
            width as usize,
            format.channels(),
        )))
    }

    /// Wrap a single-channel grid.
    pub fn from_gray(data: Array2<u8>) -> Self {
        Self::new(data.insert_axis(Axis(2)))
    }

    /// Build a frame from interleaved bytes (`width * height * channels` long).
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, bytes: Vec<u8>) -> Result<Self> {
        let shape = (height as usize, width as usize, format.channels());
        let data = Array3::from_shape_vec(shape, bytes)
            .map_err(|_| DotMatrixError::InvalidDimensions { width, height })?;
        Ok(Self::new(data))
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn format(&self) -> PixelFormat {
        if self.channels() == 1 {
            PixelFormat::Gray
        } else {
            PixelFormat::Rgb
        }
    }

    /// Interleaved row-major bytes, borrowed when the array is contiguous.
    pub fn raw_bytes(&self) -> Cow<'_, [u8]> {
        match self.data.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.data.iter().copied().collect()),
        }
    }

    /// Single-channel luminance grid. Gray frames are returned as-is.
    pub fn luminance(&self) -> Array2<u8> {
        match self.format() {
            PixelFormat::Gray => self.data.index_axis(Axis(2), 0).to_owned(),
            PixelFormat::Rgb => {
                let (h, w, _) = self.data.dim();
                Array2::from_shape_fn((h, w), |(row, col)| {
                    luma(
                        self.data[[row, col, 0]],
                        self.data[[row, col, 1]],
                        self.data[[row, col, 2]],
                    )
                })
            }
        }
    }

    /// Convert to another pixel format. Gray is replicated into RGB;
    /// RGB collapses to luminance.
    pub fn to_format(&self, format: PixelFormat) -> Frame {
        if format == self.format() {
            return self.clone();
        }
        let data = match format {
            PixelFormat::Gray => self.luminance().insert_axis(Axis(2)),
            PixelFormat::Rgb => {
                let (h, w, _) = self.data.dim();
                Array3::from_shape_fn((h, w, COLOR_CHANNEL_COUNT), |(row, col, _)| {
                    self.data[[row, col, 0]]
                })
            }
        };
        Frame {
            data,
            metadata: self.metadata.clone(),
        }
    }
}

/// BT.601 luma of one RGB pixel, rounded to the nearest integer.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = LUMINANCE_R * r as f32 + LUMINANCE_G * g as f32 + LUMINANCE_B * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameMetadata {
    /// 0-based position of the frame in the decoded source stream.
    pub frame_index: u64,
}

/// Stream properties read once when a source is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoStreamDescriptor {
    pub width: u32,
    pub height: u32,
    pub input_fps: f64,
    /// Frame count reported by the container, if any.
    pub total_frames: Option<u64>,
}

impl VideoStreamDescriptor {
    /// A stream with no pixels or no usable frame rate cannot be processed.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DotMatrixError::Open(format!(
                "video stream has invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        if !self.input_fps.is_finite() || self.input_fps <= 0.0 {
            return Err(DotMatrixError::Open(format!(
                "video stream reports invalid frame rate {}",
                self.input_fps
            )));
        }
        Ok(())
    }

    pub fn longer_edge(&self) -> u32 {
        self.width.max(self.height)
    }
}
