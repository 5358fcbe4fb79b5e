use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_ENCODER_CRF, DEFAULT_ENCODER_PRESET, DEFAULT_OUTPUT_FPS, DEFAULT_SER_FPS,
    DEFAULT_SPATIAL_BUDGET,
};
use crate::error::{DotMatrixError, Result};
use crate::halftone::EffectParams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Left empty in config files when the command line supplies it.
    #[serde(default)]
    pub input: PathBuf,
    #[serde(default)]
    pub output: PathBuf,
    #[serde(default)]
    pub effect: EffectParams,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            effect: EffectParams::default(),
            sampling: SamplingConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.effect.validate()?;
        self.sampling.validate()?;
        self.encoder.validate()?;
        if self.input.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(DotMatrixError::Config(
                "input and output paths are required".into(),
            ));
        }
        if self.input == self.output {
            return Err(DotMatrixError::Config(
                "input and output must be different files".into(),
            ));
        }
        Ok(())
    }
}

/// Temporal and spatial downsampling, plus resource bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Frame rate of the output stream.
    pub output_fps: f64,
    /// Longer-edge cap in pixels; `None` keeps the source resolution.
    pub spatial_budget: Option<u32>,
    /// Stop after this many output frames.
    pub max_output_frames: Option<u64>,
    /// Frame rate assumed for SER input, which stores none.
    pub ser_fps: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            output_fps: DEFAULT_OUTPUT_FPS,
            spatial_budget: Some(DEFAULT_SPATIAL_BUDGET),
            max_output_frames: None,
            ser_fps: DEFAULT_SER_FPS,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.output_fps.is_finite() || self.output_fps <= 0.0 {
            return Err(DotMatrixError::Config(format!(
                "output_fps must be positive, got {}",
                self.output_fps
            )));
        }
        if !self.ser_fps.is_finite() || self.ser_fps <= 0.0 {
            return Err(DotMatrixError::Config(format!(
                "ser_fps must be positive, got {}",
                self.ser_fps
            )));
        }
        if self.spatial_budget == Some(0) {
            return Err(DotMatrixError::Config(
                "spatial_budget must be at least 1 pixel".into(),
            ));
        }
        Ok(())
    }
}

/// Settings of the final x264 conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub preset: String,
    pub crf: u32,
    /// Move the index to the front of the file for progressive download.
    pub faststart: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            preset: DEFAULT_ENCODER_PRESET.into(),
            crf: DEFAULT_ENCODER_CRF,
            faststart: true,
        }
    }
}

const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        if !X264_PRESETS.contains(&self.preset.as_str()) {
            return Err(DotMatrixError::Config(format!(
                "unknown x264 preset '{}'",
                self.preset
            )));
        }
        if self.crf > 51 {
            return Err(DotMatrixError::Config(format!(
                "crf must be in 0..=51, got {}",
                self.crf
            )));
        }
        Ok(())
    }
}
