use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use dotmatrix_core::halftone::FillMode;
use dotmatrix_core::pipeline::{process_video, PipelineConfig, SamplingConfig};

use crate::progress::BarReporter;

#[derive(Args)]
pub struct RunArgs {
    /// Input video (anything ffmpeg decodes, or a .ser capture)
    pub input: PathBuf,

    /// Output video (.mp4, or .ser for a raw capture)
    pub output: PathBuf,

    /// Cell size in pixels
    pub dot_size: Option<u32>,

    /// Gap between cells in pixels
    pub spacing: Option<u32>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many output frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Draw flat white dots instead of toned ones
    #[arg(long)]
    pub mask: bool,

    /// x264 preset for the final encode
    #[arg(long)]
    pub preset: Option<String>,

    /// x264 constant rate factor (0-51, lower is better)
    #[arg(long)]
    pub crf: Option<u32>,
}

/// Sampling overrides shared by `run` and `info`.
#[derive(Args)]
pub struct SamplingArgs {
    /// Output frame rate
    #[arg(long)]
    pub fps: Option<f64>,

    /// Longer-edge pixel budget for downscaling
    #[arg(long, conflicts_with = "full_resolution")]
    pub budget: Option<u32>,

    /// Keep the source resolution
    #[arg(long)]
    pub full_resolution: bool,

    /// Frame rate assumed for SER files
    #[arg(long)]
    pub ser_fps: Option<f64>,
}

impl SamplingArgs {
    pub fn apply(&self, sampling: &mut SamplingConfig) {
        if let Some(fps) = self.fps {
            sampling.output_fps = fps;
        }
        if self.full_resolution {
            sampling.spatial_budget = None;
        } else if let Some(budget) = self.budget {
            sampling.spatial_budget = Some(budget);
        }
        if let Some(ser_fps) = self.ser_fps {
            sampling.ser_fps = ser_fps;
        }
    }
}

/// Load a TOML pipeline config, or the defaults when no file is given.
///
/// Paths are left as the file has them; callers fill them in.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Invalid pipeline config {}", path.display()))
        }
        None => Ok(PipelineConfig::new(PathBuf::new(), PathBuf::new())),
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;
    crate::summary::print_run_summary(&config);

    let summary = process_video(&config, Arc::new(BarReporter::new()))
        .with_context(|| format!("Failed to convert {}", config.input.display()))?;

    crate::summary::print_run_result(&summary, &config.output);
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = load_config(args.config.as_deref())?;

    config.input = args.input.clone();
    config.output = args.output.clone();
    if let Some(dot_size) = args.dot_size {
        config.effect.dot_size = dot_size;
    }
    if let Some(spacing) = args.spacing {
        config.effect.spacing = spacing;
    }
    if args.mask {
        config.effect.fill = FillMode::Mask;
    }
    args.sampling.apply(&mut config.sampling);
    if let Some(cap) = args.max_frames {
        config.sampling.max_output_frames = Some(cap);
    }
    if let Some(ref preset) = args.preset {
        config.encoder.preset = preset.clone();
    }
    if let Some(crf) = args.crf {
        config.encoder.crf = crf;
    }

    config.validate().context("Invalid settings")?;
    Ok(config)
}
