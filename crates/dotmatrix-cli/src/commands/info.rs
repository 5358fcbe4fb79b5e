use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dotmatrix_core::io::open_source;
use dotmatrix_core::pipeline::{OutputPlan, PipelineConfig, StreamOptions};

use super::run::{load_config, SamplingArgs};

#[derive(Args)]
pub struct InfoArgs {
    /// Input video or SER file
    pub file: PathBuf,

    /// Cell size used for the plan
    #[arg(long)]
    pub dot_size: Option<u32>,

    /// Cell spacing used for the plan
    #[arg(long)]
    pub spacing: Option<u32>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub sampling: SamplingArgs,
}

/// Settings the plan is derived from, resolved the same way `run` does.
fn plan_config(args: &InfoArgs) -> Result<PipelineConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(dot_size) = args.dot_size {
        config.effect.dot_size = dot_size;
    }
    if let Some(spacing) = args.spacing {
        config.effect.spacing = spacing;
    }
    args.sampling.apply(&mut config.sampling);
    config.sampling.validate().context("Invalid settings")?;
    Ok(config)
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let config = plan_config(args)?;
    let mut source = open_source(&args.file, config.sampling.ser_fps)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let descriptor = source.descriptor().clone();
    source.release()?;

    let plan = OutputPlan::new(
        &descriptor,
        &config.effect,
        &StreamOptions::from(&config.sampling),
    )?;
    crate::summary::print_stream_info(&args.file, &descriptor, &plan);

    Ok(())
}
