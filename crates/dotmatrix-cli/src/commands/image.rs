use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dotmatrix_core::consts::{
    DEFAULT_DOT_SIZE, DEFAULT_IMAGE_MAX_HEIGHT, DEFAULT_IMAGE_MAX_WIDTH, DEFAULT_SPACING,
};
use dotmatrix_core::halftone::{transform_image, EffectParams, FillMode};
use dotmatrix_core::io::image_io::{load_image, save_image};

#[derive(Args)]
pub struct ImageArgs {
    /// Input image
    pub input: PathBuf,

    /// Output image (format from extension)
    pub output: PathBuf,

    /// Cell size in pixels
    #[arg(long, default_value_t = DEFAULT_DOT_SIZE)]
    pub dot_size: u32,

    /// Gap between cells in pixels
    #[arg(long, default_value_t = DEFAULT_SPACING)]
    pub spacing: u32,

    /// Bounding box width
    #[arg(long, default_value_t = DEFAULT_IMAGE_MAX_WIDTH)]
    pub max_width: u32,

    /// Bounding box height
    #[arg(long, default_value_t = DEFAULT_IMAGE_MAX_HEIGHT)]
    pub max_height: u32,

    /// Fill dots with the cell tone instead of white
    #[arg(long)]
    pub tone: bool,
}

pub fn run(args: &ImageArgs) -> Result<()> {
    let fill = if args.tone {
        FillMode::Tone
    } else {
        FillMode::Mask
    };
    let params = EffectParams::new(args.dot_size, args.spacing).with_fill(fill);

    let image = load_image(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let styled = transform_image(&image, &params, args.max_width, args.max_height)?;
    save_image(&styled, &args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;

    println!(
        "Saved {}x{} dot-matrix image to {}",
        styled.width(),
        styled.height(),
        args.output.display()
    );
    Ok(())
}
