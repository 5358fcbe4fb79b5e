mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dotmatrix", about = "Dot-matrix video stylizer")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a video into its dot-matrix rendition
    Run(commands::run::RunArgs),
    /// Serve the conversion over HTTP
    Serve(commands::serve::ServeArgs),
    /// Apply the effect to a still image
    Image(commands::image::ImageArgs),
    /// Show video stream metadata and the derived output plan
    Info(commands::info::InfoArgs),
    /// Print or save the default pipeline config as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if matches!(cli.command, Commands::Serve(_)) {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Serve(args) => commands::serve::run(args),
        Commands::Image(args) => commands::image::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
