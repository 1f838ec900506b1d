// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use gpu_filter::EffectKind;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "gpu-filter")]
#[command(about = "Apply shader-defined filters to images on the GPU")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/gpu-filter/config.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter an image file
    Apply {
        /// Input image (any format the image crate reads)
        input: PathBuf,

        /// Output image (format from extension)
        output: PathBuf,

        /// Built-in effect (see 'gpu-filter effects')
        #[arg(short, long)]
        effect: Option<EffectKind>,

        /// Custom WGSL effect body, used instead of a built-in effect
        #[arg(long, conflicts_with = "effect")]
        shader: Option<PathBuf>,

        /// Fragment function of the custom shader
        #[arg(long, default_value = "fragment_main", requires = "shader")]
        fragment: String,

        /// Device pixel ratio; the image size is treated as physical pixels
        #[arg(long)]
        scale: Option<f32>,
    },

    /// List built-in effects
    Effects,

    /// Show the GPU adapter that would be used
    Info,

    /// Print the effective configuration, optionally writing it to disk
    Config {
        /// Write to the config path instead of printing
        #[arg(short, long)]
        write: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=gpu_filter=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            input,
            output,
            effect,
            shader,
            fragment,
            scale,
        } => cli::apply(cli::ApplyArgs {
            config: cli.config,
            input,
            output,
            effect,
            shader,
            fragment,
            scale,
        }),
        Commands::Effects => cli::list_effects(),
        Commands::Info => cli::show_info(),
        Commands::Config { write } => cli::show_config(cli.config, write),
    }
}
