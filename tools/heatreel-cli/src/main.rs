//! Heatreel CLI: render sensor readings as a heatmap video over a floor plan.
//!
//! Usage:
//!   heatreel render <SCENE>     Render a scene to video (or still images)
//!   heatreel validate <SCENE>   Check a scene without rendering
//!   heatreel info <SCENE>       Show what a scene contains

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use heatreel_common::config::AppConfig;
use heatreel_common::logging::{init_logging, verbosity_filter};

mod commands;

#[derive(Parser)]
#[command(
    name = "heatreel",
    about = "Animated sensor heatmaps over floor plans",
    version,
    author
)]
struct Cli {
    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scene to an MP4 video
    Render {
        /// Path to the scene manifest (scene.json)
        scene: PathBuf,

        /// Output video; ".mp4" is appended when missing
        #[arg(short, long, conflicts_with = "frames_dir")]
        output: Option<PathBuf>,

        /// Write numbered PNG frames to this directory instead of a video
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// Output duration in seconds (overrides the scene)
        #[arg(long)]
        duration: Option<f64>,

        /// Decode camera footage on the render thread
        #[arg(long)]
        no_prefetch: bool,
    },

    /// Validate a scene without rendering
    Validate {
        /// Path to the scene manifest
        scene: PathBuf,
    },

    /// Show scene information
    Info {
        /// Path to the scene manifest
        scene: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = AppConfig::load();

    let mut logging = app_config.logging.clone();
    if let Some(level) = verbosity_filter(cli.verbose) {
        logging.level = level.to_string();
    }
    init_logging(&logging);

    match cli.command {
        Commands::Render {
            scene,
            output,
            frames_dir,
            duration,
            no_prefetch,
        } => commands::render::run(&app_config, scene, output, frames_dir, duration, no_prefetch),
        Commands::Validate { scene } => commands::validate::run(scene),
        Commands::Info { scene } => commands::info::run(scene),
    }
}
