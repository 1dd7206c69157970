//! Command-line front end: convert observed pixels to world coordinates.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use vision_positioning::{PositioningConfig, Pt2};

#[derive(Debug, Parser)]
#[command(name = "vision-positioning")]
#[command(about = "Image-to-world positioning through a calibrated camera")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Solve one or more pixels against a positioning config.
    Solve {
        /// Path to a JSON PositioningConfig.
        #[arg(long)]
        config: PathBuf,

        /// Pixel as `X,Y`; may be repeated.
        #[arg(long = "pixel", value_parser = parse_pixel, required = true)]
        pixels: Vec<Pt2>,
    },
    /// Print a default config to start from.
    Template,
}

/// One line of `solve` output.
#[derive(Debug, Serialize)]
struct PixelResult {
    pixel: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    world: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_pixel(s: &str) -> Result<Pt2> {
    let Some((x, y)) = s.split_once(',') else {
        bail!("expected X,Y but got `{s}`");
    };
    let x: f64 = x.trim().parse().with_context(|| format!("bad X in `{s}`"))?;
    let y: f64 = y.trim().parse().with_context(|| format!("bad Y in `{s}`"))?;
    Ok(Pt2::new(x, y))
}

fn run_solve(config_path: &Path, pixels: &[Pt2]) -> Result<String> {
    let config = PositioningConfig::from_json_file(config_path)?;
    let solver = config
        .build()
        .with_context(|| format!("invalid config {}", config_path.display()))?;

    let results: Vec<PixelResult> = pixels
        .iter()
        .zip(solver.solve_many(pixels))
        .map(|(pixel, result)| match result {
            Ok(world) => {
                tracing::info!("({}, {}) -> ({:.3}, {:.3})", pixel.x, pixel.y, world.x, world.y);
                PixelResult {
                    pixel: [pixel.x, pixel.y],
                    world: Some([world.x, world.y]),
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!("({}, {}) failed: {err}", pixel.x, pixel.y);
                PixelResult {
                    pixel: [pixel.x, pixel.y],
                    world: None,
                    error: Some(err.to_string()),
                }
            }
        })
        .collect();

    Ok(serde_json::to_string_pretty(&results)?)
}

fn run_template() -> Result<String> {
    Ok(serde_json::to_string_pretty(&PositioningConfig::template())?)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let json = match cli.command {
        Commands::Solve { config, pixels } => run_solve(&config, &pixels)?,
        Commands::Template => run_template()?,
    };
    println!("{json}");
    Ok(())
}
