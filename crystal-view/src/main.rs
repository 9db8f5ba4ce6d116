//! Application entry point for the Data Crystals viewer.
//!
//! This binary parses the command line, sets up logging, loads the
//! configuration and dataset, then hands everything to [`Viewer`] from the
//! `viewer` module running inside eframe.

mod viewer;

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use crystal_core::{config::CrystalConfig, dataset::Dataset};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::Viewer;

/// Raw coordinate range of the synthetic dataset (before the 1/20 scale).
const SYNTHETIC_HALF_RANGE: f32 = 2000.0;

#[derive(Parser, Debug)]
#[command(name = "data-crystals", version)]
#[command(about = "Watch tabular point data self-organize into a single crystal")]
struct Args {
    /// CSV file, or directory of CSV files; a random dataset is used if omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the jiggle (and synthetic data) random generator
    #[arg(long)]
    seed: Option<u64>,

    /// Number of synthetic points
    #[arg(long, default_value_t = 400)]
    points: usize,

    /// Number of synthetic categories
    #[arg(long, default_value_t = 5)]
    categories: i32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if the config or dataset cannot be loaded, or eframe fails to
///   create the native window or event loop.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let cfg = match &args.config {
        Some(path) => CrystalConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CrystalConfig::default(),
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let dataset = match &args.input {
        Some(path) => Dataset::from_path(path, &cfg.dataset)
            .with_context(|| format!("loading dataset {}", path.display()))?,
        None => {
            info!(points = args.points, "no input given, generating random dataset");
            Dataset::random(args.points, args.categories, SYNTHETIC_HALF_RANGE, &mut rng)
        }
    };

    let viewer = Viewer::new(cfg, dataset, rng).context("building viewer")?;

    eframe::run_native(
        "Data Crystals",
        eframe::NativeOptions::default(),
        Box::new(|_cc| Ok(Box::new(viewer))),
    )
    .map_err(|e| anyhow!("eframe: {e}"))
}
