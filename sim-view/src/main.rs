//! Application entry point for the orb field viewer.
//!
//! Loads the configuration, starts the simulation host thread and hands
//! both to [`Viewer`] running inside eframe.

mod adapter;
mod viewer;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use orbfield_core::{LogoConfig, spawn_host};
use tracing::info;

use adapter::DisplayAdapter;
use viewer::Viewer;

#[derive(Parser, Debug)]
#[command(version, about = "Animated orb and gas logo", long_about = None)]
struct Args {
    /// YAML file with simulation and display settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render one settled frame instead of animating.
    #[arg(long = "static", action)]
    static_frame: bool,

    /// Force a square surface.
    #[arg(long, action)]
    square: bool,

    /// Seed for reproducible layouts.
    #[arg(long)]
    seed: Option<u64>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(args: &Args) -> Result<LogoConfig> {
    let mut config = match &args.config {
        Some(path) => LogoConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LogoConfig::default(),
    };
    config.static_frame |= args.static_frame;
    config.square |= args.square;
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;
    info!(mode = ?config.mode(), square = config.square, "starting viewer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("orbfield")
            .with_inner_size([960.0, 540.0]),
        ..Default::default()
    };

    eframe::run_native(
        "orbfield",
        options,
        Box::new(move |_cc| {
            let adapter = DisplayAdapter::new(config, spawn_host(args.seed));
            Ok(Box::new(Viewer::new(adapter)))
        }),
    )
    .map_err(|err| anyhow!("viewer failed: {err}"))
}
