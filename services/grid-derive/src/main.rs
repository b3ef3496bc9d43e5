//! Grid derivation command-line tool.
//!
//! Reads a JSON request describing a base grid geometry and the derivation
//! steps to apply (rounding, subgrid or slice, reduce), runs the derivation
//! and prints the derived grid geometry as JSON on stdout.

mod request;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use grid_geometry::{DerivationConfig, GridRoundingMode};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use request::DerivationRequest;

#[derive(Parser, Debug)]
#[command(name = "grid-derive")]
#[command(about = "Derive sub-grids, slices and subsampled grids from a base grid geometry")]
struct Args {
    /// JSON request file
    #[arg(short, long, env = "GRID_REQUEST")]
    request: PathBuf,

    /// Default rounding mode (nearest, contained, enclosing)
    #[arg(long)]
    rounding: Option<String>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing on stderr, stdout carries the result
    let builder = fmt()
        .with_env_filter(log_filter(&args.log_level))
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let mut config = DerivationConfig::from_env();
    if let Some(rounding) = &args.rounding {
        config.rounding = GridRoundingMode::from_str(rounding);
    }
    info!(
        request = %args.request.display(),
        rounding = %config.rounding,
        strict_resolution = config.strict_resolution,
        "Starting grid derivation"
    );

    let request = DerivationRequest::from_file(&args.request)?;
    let output = request.execute(&config)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!("Grid derivation complete");
    Ok(())
}

/// `RUST_LOG` when set, otherwise the `--log-level` directives.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
