//! Street map renderer.
//!
//! Fetches roads and paths from OpenStreetMap, county land and water from
//! the Census TIGER/Line files, composes them and writes a PNG.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mapmaker::{JobConfig, Pipeline, Sources};

#[derive(Parser, Debug)]
#[command(name = "mapmaker")]
#[command(about = "Render a street map from OpenStreetMap and TIGER/Line data")]
struct Args {
    /// Job file (YAML)
    #[arg(short, long, env = "MAPMAKER_CONFIG", default_value = "config/lansing.yaml")]
    config: PathBuf,

    /// Output image path (overrides the job file)
    #[arg(short, long, env = "MAPMAKER_OUTPUT")]
    output: Option<PathBuf>,

    /// Output resolution (overrides the job file)
    #[arg(long, env = "MAPMAKER_DPI")]
    dpi: Option<u32>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let mut job = JobConfig::load(&args.config)?;
    if let Some(output) = args.output {
        job.output.path = output;
    }
    if let Some(dpi) = args.dpi {
        job.output.dpi = dpi;
    }

    info!(config = %args.config.display(), "Starting mapmaker");

    let sources = Sources::from_config(&job).context("Failed to set up data sources")?;
    let pipeline = Pipeline::new(sources, &job);
    let output = pipeline.run(&job).await?;

    for (layer, count) in &output.layers {
        info!(layer = %layer, features = count, "Layer drawn");
    }
    info!(
        path = %output.path.display(),
        width = output.width,
        height = output.height,
        "Map written"
    );

    Ok(())
}
