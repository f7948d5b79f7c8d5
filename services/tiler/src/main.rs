//! Granule tiler.
//!
//! Cuts each granule into tiles along the configured dimension and writes
//! the tile records to the configured store, resuming from checkpoints
//! left by earlier runs.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use granule_reader::{GranuleOpener, ManifestOpener};
use tiler::config::{parse_log_level, GranuleFormat, TilerConfig};
use tiler::{load_config, TilingJob};

#[derive(Parser, Debug)]
#[command(name = "tiler")]
#[command(about = "Tile scientific granules into per-dimension slices")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "TILER_CONFIG", default_value = "/etc/tiler/config.yaml")]
    config: PathBuf,

    /// Log level (overrides the configuration file)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the tile specs of each granule without storing anything
    #[arg(long)]
    dry_run: bool,

    /// Granule files to tile
    #[arg(required = true)]
    granules: Vec<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(&config, args.log_level.as_deref())?;

    info!(
        config = %args.config.display(),
        granules = args.granules.len(),
        slice_by = %config.slicer.slice_by_dimension,
        "Starting granule tiler"
    );

    match config.granule.format {
        GranuleFormat::Manifest => run(ManifestOpener, &config, &args),
        #[cfg(feature = "netcdf")]
        GranuleFormat::Netcdf => run(granule_reader::NetCdfOpener, &config, &args),
        #[cfg(not(feature = "netcdf"))]
        GranuleFormat::Netcdf => anyhow::bail!("Built without NetCDF support"),
    }
}

fn init_logging(config: &TilerConfig, override_level: Option<&str>) -> Result<()> {
    let level_name = override_level.unwrap_or(&config.logging.level);
    let level = parse_log_level(level_name)?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.logging.format == "pretty" {
        tracing::subscriber::set_global_default(builder.pretty().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    }
    Ok(())
}

fn run<O: GranuleOpener>(opener: O, config: &TilerConfig, args: &Args) -> Result<()> {
    if args.dry_run {
        let job = TilingJob::new(
            opener,
            config.slicer.clone(),
            tiler_common::MemoryExecutionContext::new(),
            storage::MemoryTileStore::new(),
        );
        for path in &args.granules {
            let specs = job
                .plan_granule(path)
                .with_context(|| format!("Failed to plan {}", path.display()))?;
            info!(path = %path.display(), tiles = specs.len(), "Planned granule");
            for spec in specs {
                println!("{}\t{}", path.display(), spec);
            }
        }
        return Ok(());
    }

    let context = config.checkpoint.build()?;
    let store = config.store.build()?;
    let mut job = TilingJob::new(opener, config.slicer.clone(), context, store)
        .with_batch_size(config.store.batch_size);

    let summary = job.run(&args.granules);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    anyhow::ensure!(
        summary.is_success(),
        "{} of {} granule(s) failed",
        summary.failures.len(),
        args.granules.len()
    );
    Ok(())
}
