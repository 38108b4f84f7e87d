//! radioline - radioguide station harvesting pipelines
//!
//! Crawls the station directory into a raw station list, then probes each
//! station's stream source for live metadata. The two stages are selected
//! independently and run in order when both are requested.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use radioline_radioguide::{Config, enrich, harvest};

#[derive(Parser)]
#[command(name = "radioline")]
#[command(about = "Radioguide station harvesting pipelines")]
#[command(version)]
struct Cli {
    /// Crawl the site into the raw station list
    #[arg(long)]
    harvest: bool,

    /// Probe harvested stations and write the enriched station list
    #[arg(long)]
    enrich: bool,

    /// Raw station list path (harvest output, enrich input)
    #[arg(long, default_value = "radio_guide_source.json")]
    source_file: PathBuf,

    /// Enriched station list path
    #[arg(long, default_value = "radio_guide.json")]
    output_file: PathBuf,

    /// Worker pool size per stage
    #[arg(short, long, default_value_t = 8)]
    workers: usize,

    /// Requests per second per worker client
    #[arg(long, default_value_t = 5.0)]
    requests_per_second: f64,

    /// Per-fetch timeout budget in seconds
    #[arg(long, default_value_t = 60)]
    http_timeout: u64,

    /// Worker idle timeout in seconds (safety net against a wedged producer)
    #[arg(long, default_value_t = 30)]
    idle_timeout: u64,

    /// Upstream HTTP proxy, host:port
    #[arg(long)]
    proxy: Option<String>,

    /// Only log warnings and errors
    #[arg(long, conflicts_with = "debug")]
    quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    radioline_core::init_logging(cli.quiet, cli.debug);

    if !cli.harvest && !cli.enrich {
        anyhow::bail!("nothing to do: pass --harvest and/or --enrich");
    }

    // SIGINT/SIGTERM stop every worker after its current task.
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop.clone())
        .context("cannot register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.clone())
        .context("cannot register SIGTERM handler")?;

    let config = Config {
        source_file: cli.source_file,
        output_file: cli.output_file,
        workers: cli.workers,
        requests_per_second: cli.requests_per_second,
        http_timeout: Duration::from_secs(cli.http_timeout),
        idle_timeout: Duration::from_secs(cli.idle_timeout),
        proxy: cli.proxy,
        ..Config::default()
    };

    if cli.harvest {
        harvest::run(&config, stop.clone())?;
    }
    if cli.enrich {
        if stop.load(std::sync::atomic::Ordering::Relaxed) {
            log::warn!("stop requested, skipping the enrich stage");
            return Ok(());
        }
        enrich::run(&config, stop)?;
    }
    Ok(())
}
