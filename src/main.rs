//! outbreak-cluster CLI
//!
//! Usage:
//!   outbreak-cluster run --input <cases> --output <labeled> [--summary <json>]
//!   outbreak-cluster window --input <cases> --date <YYYY-MM-DD> --output <labeled>
//!   outbreak-cluster watch --input <cases> --output <labeled> [--interval-secs 15]
//!   outbreak-cluster generate --output <cases> [--count 200] [--seed 42]
//!
//! Inputs and outputs are Parquet or CSV, chosen by file extension.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{error, info};

use outbreak_cluster::report::publish_labeled;
use outbreak_cluster::synthetic::SyntheticScenario;
use outbreak_cluster::{
    ClusterConfig, ClusterEngine, LabeledTable, OutbreakWindow, RecordBatch, drop_incomplete_rows,
    read_case_table, write_table,
};

#[derive(Parser)]
#[command(name = "outbreak-cluster")]
#[command(about = "Detect spatiotemporal outbreak clusters in disease case tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (OUTBREAK_* environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for persisted distance matrices
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Show progress over diagnosis groups
    #[arg(long, global = true)]
    progress: bool,
}

/// Where and how to publish a labeled table
#[derive(clap::Args, Clone)]
struct PublishArgs {
    /// Labeled output table (.parquet or .csv)
    #[arg(short, long)]
    output: PathBuf,

    /// Write a JSON cluster summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Leave noise rows out of the output table
    #[arg(long)]
    clustered_only: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster every case
    Run {
        /// Case table (.parquet or .csv)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        publish: PublishArgs,
    },

    /// Cluster the cases dated around a reference date
    Window {
        /// Case table (.parquet or .csv)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Half-width of the window in days (defaults to the configured window)
        #[arg(long)]
        days: Option<u32>,

        #[command(flatten)]
        publish: PublishArgs,
    },

    /// Re-run clustering on a fixed interval until interrupted
    Watch {
        /// Case table (.parquet or .csv), re-read on every run
        #[arg(short, long)]
        input: PathBuf,

        /// Seconds between runs
        #[arg(long, default_value = "15")]
        interval_secs: u64,

        /// Cluster a window around this date instead of every case
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Half-width of the window in days
        #[arg(long)]
        days: Option<u32>,

        #[command(flatten)]
        publish: PublishArgs,
    },

    /// Write a synthetic case table
    Generate {
        /// Output table (.parquet or .csv)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of cases
        #[arg(long, default_value = "200")]
        count: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// First case date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last case date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.cache_dir)?;

    match cli.command {
        Commands::Run { input, publish } => {
            let engine = ClusterEngine::new(config)?.with_progress(cli.progress);
            run_once(&engine, &input, None, &publish)?;
        }
        Commands::Window {
            input,
            date,
            days,
            publish,
        } => {
            let window = OutbreakWindow::new(date, days.unwrap_or(config.window_days));
            let engine = ClusterEngine::new(config)?.with_progress(cli.progress);
            run_once(&engine, &input, Some(window), &publish)?;
        }
        Commands::Watch {
            input,
            interval_secs,
            date,
            days,
            publish,
        } => {
            let window = date.map(|d| OutbreakWindow::new(d, days.unwrap_or(config.window_days)));
            let engine = Arc::new(ClusterEngine::new(config)?.with_progress(cli.progress));
            watch(engine, input, window, publish, interval_secs).await?;
        }
        Commands::Generate {
            output,
            count,
            seed,
            start,
            end,
        } => {
            let defaults = SyntheticScenario::default();
            let scenario = SyntheticScenario {
                count,
                seed,
                start: start.unwrap_or(defaults.start),
                end: end.unwrap_or(defaults.end),
                ..defaults
            };
            let batch = scenario.generate_batch(&config.columns)?;
            write_table(&output, &batch)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Generated {count} synthetic cases (seed {seed})");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, cache_dir: Option<PathBuf>) -> anyhow::Result<ClusterConfig> {
    let config = match path {
        Some(path) => ClusterConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ClusterConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid OUTBREAK_* environment override")?;
    if cache_dir.is_some() {
        config.cache_dir = cache_dir;
    }
    Ok(config)
}

/// Read, clean and cluster the input, then publish the result
fn run_once(
    engine: &ClusterEngine,
    input: &Path,
    window: Option<OutbreakWindow>,
    publish: &PublishArgs,
) -> anyhow::Result<()> {
    let columns = &engine.config().columns;
    let raw = read_case_table(input)
        .with_context(|| format!("Failed to read cases from {}", input.display()))?;
    let batch = drop_incomplete_rows(&raw, columns)
        .with_context(|| format!("Malformed case table {}", input.display()))?;

    let labeled = match &window {
        Some(window) => engine.cluster_window(&batch, window)?,
        None => engine.cluster_batch(&batch)?,
    };
    publish_run(engine, labeled, publish)
}

fn publish_run(engine: &ClusterEngine, labeled: LabeledTable, publish: &PublishArgs) -> anyhow::Result<()> {
    if !labeled.is_complete() {
        let failed: Vec<&str> = labeled
            .failures
            .iter()
            .map(|f| f.diagnosis.as_str())
            .collect();
        error!("Not publishing: clustering failed for {failed:?}");
    }
    let batch: RecordBatch = labeled
        .into_complete()
        .context("Run incomplete; previous output left untouched")?;

    let summary = publish_labeled(
        &batch,
        &engine.config().columns,
        &publish.output,
        publish.summary.as_deref(),
        publish.clustered_only,
    )
    .with_context(|| format!("Failed to publish {}", publish.output.display()))?;

    if let Some(summary) = summary {
        print!("{summary}");
    }
    Ok(())
}

/// Periodic re-run loop; a failed run is logged and the next tick retries
async fn watch(
    engine: Arc<ClusterEngine>,
    input: PathBuf,
    window: Option<OutbreakWindow>,
    publish: PublishArgs,
    interval_secs: u64,
) -> anyhow::Result<()> {
    if interval_secs == 0 {
        bail!("--interval-secs must be at least 1");
    }
    info!(
        "Watching {} every {interval_secs}s (Ctrl-C to stop)",
        input.display()
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let engine = Arc::clone(&engine);
                let input = input.clone();
                let publish = publish.clone();
                let result = tokio::task::spawn_blocking(move || {
                    run_once(&engine, &input, window, &publish)
                })
                .await
                .context("Clustering task panicked")?;
                if let Err(e) = result {
                    error!("Run failed: {e:#}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                return Ok(());
            }
        }
    }
}
