//! Carbonara metric daemon
//!
//! Runs the processing workers, and offers administrative commands:
//! - Create the staging area
//! - Stage measures
//! - Process staged measures synchronously
//! - Show aggregates and the backlog

use anyhow::Context;
use carbonara::carbonara::{AggregationMethod, Measure};
use carbonara::config::{generate_default_config, Config};
use carbonara::coordination::{FileLockManager, LocalCoordinator};
use carbonara::incoming::{FileStaging, Incoming, StagingStore};
use carbonara::indexer::{ArchivePolicy, MetadataProvider, StaticIndexer};
use carbonara::processing::{get_measures, process_new_measures_for_sack, Metricd, ProcessingContext};
use carbonara::storage::{FileBlobStore, MetricStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "carbonara-metricd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental time-series aggregation daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the processing workers until interrupted
    Run,

    /// Create the staging area with the configured number of sacks
    Upgrade,

    /// Stage one measure
    Add {
        /// Metric id
        metric: Uuid,
        /// Value
        value: f64,
        /// Timestamp (default: now). Supports ISO 8601 or Unix seconds
        #[arg(short, long)]
        time: Option<String>,
    },

    /// Process every staged measure now
    Process,

    /// Show aggregated measures of a metric
    Show {
        /// Metric id
        metric: Uuid,
        /// Aggregation method (mean, max, 95pct, rate:sum, ...)
        #[arg(short, long, default_value = "mean")]
        aggregation: String,
        /// Granularity in seconds
        #[arg(short, long)]
        granularity: i64,
        /// Resample to this granularity, in seconds
        #[arg(short, long)]
        resample: Option<i64>,
    },

    /// Show the backlog of staged measures
    Report {
        /// Include per-metric counts
        #[arg(short, long)]
        details: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("carbonara={}", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn parse_time(time: Option<&str>) -> anyhow::Result<i64> {
    let nanos = match time {
        None | Some("now") => chrono::Utc::now().timestamp_nanos_opt(),
        Some(s) => {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                dt.timestamp_nanos_opt()
            } else if let Ok(secs) = s.parse::<f64>() {
                Some((secs * 1e9) as i64)
            } else {
                anyhow::bail!("Invalid timestamp format: {}", s);
            }
        }
    };
    nanos.context("timestamp out of range")
}

async fn open_staging(config: &Config) -> anyhow::Result<Arc<FileStaging>> {
    let path = config.incoming_path();
    let staging = FileStaging::open(&path)
        .await
        .with_context(|| format!("opening staging area {:?}", path))?;
    Ok(Arc::new(staging))
}

async fn build_context(config: &Config) -> anyhow::Result<ProcessingContext> {
    let policy = ArchivePolicy::builtin(&config.metricd.default_archive_policy)
        .with_context(|| format!("unknown archive policy {}", config.metricd.default_archive_policy))?;

    let blobs = FileBlobStore::open(config.storage_path())
        .await
        .context("opening metric storage")?;
    let incoming = Incoming::open(open_staging(config).await?)
        .await
        .context("staging area is not initialized, run `carbonara-metricd upgrade`")?;
    let locks = FileLockManager::open(config.lock_path())
        .await
        .context("opening lock directory")?;

    Ok(ProcessingContext::new(
        MetricStore::new(Arc::new(blobs)),
        incoming,
        Arc::new(StaticIndexer::with_default_policy(policy)),
        Arc::new(locks),
        Arc::new(LocalCoordinator::new()),
    )
    .with_parallelism(config.metricd.parallelism))
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Generating a config must not depend on an existing one
    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_ref());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    config.validate()?;
    init_logging(&config);

    match cli.command {
        Commands::Run => {
            tracing::info!("Carbonara metric daemon v{}", env!("CARGO_PKG_VERSION"));
            let ctx = build_context(&config).await?;
            let metricd = Metricd::start(ctx, &config.metricd);

            tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
            tracing::info!("Shutting down...");
            metricd.shutdown().await;
            tracing::info!("Carbonara shutdown complete");
        }

        Commands::Upgrade => {
            let staging = open_staging(&config).await?;
            Incoming::upgrade(staging.as_ref(), config.incoming.num_sacks).await?;
            let sacks = staging.num_sacks().await?.unwrap_or(config.incoming.num_sacks);
            println!("Staging area ready with {} sacks", sacks);
        }

        Commands::Add { metric, value, time } => {
            let ctx = build_context(&config).await?;
            let measure = Measure::new(parse_time(time.as_deref())?, value);
            ctx.incoming.add_measures(&metric, &[measure]).await?;
            println!("Staged 1 measure for {}", metric);
        }

        Commands::Process => {
            let ctx = build_context(&config).await?;
            let mut metrics = 0;
            for sack in ctx.incoming.sacks() {
                metrics += process_new_measures_for_sack(&ctx, &sack, true).await?;
            }
            println!("Processed {} metrics", metrics);
        }

        Commands::Show {
            metric,
            aggregation,
            granularity,
            resample,
        } => {
            let ctx = build_context(&config).await?;
            let method = AggregationMethod::from_name(&aggregation)?;
            let metric = ctx.indexer.get_metric(&metric).await?;
            let series = get_measures(
                &ctx,
                &metric,
                &method,
                carbonara::carbonara::seconds(granularity),
                None,
                None,
                resample.map(carbonara::carbonara::seconds),
            )
            .await?;

            for (timestamp, value) in series.series().iter() {
                let time = chrono::DateTime::from_timestamp_nanos(timestamp);
                println!("{}  {}", time.to_rfc3339(), value);
            }
        }

        Commands::Report { details } => {
            let ctx = build_context(&config).await?;
            let report = ctx.incoming.report(details).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Config { output } => write_default_config(output.as_ref())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time(Some("1970-01-01T00:00:01Z")).unwrap(), 1_000_000_000);
        assert_eq!(parse_time(Some("2.5")).unwrap(), 2_500_000_000);
        assert!(parse_time(Some("tomorrow")).is_err());
        assert!(parse_time(None).unwrap() > 0);
    }
}
