//! # Carbonara
//!
//! Incremental time-series downsampling engine: measures are staged, then
//! merged by background workers into per-metric raw buffers and rolled up
//! into aggregated series stored as fixed-size chunks.
//!
//! ## Modules
//!
//! - [`carbonara`]: Series model, aggregation and binary chunk formats
//! - [`storage`]: Blob stores holding raw buffers and chunks
//! - [`incoming`]: Staging of new measures, sharded into sacks
//! - [`coordination`]: Locks and work partitioning between workers
//! - [`indexer`]: Archive policies and metric metadata
//! - [`processing`]: Ingestion pipeline, read path and workers
//! - [`config`]: Configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use carbonara::carbonara::{minutes, AggregationMethod, Measure};
//! use carbonara::coordination::LocalCoordinator;
//! use carbonara::incoming::{Incoming, MemoryStaging};
//! use carbonara::indexer::{ArchivePolicy, MetadataProvider, StaticIndexer};
//! use carbonara::processing::{get_measures, refresh_metric, ProcessingContext};
//! use carbonara::storage::{MemoryBlobStore, MetricStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let staging = Arc::new(MemoryStaging::new());
//!     Incoming::upgrade(staging.as_ref(), 128).await?;
//!
//!     let coordinator = Arc::new(LocalCoordinator::new());
//!     let indexer = Arc::new(StaticIndexer::new());
//!     let policy = ArchivePolicy::builtin("medium").ok_or("no such policy")?;
//!     let metric = indexer.create_metric(uuid::Uuid::new_v4(), policy).await;
//!
//!     let ctx = ProcessingContext::new(
//!         MetricStore::new(Arc::new(MemoryBlobStore::new())),
//!         Incoming::open(staging).await?,
//!         indexer.clone(),
//!         coordinator.clone(),
//!         coordinator,
//!     );
//!
//!     // Stage measures, then aggregate them
//!     ctx.incoming
//!         .add_measures(&metric.id, &[Measure::at("2014-01-01T12:00:01Z", 69.0)?])
//!         .await?;
//!     refresh_metric(&ctx, &metric.id).await?;
//!
//!     let metric = indexer.get_metric(&metric.id).await?;
//!     let series = get_measures(&ctx, &metric, &AggregationMethod::Mean, minutes(1), None, None, None).await?;
//!     println!("{} points", series.len());
//!
//!     Ok(())
//! }
//! ```

pub mod carbonara;
pub mod config;
pub mod coordination;
pub mod incoming;
pub mod indexer;
pub mod processing;
pub mod storage;

// Re-export top-level types for convenience
pub use carbonara::{
    AggregatedSeries, Aggregation, AggregationMethod, BoundTimeSeries, CarbonaraError, CarbonaraResult,
    GroupedSeries, Measure, SplitKey, TimeSeries, Timestamp,
};

pub use config::{Config, ConfigError};

pub use coordination::{CoordinationError, FileLockManager, LocalCoordinator, LockManager};

pub use incoming::{Incoming, IncomingError, StagingStore};

pub use indexer::{ArchivePolicy, ArchivePolicyItem, IndexerError, MetadataProvider, Metric, StaticIndexer};

pub use processing::{ProcessingContext, ProcessingError, ProcessingResult};

pub use storage::{BlobStore, MetricStore, StorageError, StorageResult};
