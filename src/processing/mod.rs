//! Metric processing
//!
//! Turns staged measures into stored aggregates and serves them back.
//!
//! - **pipeline**: One ingestion cycle for one metric
//! - **operations**: Per-metric and per-sack processing, metric expunge
//! - **reader**: Read path for aggregated measures
//! - **worker**: Background processor, reporter and janitor
//! - **context**: Backend handles shared by all of the above

pub mod context;
pub mod error;
pub mod operations;
pub mod pipeline;
pub mod reader;
pub mod worker;

pub use context::{default_parallelism, ProcessingContext};
pub use error::{ProcessingError, ProcessingResult};
pub use operations::{expunge_metrics, process_metric, process_new_measures_for_sack, refresh_metric, MetricOutcome};
pub use pipeline::add_measures_to_metric;
pub use reader::get_measures;
pub use worker::{
    spawn_worker, MetricJanitor, MetricProcessor, MetricReporter, Metricd, PeriodicJob, WorkerSignal,
    PROCESSING_GROUP,
};
