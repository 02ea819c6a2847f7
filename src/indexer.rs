//! Metric metadata
//!
//! Archive policies describe what a metric stores: which granularities,
//! for how long, with which aggregation methods, and how many raw blocks
//! to keep for late measures. The `MetadataProvider` trait is the
//! read-only view the processing pipeline needs; `StaticIndexer` keeps the
//! metrics in memory and can register unknown metrics with a default policy.

use crate::carbonara::{days, hours, minutes, seconds, Aggregation, AggregationMethod, POINTS_PER_SPLIT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors raised by the metadata provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexerError {
    #[error("Metric {0} does not exist")]
    MetricNotFound(Uuid),

    #[error("Invalid archive policy: {0}")]
    InvalidArchivePolicy(String),
}

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

/// One resolution of an archive policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivePolicyItem {
    /// Sampling interval in nanoseconds
    pub granularity: i64,
    /// Number of points kept; `None` keeps everything
    pub points: Option<i64>,
    /// Retention in nanoseconds, always `granularity * points`
    pub timespan: Option<i64>,
}

impl ArchivePolicyItem {
    /// Build an item from any two of granularity, points and timespan.
    /// A granularity alone means unlimited retention.
    pub fn new(granularity: Option<i64>, points: Option<i64>, timespan: Option<i64>) -> IndexerResult<Self> {
        let invalid = |msg: &str| Err(IndexerError::InvalidArchivePolicy(msg.to_string()));

        if points.is_some_and(|p| p <= 0) {
            return invalid("points must be positive");
        }
        if timespan.is_some_and(|t| t <= 0) {
            return invalid("timespan must be positive");
        }

        let granularity = match (granularity, points, timespan) {
            (Some(g), _, _) => g,
            (None, Some(p), Some(t)) => t / p,
            _ => return invalid("at least two of granularity/points/timespan must be provided"),
        };
        if granularity <= 0 {
            return invalid("granularity must be positive");
        }
        // Chunk keys are multiples of granularity × POINTS_PER_SPLIT
        if granularity.checked_mul(POINTS_PER_SPLIT).is_none() {
            return invalid("granularity is too large");
        }
        if points.is_some_and(|p| granularity.checked_mul(p).is_none()) {
            return invalid("timespan is too large");
        }

        let points = match (points, timespan) {
            (Some(p), Some(t)) if t != granularity * p => {
                return invalid("timespan must equal granularity × points")
            }
            (Some(p), _) => Some(p),
            (None, Some(t)) => Some(t / granularity),
            (None, None) => None,
        };
        if points == Some(0) {
            return invalid("timespan is shorter than the granularity");
        }

        Ok(Self {
            granularity,
            points,
            timespan: points.map(|p| granularity * p),
        })
    }
}

/// What a metric stores and for how long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivePolicy {
    pub name: String,
    /// Number of past blocks of raw points kept for late measures
    pub back_window: usize,
    pub definition: Vec<ArchivePolicyItem>,
    pub aggregation_methods: Vec<AggregationMethod>,
}

impl ArchivePolicy {
    pub fn new(
        name: impl Into<String>,
        back_window: usize,
        definition: Vec<ArchivePolicyItem>,
        aggregation_methods: Vec<AggregationMethod>,
    ) -> IndexerResult<Self> {
        let name = name.into();
        if definition.is_empty() {
            return Err(IndexerError::InvalidArchivePolicy(format!(
                "{}: definition is empty",
                name
            )));
        }
        let mut granularities: Vec<i64> = definition.iter().map(|d| d.granularity).collect();
        granularities.sort_unstable();
        granularities.dedup();
        if granularities.len() != definition.len() {
            return Err(IndexerError::InvalidArchivePolicy(format!(
                "{}: more than one item with the same granularity",
                name
            )));
        }
        if aggregation_methods.is_empty() {
            return Err(IndexerError::InvalidArchivePolicy(format!(
                "{}: no aggregation methods",
                name
            )));
        }

        Ok(Self {
            name,
            back_window,
            definition,
            aggregation_methods,
        })
    }

    /// Default policies shipped with the service
    pub fn builtin(name: &str) -> Option<ArchivePolicy> {
        let default_methods = || {
            vec![
                AggregationMethod::Mean,
                AggregationMethod::Min,
                AggregationMethod::Max,
                AggregationMethod::Sum,
                AggregationMethod::Std,
                AggregationMethod::Count,
            ]
        };
        let item = |granularity, timespan| ArchivePolicyItem::new(Some(granularity), None, Some(timespan));

        let (definition, methods) = match name {
            "bool" => (
                vec![item(seconds(1), days(365))],
                vec![AggregationMethod::Last],
            ),
            "low" => (vec![item(minutes(5), days(30))], default_methods()),
            "medium" => (
                vec![item(minutes(1), days(7)), item(hours(1), days(365))],
                default_methods(),
            ),
            "high" => (
                vec![
                    item(seconds(1), hours(1)),
                    item(minutes(1), days(7)),
                    item(hours(1), days(365)),
                ],
                default_methods(),
            ),
            _ => return None,
        };

        let definition = definition.into_iter().collect::<IndexerResult<Vec<_>>>().ok()?;
        ArchivePolicy::new(name, 0, definition, methods).ok()
    }

    /// Largest granularity: the block size of the raw buffer
    pub fn max_block_size(&self) -> Option<i64> {
        self.definition.iter().map(|d| d.granularity).max()
    }

    /// Back window actually used for the raw buffer; rates need the point
    /// preceding the window, so one extra block is kept for them.
    pub fn effective_back_window(&self) -> usize {
        if self.aggregation_methods.iter().any(|m| m.is_rate()) {
            self.back_window + 1
        } else {
            self.back_window
        }
    }

    /// Every declared (method, granularity, retention)
    pub fn aggregations(&self) -> Vec<Aggregation> {
        self.aggregation_methods
            .iter()
            .flat_map(|method| {
                self.definition
                    .iter()
                    .map(move |d| Aggregation::new(method.clone(), d.granularity, d.timespan))
            })
            .collect()
    }

    /// The declared aggregation matching `method` and `granularity`
    pub fn get_aggregation(&self, method: &AggregationMethod, granularity: i64) -> Option<Aggregation> {
        if !self.aggregation_methods.contains(method) {
            return None;
        }
        self.definition
            .iter()
            .find(|d| d.granularity == granularity)
            .map(|d| Aggregation::new(method.clone(), d.granularity, d.timespan))
    }
}

/// Lifecycle of a metric in the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Active,
    /// Marked for deletion; data is removed by the janitor
    Delete,
}

/// A metric as seen by the storage engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: Uuid,
    pub archive_policy: ArchivePolicy,
    pub status: MetricStatus,
}

impl Metric {
    pub fn new(id: Uuid, archive_policy: ArchivePolicy) -> Self {
        Self {
            id,
            archive_policy,
            status: MetricStatus::Active,
        }
    }
}

/// Read access to metric metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// An active metric; `MetricNotFound` if unknown or deleted
    async fn get_metric(&self, id: &Uuid) -> IndexerResult<Metric>;

    /// Metrics marked for deletion, at most `limit`
    async fn list_deleted_metrics(&self, limit: usize) -> IndexerResult<Vec<Metric>>;

    /// Forget a deleted metric once its data is gone
    async fn expunge_metric(&self, id: &Uuid) -> IndexerResult<()>;
}

/// In-memory metadata provider
#[derive(Debug, Default)]
pub struct StaticIndexer {
    metrics: RwLock<HashMap<Uuid, Metric>>,
    default_policy: Option<ArchivePolicy>,
}

impl StaticIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metrics seen for the first time with `policy`
    pub fn with_default_policy(policy: ArchivePolicy) -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
            default_policy: Some(policy),
        }
    }

    pub async fn create_metric(&self, id: Uuid, archive_policy: ArchivePolicy) -> Metric {
        let metric = Metric::new(id, archive_policy);
        self.metrics.write().await.insert(id, metric.clone());
        metric
    }

    /// Mark a metric for deletion
    pub async fn delete_metric(&self, id: &Uuid) -> IndexerResult<()> {
        let mut metrics = self.metrics.write().await;
        let metric = metrics
            .get_mut(id)
            .filter(|m| m.status == MetricStatus::Active)
            .ok_or(IndexerError::MetricNotFound(*id))?;
        metric.status = MetricStatus::Delete;
        Ok(())
    }

    async fn resolve(&self, id: &Uuid) -> Option<Metric> {
        if let Some(metric) = self.metrics.read().await.get(id) {
            return Some(metric.clone());
        }
        let policy = self.default_policy.clone()?;

        let mut metrics = self.metrics.write().await;
        let metric = metrics.entry(*id).or_insert_with(|| {
            tracing::debug!(metric = %id, policy = %policy.name, "Registering metric with the default archive policy");
            Metric::new(*id, policy)
        });
        Some(metric.clone())
    }
}

#[async_trait]
impl MetadataProvider for StaticIndexer {
    async fn get_metric(&self, id: &Uuid) -> IndexerResult<Metric> {
        self.resolve(id)
            .await
            .filter(|m| m.status == MetricStatus::Active)
            .ok_or(IndexerError::MetricNotFound(*id))
    }

    async fn list_deleted_metrics(&self, limit: usize) -> IndexerResult<Vec<Metric>> {
        Ok(self
            .metrics
            .read()
            .await
            .values()
            .filter(|m| m.status == MetricStatus::Delete)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn expunge_metric(&self, id: &Uuid) -> IndexerResult<()> {
        self.metrics
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(IndexerError::MetricNotFound(*id))
    }
}
