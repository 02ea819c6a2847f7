//! Staging of incoming measures
//!
//! Measures are appended to a staging store as small batches, sharded into
//! a fixed number of sacks by metric id, until a worker merges them into
//! the metric's time series.
//!
//! - **memory**: In-process staging store
//! - **file**: Directory-tree staging store
//! - **error**: Error types
//!
//! # Batch format
//!
//! ```text
//! ([i64 LE timestamp ns][f64 LE value]) x n
//! ```
//!
//! # Layout
//!
//! ```text
//! incoming{num_sacks}-{sack}/{metric}/{batch}
//! ```

pub mod error;
pub mod file;
pub mod memory;

use crate::carbonara::types::check_epoch;
use crate::carbonara::Measure;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub use error::{IncomingError, IncomingResult};
pub use file::FileStaging;
pub use memory::MemoryStaging;

/// Encoded size of one staged measure
pub const MEASURE_SERIAL_LEN: usize = 16;

/// One shard of the metric id space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sack {
    /// Index of this sack, `0..total`
    pub number: u32,
    /// Number of sacks of the deployment
    pub total: u32,
}

impl Sack {
    pub fn new(number: u32, total: u32) -> Self {
        Self { number, total }
    }

    /// Sack holding `metric`: the metric id as an integer modulo the sack count
    pub fn for_metric(metric: &Uuid, total: u32) -> Self {
        Self {
            number: (metric.as_u128() % u128::from(total)) as u32,
            total,
        }
    }

    /// Storage name, e.g. `incoming128-17`
    pub fn name(&self) -> String {
        format!("incoming{}-{}", self.total, self.number)
    }
}

impl fmt::Display for Sack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Encode measures as a staged batch
pub fn encode_measures(measures: &[Measure]) -> Vec<u8> {
    let mut data = Vec::with_capacity(measures.len() * MEASURE_SERIAL_LEN);
    for measure in measures {
        data.extend_from_slice(&measure.timestamp.to_le_bytes());
        data.extend_from_slice(&measure.value.to_le_bytes());
    }
    data
}

/// Decode a staged batch
pub fn decode_measures(data: &[u8]) -> IncomingResult<Vec<Measure>> {
    if data.len() % MEASURE_SERIAL_LEN != 0 {
        return Err(IncomingError::InvalidData(format!(
            "batch of {} bytes is not a whole number of measures",
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(MEASURE_SERIAL_LEN)
        .map(|chunk| {
            let mut ts = [0u8; 8];
            let mut value = [0u8; 8];
            ts.copy_from_slice(&chunk[..8]);
            value.copy_from_slice(&chunk[8..]);
            Measure::new(i64::from_le_bytes(ts), f64::from_le_bytes(value))
        })
        .collect())
}

/// Append-only store of staged measure batches
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Stored sack count, `None` if never set
    async fn num_sacks(&self) -> IncomingResult<Option<u32>>;

    /// Persist the sack count
    async fn set_num_sacks(&self, num_sacks: u32) -> IncomingResult<()>;

    /// Append one encoded batch for `metric`
    async fn add_measures(&self, sack: &Sack, metric: &Uuid, data: &[u8]) -> IncomingResult<()>;

    /// Metrics of `sack` that have at least one pending batch
    async fn list_pending(&self, sack: &Sack) -> IncomingResult<Vec<Uuid>>;

    /// Pending batches of `metric` with their size in bytes, oldest first
    async fn list_batches(&self, sack: &Sack, metric: &Uuid) -> IncomingResult<Vec<(String, usize)>>;

    /// Read the given batches of `metric`
    async fn read_pending(&self, sack: &Sack, metric: &Uuid, batches: &[String]) -> IncomingResult<Vec<Vec<u8>>>;

    /// Delete processed batches; batches already gone are ignored
    async fn clear(&self, sack: &Sack, metric: &Uuid, batches: &[String]) -> IncomingResult<()>;
}

/// Summary of the measures waiting to be processed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub metrics: usize,
    pub measures: usize,
}

/// Backlog report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasuresReport {
    pub summary: ReportSummary,
    /// Pending measures per metric, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<Uuid, usize>>,
}

/// Pending measures of one metric, read but not yet deleted
///
/// The batches are removed from staging only by `commit`; dropping the
/// value leaves them in place to be processed again.
pub struct StagedMeasures {
    store: Arc<dyn StagingStore>,
    sack: Sack,
    metric: Uuid,
    batches: Vec<String>,
    measures: Vec<Measure>,
    committed: bool,
}

impl StagedMeasures {
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Number of batches covered
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Delete the batches that were read
    pub async fn commit(mut self) -> IncomingResult<()> {
        self.store.clear(&self.sack, &self.metric, &self.batches).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedMeasures {
    fn drop(&mut self) {
        if !self.committed && !self.batches.is_empty() {
            tracing::debug!(
                metric = %self.metric,
                batches = self.batches.len(),
                "Leaving staged measures for a later cycle"
            );
        }
    }
}

/// Sack-aware access to a staging store
#[derive(Clone)]
pub struct Incoming {
    store: Arc<dyn StagingStore>,
    num_sacks: u32,
}

impl Incoming {
    /// Store the sack count unless one is already set
    pub async fn upgrade(store: &dyn StagingStore, num_sacks: u32) -> IncomingResult<()> {
        match store.num_sacks().await {
            Ok(Some(existing)) => {
                if existing != num_sacks {
                    tracing::warn!(
                        "Staging already uses {} sacks, ignoring requested {}",
                        existing,
                        num_sacks
                    );
                }
                Ok(())
            }
            Ok(None) | Err(IncomingError::SackDetection(_)) => {
                tracing::info!("Initialising staging store {} with {} sacks", store.name(), num_sacks);
                store.set_num_sacks(num_sacks).await
            }
            Err(e) => Err(e),
        }
    }

    /// Open a staging store whose sack count is already set
    pub async fn open(store: Arc<dyn StagingStore>) -> IncomingResult<Self> {
        let num_sacks = store
            .num_sacks()
            .await?
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                IncomingError::SackDetection(format!("{} has no sack count stored", store.name()))
            })?;
        Ok(Self { store, num_sacks })
    }

    pub fn num_sacks(&self) -> u32 {
        self.num_sacks
    }

    pub fn store(&self) -> &Arc<dyn StagingStore> {
        &self.store
    }

    /// Every sack of the deployment
    pub fn sacks(&self) -> Vec<Sack> {
        (0..self.num_sacks)
            .map(|n| Sack::new(n, self.num_sacks))
            .collect()
    }

    pub fn sack_for_metric(&self, metric: &Uuid) -> Sack {
        Sack::for_metric(metric, self.num_sacks)
    }

    /// Stage measures for a metric
    ///
    /// Timestamps before the Unix epoch are rejected here, before anything
    /// is stored.
    pub async fn add_measures(&self, metric: &Uuid, measures: &[Measure]) -> IncomingResult<()> {
        if measures.is_empty() {
            return Ok(());
        }
        for measure in measures {
            check_epoch(measure.timestamp)
                .map_err(|e| IncomingError::InvalidData(e.to_string()))?;
        }
        let sack = self.sack_for_metric(metric);
        self.store
            .add_measures(&sack, metric, &encode_measures(measures))
            .await
    }

    /// Metrics of `sack` waiting to be processed
    pub async fn list_pending(&self, sack: &Sack) -> IncomingResult<Vec<Uuid>> {
        self.store.list_pending(sack).await
    }

    pub async fn has_unprocessed(&self, metric: &Uuid) -> IncomingResult<bool> {
        let sack = self.sack_for_metric(metric);
        Ok(!self.store.list_batches(&sack, metric).await?.is_empty())
    }

    /// Read every pending batch of a metric
    pub async fn read_pending(&self, metric: &Uuid) -> IncomingResult<StagedMeasures> {
        let sack = self.sack_for_metric(metric);
        let batches: Vec<String> = self
            .store
            .list_batches(&sack, metric)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        let mut measures = Vec::new();
        for (name, data) in batches
            .iter()
            .zip(self.store.read_pending(&sack, metric, &batches).await?)
        {
            match decode_measures(&data) {
                Ok(decoded) => measures.extend(decoded),
                Err(e) => {
                    tracing::error!(
                        metric = %metric,
                        batch = %name,
                        "Unable to decode staged batch, possible data corruption"
                    );
                    return Err(e);
                }
            }
        }

        Ok(StagedMeasures {
            store: self.store.clone(),
            sack,
            metric: *metric,
            batches,
            measures,
            committed: false,
        })
    }

    /// Drop every pending batch of a metric without processing it
    pub async fn delete_unprocessed(&self, metric: &Uuid) -> IncomingResult<()> {
        let sack = self.sack_for_metric(metric);
        let batches: Vec<String> = self
            .store
            .list_batches(&sack, metric)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        self.store.clear(&sack, metric, &batches).await
    }

    /// Count pending metrics and measures across all sacks
    pub async fn report(&self, details: bool) -> IncomingResult<MeasuresReport> {
        let mut per_metric = BTreeMap::new();
        for sack in self.sacks() {
            for metric in self.store.list_pending(&sack).await? {
                let measures: usize = self
                    .store
                    .list_batches(&sack, &metric)
                    .await?
                    .iter()
                    .map(|(_, size)| size / MEASURE_SERIAL_LEN)
                    .sum();
                per_metric.insert(metric, measures);
            }
        }

        Ok(MeasuresReport {
            summary: ReportSummary {
                metrics: per_metric.len(),
                measures: per_metric.values().sum(),
            },
            details: details.then_some(per_metric),
        })
    }
}
