//! Typed access to a metric's objects
//!
//! Wraps a `BlobStore` with the object naming scheme and the carbonara
//! codecs, so callers deal in `BoundTimeSeries` and `AggregatedSeries`
//! rather than keys and bytes.

use crate::carbonara::{AggregatedSeries, Aggregation, AggregationMethod, SplitKey};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::BlobStore;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the raw buffer object
pub fn raw_buffer_key(metric: &Uuid) -> String {
    format!("{}/none", metric)
}

/// Prefix shared by every chunk of one method
pub fn aggregate_prefix(metric: &Uuid, method: &AggregationMethod) -> String {
    format!("{}/agg_{}/", metric, method)
}

/// Name of one chunk object
pub fn split_object_key(metric: &Uuid, method: &AggregationMethod, key: &SplitKey) -> String {
    format!(
        "{}{}_{}",
        aggregate_prefix(metric, method),
        key.key(),
        key.sampling()
    )
}

/// Parse the `{split_key}_{granularity}` tail of a chunk name
pub fn parse_split_object_name(name: &str) -> Option<SplitKey> {
    let tail = name.rsplit('/').next()?;
    let (key, sampling) = tail.split_once('_')?;
    Some(SplitKey::new(key.parse().ok()?, sampling.parse().ok()?))
}

/// Object access for all metrics of one blob store
#[derive(Clone)]
pub struct MetricStore {
    blobs: Arc<dyn BlobStore>,
}

impl MetricStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn supports_partial_writes(&self) -> bool {
        self.blobs.supports_partial_writes()
    }

    /// Serialized raw buffer, `None` if the metric has none yet
    pub async fn get_raw(&self, metric: &Uuid) -> StorageResult<Option<Vec<u8>>> {
        match self.blobs.get(&raw_buffer_key(metric)).await {
            Ok(data) => Ok(Some(data)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn put_raw(&self, metric: &Uuid, data: &[u8]) -> StorageResult<()> {
        self.blobs.put(&raw_buffer_key(metric), data).await
    }

    /// Stored chunk keys of one aggregation, in key order
    pub async fn list_split_keys(&self, metric: &Uuid, aggregation: &Aggregation) -> StorageResult<Vec<SplitKey>> {
        let prefix = aggregate_prefix(metric, &aggregation.method);
        let mut keys: Vec<SplitKey> = self
            .blobs
            .list(&prefix)
            .await?
            .iter()
            .filter_map(|name| parse_split_object_name(name))
            .filter(|key| key.sampling() == aggregation.granularity)
            .collect();
        keys.sort_by_key(|key| key.key());
        Ok(keys)
    }

    /// Decode one chunk; `None` if it does not exist
    pub async fn get_split(
        &self,
        metric: &Uuid,
        aggregation: &Aggregation,
        key: &SplitKey,
    ) -> StorageResult<Option<AggregatedSeries>> {
        let name = split_object_key(metric, &aggregation.method, key);
        let data = match self.blobs.get(&name).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        AggregatedSeries::unserialize(&data, key, aggregation.clone())
            .map(Some)
            .map_err(|e| StorageError::Corruption(format!("{}: {}", name, e)))
    }

    /// Replace a chunk with the compressed encoding of `series`
    pub async fn put_split_full(&self, metric: &Uuid, key: &SplitKey, series: &AggregatedSeries) -> StorageResult<()> {
        let (_, data) = series.serialize(key, true)?;
        let name = split_object_key(metric, &series.aggregation().method, key);
        self.blobs.put(&name, &data).await
    }

    /// Replace a chunk with the padded encoding of `series`, so it can be
    /// patched later
    pub async fn put_split_padded(&self, metric: &Uuid, key: &SplitKey, series: &AggregatedSeries) -> StorageResult<()> {
        let (offset, data) = series.serialize(key, false)?;
        let mut blob = vec![0u8; offset];
        blob.extend(data);
        let name = split_object_key(metric, &series.aggregation().method, key);
        self.blobs.put(&name, &blob).await
    }

    /// Patch the padded slots of `series` into an existing chunk
    pub async fn put_split_patch(&self, metric: &Uuid, key: &SplitKey, series: &AggregatedSeries) -> StorageResult<()> {
        let (offset, data) = series.serialize(key, false)?;
        let name = split_object_key(metric, &series.aggregation().method, key);
        self.blobs.put_at(&name, offset, &data).await
    }

    pub async fn delete_split(&self, metric: &Uuid, method: &AggregationMethod, key: &SplitKey) -> StorageResult<()> {
        self.blobs.delete(&split_object_key(metric, method, key)).await
    }

    /// Delete every object of a metric; returns how many were removed
    pub async fn delete_metric(&self, metric: &Uuid) -> StorageResult<usize> {
        let names = self.blobs.list(&format!("{}/", metric)).await?;
        for name in &names {
            self.blobs.delete(name).await?;
        }
        Ok(names.len())
    }
}
