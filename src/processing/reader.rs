//! Read path for aggregated measures
//!
//! Readers take no lock: a concurrent processing cycle may or may not be
//! visible yet.

use crate::carbonara::{AggregatedSeries, AggregationMethod, Timestamp};
use crate::indexer::Metric;
use crate::processing::context::ProcessingContext;
use crate::processing::error::{ProcessingError, ProcessingResult};

/// Aggregated points of `metric` for one method and granularity within
/// `[from, to)`, optionally resampled to a coarser granularity.
///
/// Fails with `AggregationDoesNotExist` when the archive policy does not
/// declare the aggregation, and with a storage `Corruption` error when a
/// chunk in range cannot be decoded.
pub async fn get_measures(
    ctx: &ProcessingContext,
    metric: &Metric,
    method: &AggregationMethod,
    granularity: i64,
    from: Option<Timestamp>,
    to: Option<Timestamp>,
    resample: Option<i64>,
) -> ProcessingResult<AggregatedSeries> {
    let aggregation = metric
        .archive_policy
        .get_aggregation(method, granularity)
        .ok_or_else(|| ProcessingError::AggregationDoesNotExist {
            metric: metric.id,
            method: method.clone(),
            granularity,
        })?;

    let keys = ctx.storage.list_split_keys(&metric.id, &aggregation).await?;
    let mut series = AggregatedSeries::new(aggregation.clone());

    for key in keys {
        let overlaps = from.map_or(true, |from| key.next().key() > from) && to.map_or(true, |to| key.key() < to);
        if !overlaps {
            continue;
        }
        if let Some(chunk) = ctx.storage.get_split(&metric.id, &aggregation, &key).await? {
            // Keys are sorted and chunks never overlap
            series.append(chunk);
        }
    }

    let series = series.fetch(from, to);
    match resample {
        Some(granularity) => Ok(series.resample(granularity)?),
        None => Ok(series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbonara::{hours, minutes, seconds, Measure, POINTS_PER_SPLIT};
    use crate::indexer::StaticIndexer;
    use crate::processing::pipeline::add_measures_to_metric;
    use crate::processing::pipeline::tests::{context_with, policy};
    use crate::storage::{MemoryBlobStore, StorageError};
    use std::sync::Arc;
    use uuid::Uuid;

    async fn setup() -> (ProcessingContext, Metric) {
        let indexer = Arc::new(StaticIndexer::new());
        let metric = indexer
            .create_metric(Uuid::new_v4(), policy(&[seconds(1)], None, &["mean"], 0))
            .await;
        let ctx = context_with(Arc::new(MemoryBlobStore::new()), indexer).await;
        (ctx, metric)
    }

    #[tokio::test]
    async fn test_unknown_aggregation() {
        let (ctx, metric) = setup().await;

        let result = get_measures(&ctx, &metric, &AggregationMethod::Max, seconds(1), None, None, None).await;
        assert!(matches!(
            result,
            Err(ProcessingError::AggregationDoesNotExist { method: AggregationMethod::Max, .. })
        ));

        let result = get_measures(&ctx, &metric, &AggregationMethod::Mean, minutes(1), None, None, None).await;
        assert!(matches!(result, Err(ProcessingError::AggregationDoesNotExist { .. })));
    }

    #[tokio::test]
    async fn test_range_across_splits() {
        let (ctx, metric) = setup().await;
        let span = seconds(POINTS_PER_SPLIT);
        let measures = vec![
            Measure::new(seconds(5), 1.0),
            Measure::new(span + seconds(5), 2.0),
            Measure::new(span * 2 + seconds(5), 3.0),
        ];
        add_measures_to_metric(&ctx, &metric, &measures).await.unwrap();

        let all = get_measures(&ctx, &metric, &AggregationMethod::Mean, seconds(1), None, None, None)
            .await
            .unwrap();
        assert_eq!(all.series().values(), &[1.0, 2.0, 3.0]);

        let middle = get_measures(
            &ctx,
            &metric,
            &AggregationMethod::Mean,
            seconds(1),
            Some(seconds(6)),
            Some(span * 2 + seconds(5)),
            None,
        )
        .await
        .unwrap();
        assert_eq!(middle.series().timestamps(), &[span + seconds(5)]);
    }

    #[tokio::test]
    async fn test_resample() {
        let (ctx, metric) = setup().await;
        let measures: Vec<Measure> = (0..4).map(|i| Measure::new(seconds(i), i as f64)).collect();
        add_measures_to_metric(&ctx, &metric, &measures).await.unwrap();

        let series = get_measures(
            &ctx,
            &metric,
            &AggregationMethod::Mean,
            seconds(1),
            None,
            None,
            Some(hours(1)),
        )
        .await
        .unwrap();
        assert_eq!(series.granularity(), hours(1));
        assert_eq!(series.series().iter().collect::<Vec<_>>(), vec![(0, 1.5)]);
    }

    #[tokio::test]
    async fn test_corrupt_chunk_fails_read() {
        let (ctx, metric) = setup().await;
        add_measures_to_metric(&ctx, &metric, &[Measure::new(seconds(1), 1.0)])
            .await
            .unwrap();
        let name = ctx.storage.blobs().list(&format!("{}/agg_mean/", metric.id)).await.unwrap()[0].clone();
        ctx.storage.blobs().put(&name, b"c\x09\x00\x00\x00\xff").await.unwrap();

        let result = get_measures(&ctx, &metric, &AggregationMethod::Mean, seconds(1), None, None, None).await;
        assert!(matches!(
            result,
            Err(ProcessingError::Storage(StorageError::Corruption(_)))
        ));
    }
}
