//! Processing entry points used by workers and administrative commands
//!
//! Each metric is processed under its lock. Background callers try the
//! lock and move on when it is taken; synchronous callers wait for it and
//! get errors back instead of a log line.

use crate::coordination::{metric_lock_name, LockGuard};
use crate::incoming::Sack;
use crate::indexer::IndexerError;
use crate::processing::context::ProcessingContext;
use crate::processing::error::{ProcessingError, ProcessingResult};
use crate::processing::pipeline::add_measures_to_metric;
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

/// What happened to one metric during a processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricOutcome {
    /// Measures were aggregated and removed from staging
    Processed(usize),
    /// Nothing was staged
    Empty,
    /// Another worker holds the lock
    Locked,
    /// The indexer does not know the metric; its staged measures were dropped
    Unknown,
}

/// Process the staged measures of one metric.
///
/// Staged measures are removed only after the aggregates and the raw
/// buffer are stored; on error they stay for the next pass.
pub async fn process_metric(ctx: &ProcessingContext, metric_id: &Uuid, blocking: bool) -> ProcessingResult<MetricOutcome> {
    let lock_name = metric_lock_name(metric_id);
    let Some(_guard) = LockGuard::acquire(&ctx.locks, lock_name, blocking).await? else {
        tracing::debug!(metric = %metric_id, "Metric is locked, skipping");
        return Ok(MetricOutcome::Locked);
    };

    let metric = match ctx.indexer.get_metric(metric_id).await {
        Ok(metric) => metric,
        Err(IndexerError::MetricNotFound(_)) => {
            tracing::warn!(metric = %metric_id, "Dropping measures of unknown metric");
            ctx.incoming.delete_unprocessed(metric_id).await?;
            return Ok(MetricOutcome::Unknown);
        }
        Err(e) => return Err(e.into()),
    };

    let staged = ctx.incoming.read_pending(metric_id).await?;
    if staged.is_empty() {
        return Ok(MetricOutcome::Empty);
    }

    tracing::debug!(
        metric = %metric_id,
        measures = staged.measures().len(),
        batches = staged.batch_count(),
        "Processing measures"
    );
    add_measures_to_metric(ctx, &metric, staged.measures()).await?;

    let processed = staged.measures().len();
    staged.commit().await?;
    Ok(MetricOutcome::Processed(processed))
}

/// Process every metric with measures staged in `sack`.
///
/// Metrics are processed concurrently, `ctx.parallelism` at a time. In
/// background mode failures are logged and the other metrics proceed. With
/// `sync` the lock is waited for, and the first failure stops the pass and
/// is returned. Returns the number of metrics processed.
pub async fn process_new_measures_for_sack(ctx: &ProcessingContext, sack: &Sack, sync: bool) -> ProcessingResult<usize> {
    let metrics = ctx.incoming.list_pending(sack).await?;
    if metrics.is_empty() {
        return Ok(0);
    }
    tracing::debug!(sack = %sack, metrics = metrics.len(), "Processing sack");

    let mut results = stream::iter(metrics)
        .map(|metric| async move { (metric, process_metric(ctx, &metric, sync).await) })
        .buffer_unordered(ctx.parallelism);

    let mut processed = 0;
    while let Some((metric, result)) = results.next().await {
        match result {
            Ok(MetricOutcome::Processed(_)) => processed += 1,
            Ok(_) => {}
            // Dropping the stream cancels the cycles still running; their
            // staged measures stay for the next pass
            Err(e) if sync => return Err(e),
            Err(e) => {
                tracing::error!(metric = %metric, sack = %sack, error = %e, "Error processing new measures");
            }
        }
    }

    Ok(processed)
}

/// Process the staged measures of one metric now, waiting for its lock
pub async fn refresh_metric(ctx: &ProcessingContext, metric_id: &Uuid) -> ProcessingResult<MetricOutcome> {
    match process_metric(ctx, metric_id, true).await? {
        MetricOutcome::Locked => Err(ProcessingError::AlreadyLocked(metric_lock_name(metric_id))),
        MetricOutcome::Unknown => Err(IndexerError::MetricNotFound(*metric_id).into()),
        outcome => Ok(outcome),
    }
}

/// Delete the data of metrics marked for deletion, at most `limit` of them.
///
/// A metric whose lock is taken is left for the next pass unless `sync`.
/// Returns the number of metrics expunged.
pub async fn expunge_metrics(ctx: &ProcessingContext, limit: usize, sync: bool) -> ProcessingResult<usize> {
    let metrics = ctx.indexer.list_deleted_metrics(limit).await?;
    let mut expunged = 0;

    for metric in metrics {
        let lock_name = metric_lock_name(&metric.id);
        let Some(_guard) = LockGuard::acquire(&ctx.locks, lock_name, sync).await? else {
            tracing::debug!(metric = %metric.id, "Metric is locked, not expunging yet");
            continue;
        };

        let result = async {
            ctx.incoming.delete_unprocessed(&metric.id).await?;
            let objects = ctx.storage.delete_metric(&metric.id).await?;
            ctx.indexer.expunge_metric(&metric.id).await?;
            Ok::<_, ProcessingError>(objects)
        }
        .await;

        match result {
            Ok(objects) => {
                tracing::debug!(metric = %metric.id, objects, "Expunged metric");
                expunged += 1;
            }
            Err(e) if sync => return Err(e),
            Err(e) => tracing::error!(metric = %metric.id, error = %e, "Unable to expunge metric"),
        }
    }

    Ok(expunged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbonara::{minutes, AggregationMethod, Measure};
    use crate::coordination::LockManager;
    use crate::indexer::{MetadataProvider, StaticIndexer};
    use crate::processing::pipeline::tests::{context_with, policy};
    use crate::processing::reader::get_measures;
    use crate::storage::MemoryBlobStore;
    use std::sync::Arc;

    async fn setup() -> (ProcessingContext, Arc<StaticIndexer>, Uuid) {
        let indexer = Arc::new(StaticIndexer::new());
        let metric = indexer
            .create_metric(Uuid::new_v4(), policy(&[minutes(1)], None, &["mean", "count"], 0))
            .await;
        let ctx = context_with(Arc::new(MemoryBlobStore::new()), indexer.clone()).await;
        (ctx, indexer, metric.id)
    }

    async fn count(ctx: &ProcessingContext, id: &Uuid) -> f64 {
        let metric = ctx.indexer.get_metric(id).await.unwrap();
        get_measures(ctx, &metric, &AggregationMethod::Count, minutes(1), None, None, None)
            .await
            .unwrap()
            .series()
            .values()
            .iter()
            .sum()
    }

    #[tokio::test]
    async fn test_process_sack() {
        let (ctx, _, id) = setup().await;
        ctx.incoming
            .add_measures(&id, &[Measure::new(minutes(1), 1.0), Measure::new(minutes(2), 2.0)])
            .await
            .unwrap();
        ctx.incoming.add_measures(&id, &[Measure::new(minutes(3), 3.0)]).await.unwrap();

        let sack = ctx.incoming.sack_for_metric(&id);
        assert_eq!(process_new_measures_for_sack(&ctx, &sack, false).await.unwrap(), 1);

        assert!(!ctx.incoming.has_unprocessed(&id).await.unwrap());
        assert_eq!(count(&ctx, &id).await, 3.0);
        // Nothing left to do
        assert_eq!(process_new_measures_for_sack(&ctx, &sack, false).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_locked_metric_is_skipped() {
        let (ctx, _, id) = setup().await;
        ctx.incoming.add_measures(&id, &[Measure::new(minutes(1), 1.0)]).await.unwrap();

        assert!(ctx.locks.acquire(&metric_lock_name(&id), false).await.unwrap());
        assert_eq!(process_metric(&ctx, &id, false).await.unwrap(), MetricOutcome::Locked);
        assert!(ctx.incoming.has_unprocessed(&id).await.unwrap());

        ctx.locks.release(&metric_lock_name(&id));
        assert_eq!(
            process_metric(&ctx, &id, false).await.unwrap(),
            MetricOutcome::Processed(1)
        );
    }

    #[tokio::test]
    async fn test_failed_metric_keeps_measures() {
        let (ctx, _, id) = setup().await;
        ctx.incoming.add_measures(&id, &[Measure::new(minutes(1), 1.0)]).await.unwrap();
        // A chunk that cannot be decoded aborts the write path
        let aggregation = crate::carbonara::Aggregation::new(AggregationMethod::Mean, minutes(1), None);
        let key = crate::carbonara::SplitKey::from_timestamp_and_sampling(minutes(1), minutes(1));
        ctx.storage
            .blobs()
            .put(
                &crate::storage::metric::split_object_key(&id, &aggregation.method, &key),
                b"c\x09\x00\x00\x00\xff",
            )
            .await
            .unwrap();

        let sack = ctx.incoming.sack_for_metric(&id);
        assert_eq!(process_new_measures_for_sack(&ctx, &sack, false).await.unwrap(), 0);
        assert!(ctx.incoming.has_unprocessed(&id).await.unwrap());
        assert!(process_new_measures_for_sack(&ctx, &sack, true).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_pass_stops_at_first_failure() {
        let indexer = Arc::new(StaticIndexer::new());
        // Same sack with 4 sacks, listed in this order
        let (broken, healthy) = (Uuid::from_u128(4), Uuid::from_u128(8));
        for id in [broken, healthy] {
            indexer
                .create_metric(id, policy(&[minutes(1)], None, &["mean", "count"], 0))
                .await;
        }
        let ctx = context_with(Arc::new(MemoryBlobStore::new()), indexer)
            .await
            .with_parallelism(1);

        let aggregation = crate::carbonara::Aggregation::new(AggregationMethod::Mean, minutes(1), None);
        let key = crate::carbonara::SplitKey::from_timestamp_and_sampling(minutes(1), minutes(1));
        ctx.storage
            .blobs()
            .put(
                &crate::storage::metric::split_object_key(&broken, &aggregation.method, &key),
                b"c\x09\x00\x00\x00\xff",
            )
            .await
            .unwrap();
        for id in [broken, healthy] {
            ctx.incoming.add_measures(&id, &[Measure::new(minutes(1), 1.0)]).await.unwrap();
        }

        let sack = ctx.incoming.sack_for_metric(&broken);
        assert_eq!(sack, ctx.incoming.sack_for_metric(&healthy));
        assert!(process_new_measures_for_sack(&ctx, &sack, true).await.is_err());
        assert!(ctx.incoming.has_unprocessed(&healthy).await.unwrap());

        // The background pass carries on past the failure
        assert_eq!(process_new_measures_for_sack(&ctx, &sack, false).await.unwrap(), 1);
        assert!(!ctx.incoming.has_unprocessed(&healthy).await.unwrap());
        assert!(ctx.incoming.has_unprocessed(&broken).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_metric_measures_are_dropped() {
        let (ctx, _, id) = setup().await;
        let unknown = Uuid::new_v4();
        ctx.incoming.add_measures(&unknown, &[Measure::new(minutes(1), 1.0)]).await.unwrap();
        ctx.incoming.add_measures(&id, &[Measure::new(minutes(1), 1.0)]).await.unwrap();

        for sack in ctx.incoming.sacks() {
            process_new_measures_for_sack(&ctx, &sack, false).await.unwrap();
        }

        assert!(!ctx.incoming.has_unprocessed(&unknown).await.unwrap());
        assert!(!ctx.incoming.has_unprocessed(&id).await.unwrap());
        assert_eq!(count(&ctx, &id).await, 1.0);
    }

    #[tokio::test]
    async fn test_refresh_unknown_metric() {
        let (ctx, _, _) = setup().await;
        let unknown = Uuid::new_v4();

        assert!(matches!(
            refresh_metric(&ctx, &unknown).await,
            Err(ProcessingError::Indexer(IndexerError::MetricNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_refresh_metric() {
        let (ctx, _, id) = setup().await;
        assert_eq!(refresh_metric(&ctx, &id).await.unwrap(), MetricOutcome::Empty);

        ctx.incoming.add_measures(&id, &[Measure::new(minutes(1), 1.0)]).await.unwrap();
        assert_eq!(refresh_metric(&ctx, &id).await.unwrap(), MetricOutcome::Processed(1));
        assert_eq!(count(&ctx, &id).await, 1.0);
    }

    #[tokio::test]
    async fn test_expunge_metrics() {
        let (ctx, indexer, id) = setup().await;
        ctx.incoming.add_measures(&id, &[Measure::new(minutes(1), 1.0)]).await.unwrap();
        refresh_metric(&ctx, &id).await.unwrap();
        ctx.incoming.add_measures(&id, &[Measure::new(minutes(2), 1.0)]).await.unwrap();

        indexer.delete_metric(&id).await.unwrap();
        assert_eq!(expunge_metrics(&ctx, 10, false).await.unwrap(), 1);

        assert_eq!(ctx.storage.get_raw(&id).await.unwrap(), None);
        assert!(ctx.storage.blobs().list(&format!("{}/", id)).await.unwrap().is_empty());
        assert!(!ctx.incoming.has_unprocessed(&id).await.unwrap());
        assert!(indexer.list_deleted_metrics(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expunge_skips_locked_metric() {
        let (ctx, indexer, id) = setup().await;
        indexer.delete_metric(&id).await.unwrap();

        assert!(ctx.locks.acquire(&metric_lock_name(&id), false).await.unwrap());
        assert_eq!(expunge_metrics(&ctx, 10, false).await.unwrap(), 0);
        ctx.locks.release(&metric_lock_name(&id));
        assert_eq!(expunge_metrics(&ctx, 10, false).await.unwrap(), 1);
    }
}
