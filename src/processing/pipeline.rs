//! Incremental ingestion of new measures into a metric
//!
//! One cycle for one metric, run by the holder of the metric's lock:
//!
//! ```text
//! load raw buffer ─► merge measures ─► recompute touched window per
//! aggregation ─► delete expired chunks ─► write chunks ─► store raw buffer
//! ```
//!
//! Every step is a pure function of the raw history plus the new measures,
//! so an interrupted cycle is simply redone from the staged measures.

use crate::carbonara::{
    round_timestamp, AggregatedSeries, Aggregation, BoundTimeSeries, CarbonaraResult, Grouping,
    GroupedSeries, Measure, SplitKey, TimeSeries, Timestamp,
};
use crate::indexer::Metric;
use crate::processing::context::ProcessingContext;
use crate::processing::error::ProcessingResult;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Chunks to rewrite for one aggregation, by key
struct AggregationWrites {
    aggregation: Aggregation,
    splits: BTreeMap<Timestamp, (SplitKey, AggregatedSeries)>,
}

/// Recompute every aggregation from `start` onward over the merged buffer
fn compute_aggregates(
    bound: &BoundTimeSeries,
    start: Timestamp,
    aggregations: &[Aggregation],
) -> CarbonaraResult<Vec<AggregatedSeries>> {
    let mut grouped: HashMap<i64, GroupedSeries> = HashMap::new();
    let mut computed = Vec::with_capacity(aggregations.len());

    for aggregation in aggregations {
        let granularity = aggregation.granularity;
        if !grouped.contains_key(&granularity) {
            let group = GroupedSeries::new(
                bound.series(),
                Grouping::Fixed(granularity),
                Some(round_timestamp(start, granularity)),
            )?;
            grouped.insert(granularity, group);
        }
        if let Some(group) = grouped.get(&granularity) {
            computed.push(AggregatedSeries::from_grouped_series(group, aggregation.clone())?);
        }
    }

    Ok(computed)
}

/// Merge `measures` into `metric` and update all of its aggregates.
///
/// Measures are sorted here; duplicates keep the last value. The caller
/// must hold the metric's lock.
pub async fn add_measures_to_metric(
    ctx: &ProcessingContext,
    metric: &Metric,
    measures: &[Measure],
) -> ProcessingResult<()> {
    if measures.is_empty() {
        return Ok(());
    }
    let started = Instant::now();
    let measures = TimeSeries::from_measures(measures);
    let policy = &metric.archive_policy;
    let block_size = policy.max_block_size();
    let back_window = policy.effective_back_window();

    let previous = match ctx.storage.get_raw(&metric.id).await? {
        Some(data) => match BoundTimeSeries::unserialize(&data, block_size, back_window) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(
                    metric = %metric.id,
                    error = %e,
                    "Data corruption detected for raw buffer, ignoring it: previously stored measures are lost"
                );
                None
            }
        },
        None => None,
    };
    let had_raw = previous.is_some();
    let mut raw = previous.unwrap_or_else(|| BoundTimeSeries::new(block_size, back_window));
    let previous_first_block = raw.first_block_timestamp();

    let aggregations = policy.aggregations();
    let measures_first = measures.first();
    let computed = raw.set_values(&measures, |bound| {
        match bound.first().max(measures_first) {
            Some(start) => compute_aggregates(bound, start, &aggregations),
            None => Ok(Vec::new()),
        }
    })??;
    let oldest_mutable = raw.first_block_timestamp();

    let mut deletes = Vec::new();
    let mut writes = Vec::new();
    for mut series in computed {
        if series.is_empty() {
            continue;
        }
        let aggregation = series.aggregation().clone();
        let granularity = aggregation.granularity;

        let cutoff = aggregation
            .timespan
            .and_then(|span| series.last().map(|last| last - span));
        if cutoff.is_some() {
            series.truncate(cutoff);
        }

        let previous_key = previous_first_block.map(|ts| SplitKey::from_timestamp_and_sampling(ts, granularity));
        let mutable_key = oldest_mutable.map(|ts| SplitKey::from_timestamp_and_sampling(ts, granularity));

        let mut splits = BTreeMap::new();
        // Old chunks only change once the oldest mutable chunk moves
        if previous_key != mutable_key && (cutoff.is_some() || previous_key.is_some()) {
            let mut existing = ctx.storage.list_split_keys(&metric.id, &aggregation).await?;

            if let Some(cutoff) = cutoff {
                let cutoff_key = SplitKey::from_timestamp_and_sampling(cutoff, granularity);
                existing.retain(|key| {
                    let expired = key.key() < cutoff_key.key();
                    if expired {
                        deletes.push((aggregation.clone(), *key));
                    }
                    !expired
                });
            }

            if let (Some(previous_key), Some(mutable_key)) = (previous_key, mutable_key) {
                for key in existing {
                    if previous_key.key() <= key.key() && key.key() < mutable_key.key() {
                        tracing::debug!(
                            metric = %metric.id,
                            aggregation = %aggregation,
                            split = %key,
                            "Compressing split that became read-only"
                        );
                        splits.insert(key.key(), (key, AggregatedSeries::new(aggregation.clone())));
                    }
                }
            }
        }

        for (key, split) in series.split() {
            splits.insert(key.key(), (key, split));
        }
        writes.push(AggregationWrites { aggregation, splits });
    }

    for (aggregation, key) in &deletes {
        tracing::debug!(metric = %metric.id, aggregation = %aggregation, split = %key, "Deleting expired split");
        ctx.storage.delete_split(&metric.id, &aggregation.method, key).await?;
    }

    let partial_writes = ctx.storage.supports_partial_writes();
    for group in writes {
        for (_, (key, mut split)) in group.splits {
            let read_only = oldest_mutable.is_some_and(|ts| key.next().key() <= ts);

            if partial_writes && !read_only && had_raw {
                ctx.storage.put_split_patch(&metric.id, &key, &split).await?;
                continue;
            }

            if let Some(existing) = ctx.storage.get_split(&metric.id, &group.aggregation, &key).await? {
                split.merge(&existing);
            }
            if partial_writes && !read_only {
                // Still mutable: keep it patchable
                ctx.storage.put_split_padded(&metric.id, &key, &split).await?;
            } else {
                ctx.storage.put_split_full(&metric.id, &key, &split).await?;
            }
        }
    }

    ctx.storage.put_raw(&metric.id, &raw.serialize()).await?;

    tracing::debug!(
        metric = %metric.id,
        measures = measures.len(),
        "Computed new metric in {:.3}s",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
