//! Bounded raw buffer
//!
//! Holds the recent full-resolution points of a metric. The buffer keeps the
//! block containing the newest point plus `back_window` older blocks, where a
//! block spans `block_size` (the coarsest granularity of the archive policy).
//!
//! Wire format:
//! ```text
//! lz4_block(size-prepended)(
//!     [u64 LE first timestamp][u64 LE delta] x (n - 1)
//!     [f64 LE value] x n
//! )
//! ```

use crate::carbonara::error::{CarbonaraError, CarbonaraResult};
use crate::carbonara::grouped::{GroupedSeries, Grouping};
use crate::carbonara::types::{check_epoch, round_timestamp, TimeSeries, Timestamp};

const TIMESTAMP_LEN: usize = 8;
const TIMESTAMP_VALUE_LEN: usize = 16;

/// Raw series truncated to whole retention blocks
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTimeSeries {
    series: TimeSeries,
    block_size: Option<i64>,
    back_window: usize,
}

impl BoundTimeSeries {
    /// Create an empty buffer
    pub fn new(block_size: Option<i64>, back_window: usize) -> Self {
        Self {
            series: TimeSeries::new(),
            block_size,
            back_window,
        }
    }

    /// Wrap an existing series, truncating it to the retention blocks
    pub fn from_series(series: TimeSeries, block_size: Option<i64>, back_window: usize) -> Self {
        let mut bound = Self {
            series,
            block_size,
            back_window,
        };
        bound.truncate();
        bound
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn first(&self) -> Option<Timestamp> {
        self.series.first()
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.series.last()
    }

    pub fn block_size(&self) -> Option<i64> {
        self.block_size
    }

    pub fn back_window(&self) -> usize {
        self.back_window
    }

    /// Oldest timestamp kept after truncation; `None` when unbounded or empty
    pub fn first_block_timestamp(&self) -> Option<Timestamp> {
        let block_size = self.block_size?;
        let last = self.series.last()?;
        let window = block_size.saturating_mul(i64::try_from(self.back_window).unwrap_or(i64::MAX));
        Some(round_timestamp(last, block_size).saturating_sub(window))
    }

    /// Merge `values` into the buffer and truncate to whole blocks.
    ///
    /// `before_truncate` sees the full merged buffer before truncation; its
    /// result is returned. Points older than the current first block are
    /// dropped, since the aggregates they would touch are already read-only.
    pub fn set_values<F, R>(&mut self, values: &TimeSeries, before_truncate: F) -> CarbonaraResult<R>
    where
        F: FnOnce(&BoundTimeSeries) -> R,
    {
        if let Some(first) = values.first() {
            check_epoch(first)?;
        }

        let accepted = match self.first_block_timestamp() {
            Some(first_block) => {
                let accepted = values.slice(Some(first_block), None);
                let dropped = values.len() - accepted.len();
                if dropped > 0 {
                    tracing::warn!(
                        dropped,
                        first_block,
                        "Ignoring measures older than the raw buffer back window"
                    );
                }
                accepted
            }
            None => values.clone(),
        };

        self.series.merge(&accepted);
        let result = before_truncate(self);
        self.truncate();
        Ok(result)
    }

    /// Group the buffer by a fixed granularity, from `start` onward
    pub fn group_serie(&self, granularity: i64, start: Option<Timestamp>) -> CarbonaraResult<GroupedSeries> {
        GroupedSeries::new(&self.series, Grouping::Fixed(granularity), start)
    }

    fn truncate(&mut self) {
        if let Some(first_block) = self.first_block_timestamp() {
            self.series.retain_from(first_block);
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let timestamps = self.series.timestamps();
        let values = self.series.values();

        let mut payload = Vec::with_capacity(timestamps.len() * TIMESTAMP_VALUE_LEN);
        let mut previous = 0i64;
        for &ts in timestamps {
            payload.extend_from_slice(&((ts - previous) as u64).to_le_bytes());
            previous = ts;
        }
        for value in values {
            payload.extend_from_slice(&value.to_le_bytes());
        }

        lz4_flex::compress_prepend_size(&payload)
    }

    pub fn unserialize(data: &[u8], block_size: Option<i64>, back_window: usize) -> CarbonaraResult<Self> {
        let payload = lz4_flex::decompress_size_prepended(data)?;
        if payload.len() % TIMESTAMP_VALUE_LEN != 0 {
            return Err(CarbonaraError::InvalidData(format!(
                "raw buffer payload of {} bytes is not a whole number of points",
                payload.len()
            )));
        }

        let count = payload.len() / TIMESTAMP_VALUE_LEN;
        let (ts_bytes, value_bytes) = payload.split_at(count * TIMESTAMP_LEN);

        let mut timestamps = Vec::with_capacity(count);
        let mut current = 0i64;
        for (idx, chunk) in ts_bytes.chunks_exact(TIMESTAMP_LEN).enumerate() {
            let delta = u64::from_le_bytes(to_array(chunk)?);
            let delta = i64::try_from(delta)
                .map_err(|_| CarbonaraError::InvalidData(format!("timestamp delta {} overflows", delta)))?;
            if idx > 0 && delta == 0 {
                return Err(CarbonaraError::InvalidData(
                    "raw buffer timestamps are not strictly increasing".to_string(),
                ));
            }
            current = current
                .checked_add(delta)
                .ok_or_else(|| CarbonaraError::InvalidData("timestamp overflow".to_string()))?;
            timestamps.push(current);
        }

        let values = value_bytes
            .chunks_exact(8)
            .map(|chunk| to_array(chunk).map(f64::from_le_bytes))
            .collect::<CarbonaraResult<Vec<f64>>>()?;

        Ok(Self::from_series(
            TimeSeries::from_sorted(timestamps, values),
            block_size,
            back_window,
        ))
    }
}

fn to_array(chunk: &[u8]) -> CarbonaraResult<[u8; 8]> {
    chunk
        .try_into()
        .map_err(|_| CarbonaraError::InvalidData("truncated 8-byte field".to_string()))
}
