//! Aggregated (downsampled) series and their chunk codecs
//!
//! An `AggregatedSeries` holds one (method, granularity) downsampling of a
//! metric. Every timestamp is an exact multiple of the granularity.
//!
//! Chunks are stored in one of two self-describing formats:
//!
//! ```text
//! Compressed:  'c' lz4_block(size-prepended)(
//!                  [u16 LE offset] x n     offsets in granularity units,
//!                                          first from the split key,
//!                                          then successive deltas
//!                  [f64 LE value]  x n )
//!
//! Padded:      [marker != 'c']
//!              ([u8 presence][f64 LE value]) x slots
//!                                          one record per sample slot
//!                                          from the split key onward
//! ```
//!
//! The padded form can be patched in place: a writer only needs the byte
//! range of the slots it touches.

use crate::carbonara::error::{CarbonaraError, CarbonaraResult};
use crate::carbonara::grouped::{GroupedSeries, Grouping};
use crate::carbonara::split::{SplitKey, POINTS_PER_SPLIT};
use crate::carbonara::types::{now, round_timestamp, Aggregation, TimeSeries, Timestamp};

/// Leading byte of the compressed chunk format
pub const COMPRESSED_MARKER: u8 = b'c';
/// Leading byte written for padded chunks
pub const PADDED_MARKER: u8 = 0;

/// Size of one padded record: presence flag + value
pub const PADDED_SERIAL_LEN: usize = 9;
const COMPRESSED_SERIAL_LEN: usize = 10;
const COMPRESSED_TIMESTAMP_LEN: usize = 2;

/// One downsampled series of a metric
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeries {
    aggregation: Aggregation,
    series: TimeSeries,
}

impl AggregatedSeries {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            series: TimeSeries::new(),
        }
    }

    /// Wrap already aggregated points
    pub fn from_series(aggregation: Aggregation, series: TimeSeries) -> Self {
        Self {
            aggregation,
            series,
        }
    }

    /// Reduce every bin of `grouped` with the aggregation's method
    pub fn from_grouped_series(grouped: &GroupedSeries, aggregation: Aggregation) -> CarbonaraResult<Self> {
        let series = grouped.aggregate(&aggregation.method)?;
        Ok(Self {
            aggregation,
            series,
        })
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn granularity(&self) -> i64 {
        self.aggregation.granularity
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

    /// Drop points older than `cutoff`.
    ///
    /// Without a cutoff, `now - timespan` is used; a series without a
    /// retention timespan is left untouched. Returns the cutoff applied.
    pub fn truncate(&mut self, cutoff: Option<Timestamp>) -> Option<Timestamp> {
        let cutoff = match cutoff {
            Some(cutoff) => cutoff,
            None => now() - self.aggregation.timespan?,
        };
        self.series.retain_from(cutoff);
        Some(cutoff)
    }

    /// Group this series for a further reduction
    pub fn group_serie(&self, grouping: Grouping, start: Option<Timestamp>) -> CarbonaraResult<GroupedSeries> {
        GroupedSeries::new(&self.series, grouping, start)
    }

    /// Re-aggregate at a coarser granularity with the same method.
    ///
    /// This aggregates aggregates (a mean of means, say), so it is only an
    /// approximation of downsampling the raw points.
    pub fn resample(&self, granularity: i64) -> CarbonaraResult<AggregatedSeries> {
        let grouped = self.group_serie(Grouping::Fixed(granularity), None)?;
        let aggregation = Aggregation::new(
            self.aggregation.method.clone(),
            granularity,
            self.aggregation.timespan,
        );
        Self::from_grouped_series(&grouped, aggregation)
    }

    /// Points within `[floor(from), to)`, aligned on the granularity
    pub fn fetch(&self, from: Option<Timestamp>, to: Option<Timestamp>) -> AggregatedSeries {
        let from = from.map(|f| round_timestamp(f, self.granularity()));
        Self {
            aggregation: self.aggregation.clone(),
            series: self.series.slice(from, to),
        }
    }

    /// Key of the chunk holding `timestamp`, or the first point by default
    pub fn get_split_key(&self, timestamp: Option<Timestamp>) -> Option<SplitKey> {
        let timestamp = timestamp.or_else(|| self.first())?;
        Some(SplitKey::from_timestamp_and_sampling(
            timestamp,
            self.granularity(),
        ))
    }

    /// Tile the series into chunks, in key order
    pub fn split(&self) -> Vec<(SplitKey, AggregatedSeries)> {
        let mut splits = Vec::new();
        let mut remaining = self.series.clone();

        while let Some(first) = remaining.first() {
            let key = SplitKey::from_timestamp_and_sampling(first, self.granularity());
            let end = key.next().key();
            splits.push((
                key,
                Self {
                    aggregation: self.aggregation.clone(),
                    series: remaining.slice(None, Some(end)),
                },
            ));
            remaining = remaining.slice(Some(end), None);
        }

        splits
    }

    /// Fill in points from `older` where this series has none
    pub fn merge(&mut self, older: &AggregatedSeries) {
        let mut merged = older.series.clone();
        merged.merge(&self.series);
        self.series = merged;
    }

    /// Add the points of a chunk that follows this series
    pub fn append(&mut self, later: AggregatedSeries) {
        self.series.append(later.series);
    }

    /// Check which format a chunk was written with
    pub fn is_compressed(data: &[u8]) -> bool {
        data.first() == Some(&COMPRESSED_MARKER)
    }

    /// Serialize the chunk starting at `key`.
    ///
    /// Returns `(offset, bytes)`: the bytes belong at `offset` within the
    /// stored chunk. Compressed output always starts at 0; padded output
    /// starts at the first slot holding a point so it can be patched in.
    pub fn serialize(&self, key: &SplitKey, compressed: bool) -> CarbonaraResult<(usize, Vec<u8>)> {
        let granularity = self.granularity();
        let slot_of = |ts: Timestamp| -> CarbonaraResult<i64> {
            let offset = ts - key.key();
            if offset < 0 || offset % granularity != 0 || offset >= key.span() {
                return Err(CarbonaraError::InvalidData(format!(
                    "timestamp {} does not fit in split {}",
                    ts, key
                )));
            }
            Ok(offset / granularity)
        };

        if compressed {
            let mut payload = Vec::with_capacity(self.len() * COMPRESSED_SERIAL_LEN);
            let mut previous = 0i64;
            for &ts in self.series.timestamps() {
                let slot = slot_of(ts)?;
                let delta = u16::try_from(slot - previous).map_err(|_| {
                    CarbonaraError::InvalidData(format!("offset {} exceeds 16 bits", slot - previous))
                })?;
                payload.extend_from_slice(&delta.to_le_bytes());
                previous = slot;
            }
            for value in self.series.values() {
                payload.extend_from_slice(&value.to_le_bytes());
            }

            let mut data = vec![COMPRESSED_MARKER];
            data.extend(lz4_flex::compress_prepend_size(&payload));
            return Ok((0, data));
        }

        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) => (slot_of(first)?, slot_of(last)?),
            _ => return Ok((0, vec![PADDED_MARKER])),
        };

        let slots = (last - first + 1) as usize;
        let mut records = vec![0u8; slots * PADDED_SERIAL_LEN];
        for (ts, value) in self.series.iter() {
            let at = (slot_of(ts)? - first) as usize * PADDED_SERIAL_LEN;
            records[at] = 1;
            records[at + 1..at + PADDED_SERIAL_LEN].copy_from_slice(&value.to_le_bytes());
        }

        if first == 0 {
            let mut data = Vec::with_capacity(records.len() + 1);
            data.push(PADDED_MARKER);
            data.extend(records);
            Ok((0, data))
        } else {
            Ok((1 + first as usize * PADDED_SERIAL_LEN, records))
        }
    }

    fn slot_timestamp(key: &SplitKey, slot: i64, granularity: i64) -> CarbonaraResult<Timestamp> {
        if !(0..POINTS_PER_SPLIT).contains(&slot) {
            return Err(CarbonaraError::InvalidData(format!(
                "chunk slot {} is outside of split {}",
                slot, key
            )));
        }
        slot.checked_mul(granularity)
            .and_then(|offset| key.key().checked_add(offset))
            .ok_or_else(|| CarbonaraError::InvalidData(format!("chunk slot {} overflows split {}", slot, key)))
    }

    /// Decode a chunk written by `serialize`, in either format
    pub fn unserialize(data: &[u8], key: &SplitKey, aggregation: Aggregation) -> CarbonaraResult<Self> {
        let granularity = aggregation.granularity;
        if data.is_empty() {
            return Ok(Self::new(aggregation));
        }

        if Self::is_compressed(data) {
            let payload = lz4_flex::decompress_size_prepended(&data[1..])?;
            if payload.len() % COMPRESSED_SERIAL_LEN != 0 {
                return Err(CarbonaraError::InvalidData(format!(
                    "compressed chunk payload of {} bytes is not a whole number of points",
                    payload.len()
                )));
            }

            let count = payload.len() / COMPRESSED_SERIAL_LEN;
            let (offsets, values) = payload.split_at(count * COMPRESSED_TIMESTAMP_LEN);

            let mut timestamps = Vec::with_capacity(count);
            let mut slot = 0i64;
            for (idx, chunk) in offsets.chunks_exact(COMPRESSED_TIMESTAMP_LEN).enumerate() {
                let delta = i64::from(u16::from_le_bytes([chunk[0], chunk[1]]));
                if idx > 0 && delta == 0 {
                    return Err(CarbonaraError::InvalidData(
                        "chunk timestamps are not strictly increasing".to_string(),
                    ));
                }
                slot += delta;
                timestamps.push(Self::slot_timestamp(key, slot, granularity)?);
            }

            let values = values
                .chunks_exact(8)
                .map(|chunk| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(chunk);
                    f64::from_le_bytes(bytes)
                })
                .collect();

            return Ok(Self::from_series(
                aggregation,
                TimeSeries::from_sorted(timestamps, values),
            ));
        }

        let records = &data[1..];
        if records.len() % PADDED_SERIAL_LEN != 0 {
            return Err(CarbonaraError::InvalidData(format!(
                "padded chunk of {} bytes is not a whole number of slots",
                data.len()
            )));
        }

        if records.len() / PADDED_SERIAL_LEN > POINTS_PER_SPLIT as usize {
            return Err(CarbonaraError::InvalidData(format!(
                "padded chunk holds {} slots, more than {}",
                records.len() / PADDED_SERIAL_LEN,
                POINTS_PER_SPLIT
            )));
        }

        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        for (slot, record) in records.chunks_exact(PADDED_SERIAL_LEN).enumerate() {
            if record[0] != 0 {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&record[1..]);
                timestamps.push(Self::slot_timestamp(key, slot as i64, granularity)?);
                values.push(f64::from_le_bytes(bytes));
            }
        }

        Ok(Self::from_series(
            aggregation,
            TimeSeries::from_sorted(timestamps, values),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbonara::types::{days, minutes, seconds, AggregationMethod};

    fn mean(granularity: i64) -> Aggregation {
        Aggregation::new(AggregationMethod::Mean, granularity, None)
    }

    fn aggregated(granularity: i64, points: &[(i64, f64)]) -> AggregatedSeries {
        AggregatedSeries::from_series(
            mean(granularity),
            TimeSeries::from_points(points.iter().copied()),
        )
    }

    /// Rebuild the full stored chunk from a `(offset, bytes)` write
    fn stored(offset: usize, bytes: Vec<u8>) -> Vec<u8> {
        let mut blob = vec![0u8; offset];
        blob.extend(bytes);
        blob
    }

    #[test]
    fn test_from_grouped_series() {
        let raw = TimeSeries::from_points(vec![
            (seconds(0), 3.0),
            (seconds(10), 5.0),
            (seconds(60), 8.0),
        ]);
        let grouped = GroupedSeries::new(&raw, Grouping::Fixed(seconds(60)), None).unwrap();
        let agg = AggregatedSeries::from_grouped_series(&grouped, mean(seconds(60))).unwrap();

        assert_eq!(agg.series().timestamps(), &[0, seconds(60)]);
        assert_eq!(agg.series().values(), &[4.0, 8.0]);
        for ts in agg.series().timestamps() {
            assert_eq!(ts % seconds(60), 0);
        }
    }

    #[test]
    fn test_truncate_with_cutoff() {
        let mut agg = aggregated(seconds(1), &[(seconds(1), 1.0), (seconds(2), 2.0), (seconds(3), 3.0)]);
        assert_eq!(agg.truncate(Some(seconds(2))), Some(seconds(2)));
        assert_eq!(agg.series().timestamps(), &[seconds(2), seconds(3)]);
    }

    #[test]
    fn test_truncate_default() {
        // No timespan: nothing to do
        let mut agg = aggregated(seconds(1), &[(seconds(1), 1.0)]);
        assert_eq!(agg.truncate(None), None);
        assert_eq!(agg.len(), 1);

        // A day of retention drops 1970 but keeps the present
        let recent = round_timestamp(now(), seconds(1));
        let mut agg = AggregatedSeries::from_series(
            Aggregation::new(AggregationMethod::Mean, seconds(1), Some(days(1))),
            TimeSeries::from_points(vec![(seconds(1), 1.0), (recent, 2.0)]),
        );
        agg.truncate(None);
        assert_eq!(agg.series().timestamps(), &[recent]);
    }

    #[test]
    fn test_resample() {
        let agg = aggregated(
            minutes(1),
            &[(0, 1.0), (minutes(1), 3.0), (minutes(5), 10.0), (minutes(6), 20.0)],
        );
        let resampled = agg.resample(minutes(5)).unwrap();

        assert_eq!(resampled.granularity(), minutes(5));
        assert_eq!(resampled.series().timestamps(), &[0, minutes(5)]);
        assert_eq!(resampled.series().values(), &[2.0, 15.0]);
    }

    #[test]
    fn test_fetch_floors_start() {
        let agg = aggregated(minutes(5), &[(0, 1.0), (minutes(5), 2.0), (minutes(10), 3.0)]);

        let fetched = agg.fetch(Some(minutes(7)), Some(minutes(10)));
        assert_eq!(fetched.series().timestamps(), &[minutes(5)]);

        let all = agg.fetch(None, None);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_split_and_reassemble() {
        let granularity = seconds(1);
        let span = granularity * POINTS_PER_SPLIT;
        let points: Vec<(i64, f64)> = (0..10_000).map(|i| (i * seconds(1), i as f64)).collect();
        let agg = aggregated(granularity, &points);

        let splits = agg.split();
        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].0.key(), 0);
        assert_eq!(splits[1].0.key(), span);
        assert_eq!(splits[2].0.key(), 2 * span);

        let mut reassembled = TimeSeries::new();
        for (key, split) in &splits {
            assert!(split.series().timestamps().iter().all(|&ts| key.contains(ts)));
            reassembled.merge(split.series());
        }
        assert_eq!(&reassembled, agg.series());
    }

    #[test]
    fn test_split_is_stable_for_sparse_series() {
        let granularity = seconds(60);
        let span = granularity * POINTS_PER_SPLIT;
        let agg = aggregated(granularity, &[(span * 5 + granularity, 1.0)]);

        let splits = agg.split();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].0.key(), span * 5);
    }

    #[test]
    fn test_get_split_key() {
        let agg = aggregated(seconds(1), &[(seconds(3700), 1.0)]);
        assert_eq!(agg.get_split_key(None).unwrap().key(), seconds(3600));
        assert_eq!(agg.get_split_key(Some(seconds(10))).unwrap().key(), 0);
        assert!(aggregated(seconds(1), &[]).get_split_key(None).is_none());
    }

    #[test]
    fn test_compressed_round_trip() {
        let granularity = seconds(5);
        let key = SplitKey::new(0, granularity);
        let agg = aggregated(
            granularity,
            &[(0, 1.5), (seconds(5), -2.0), (seconds(500), 3.25), (seconds(17_995), 0.0)],
        );

        let (offset, data) = agg.serialize(&key, true).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(data[0], b'c');
        assert!(AggregatedSeries::is_compressed(&data));

        let restored = AggregatedSeries::unserialize(&data, &key, mean(granularity)).unwrap();
        assert_eq!(restored, agg);
    }

    #[test]
    fn test_compressed_layout() {
        let key = SplitKey::new(seconds(3600), seconds(1));
        let agg = aggregated(seconds(1), &[(seconds(3602), 1.0), (seconds(3605), 2.0)]);

        let (_, data) = agg.serialize(&key, true).unwrap();
        let payload = lz4_flex::decompress_size_prepended(&data[1..]).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u16.to_le_bytes());
        expected.extend_from_slice(&3u16.to_le_bytes());
        expected.extend_from_slice(&1.0f64.to_le_bytes());
        expected.extend_from_slice(&2.0f64.to_le_bytes());
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_padded_round_trip() {
        let granularity = seconds(60);
        let key = SplitKey::new(0, granularity);

        for points in [
            vec![(0, 1.0), (minutes(2), 2.0)],
            vec![(minutes(3), 7.0), (minutes(4), 8.0), (minutes(10), 9.0)],
        ] {
            let agg = aggregated(granularity, &points);
            let (offset, data) = agg.serialize(&key, false).unwrap();
            let blob = stored(offset, data);

            assert!(!AggregatedSeries::is_compressed(&blob));
            let restored = AggregatedSeries::unserialize(&blob, &key, mean(granularity)).unwrap();
            assert_eq!(restored, agg);
        }
    }

    #[test]
    fn test_padded_layout_and_offset() {
        let granularity = seconds(1);
        let key = SplitKey::new(0, granularity);
        let agg = aggregated(granularity, &[(seconds(2), 1.0), (seconds(4), 2.0)]);

        let (offset, data) = agg.serialize(&key, false).unwrap();
        assert_eq!(offset, 1 + 2 * PADDED_SERIAL_LEN);
        assert_eq!(data.len(), 3 * PADDED_SERIAL_LEN);
        assert_eq!(data[0], 1);
        assert_eq!(data[PADDED_SERIAL_LEN], 0);
        assert_eq!(data[2 * PADDED_SERIAL_LEN], 1);
        assert_eq!(&data[1..9], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_padded_patch_write() {
        let granularity = seconds(1);
        let key = SplitKey::new(0, granularity);

        let before = aggregated(granularity, &[(0, 1.0), (seconds(1), 2.0)]);
        let (offset, data) = before.serialize(&key, false).unwrap();
        let mut blob = stored(offset, data);

        // Recompute the last slot and append a new one without reading
        let patch = aggregated(granularity, &[(seconds(1), 5.0), (seconds(3), 6.0)]);
        let (offset, data) = patch.serialize(&key, false).unwrap();
        if blob.len() < offset + data.len() {
            blob.resize(offset + data.len(), 0);
        }
        blob[offset..offset + data.len()].copy_from_slice(&data);

        let restored = AggregatedSeries::unserialize(&blob, &key, mean(granularity)).unwrap();
        assert_eq!(restored.series().timestamps(), &[0, seconds(1), seconds(3)]);
        assert_eq!(restored.series().values(), &[1.0, 5.0, 6.0]);
    }

    #[test]
    fn test_serialize_outside_split() {
        let key = SplitKey::new(0, seconds(1));
        let agg = aggregated(seconds(1), &[(seconds(3600), 1.0)]);

        assert!(agg.serialize(&key, true).is_err());
        assert!(agg.serialize(&key, false).is_err());
    }

    #[test]
    fn test_unserialize_corrupt() {
        let key = SplitKey::new(0, seconds(1));
        assert!(AggregatedSeries::unserialize(b"c\x05\x00\x00\x00\xff\xff", &key, mean(seconds(1))).is_err());
        assert!(AggregatedSeries::unserialize(&[0u8; 5], &key, mean(seconds(1))).is_err());

        let compressed = |offsets: &[u16]| {
            let mut payload = Vec::new();
            for offset in offsets {
                payload.extend(offset.to_le_bytes());
            }
            for _ in offsets {
                payload.extend(1.0f64.to_le_bytes());
            }
            let mut data = vec![b'c'];
            data.extend(lz4_flex::compress_prepend_size(&payload));
            data
        };

        // Slot past the end of the split
        let data = compressed(&[60000]);
        assert!(matches!(
            AggregatedSeries::unserialize(&data, &key, mean(seconds(1))),
            Err(CarbonaraError::InvalidData(_))
        ));

        // Accumulated slots overflowing a long granularity
        let data = compressed(&[u16::MAX, u16::MAX, u16::MAX]);
        let day_key = SplitKey::new(0, days(1));
        assert!(matches!(
            AggregatedSeries::unserialize(&data, &day_key, mean(days(1))),
            Err(CarbonaraError::InvalidData(_))
        ));

        // Last valid slot still decodes
        let data = compressed(&[(POINTS_PER_SPLIT - 1) as u16]);
        let series = AggregatedSeries::unserialize(&data, &key, mean(seconds(1))).unwrap();
        assert_eq!(series.series().timestamps(), &[seconds(POINTS_PER_SPLIT - 1)]);

        // Padded chunk with more records than a split holds
        let mut data = vec![0u8];
        for _ in 0..=POINTS_PER_SPLIT {
            data.push(1);
            data.extend(1.0f64.to_le_bytes());
        }
        assert!(matches!(
            AggregatedSeries::unserialize(&data, &key, mean(seconds(1))),
            Err(CarbonaraError::InvalidData(_))
        ));
    }

    #[test]
    fn test_merge_prefers_new_points() {
        let mut new = aggregated(seconds(1), &[(seconds(2), 20.0), (seconds(3), 30.0)]);
        let old = aggregated(seconds(1), &[(seconds(1), 1.0), (seconds(2), 2.0)]);

        new.merge(&old);
        assert_eq!(new.series().values(), &[1.0, 20.0, 30.0]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        fn sparse_series() -> impl Strategy<Value = (i64, Vec<(i64, f64)>)> {
            let granularity = prop_oneof![Just(seconds(1)), Just(minutes(5)), Just(days(1))];
            let slots = prop::collection::btree_set(0..3 * POINTS_PER_SPLIT, 0..200);
            let values = prop::collection::vec(-1e12f64..1e12, 200);
            (granularity, slots, values).prop_map(|(granularity, slots, values): (i64, BTreeSet<i64>, Vec<f64>)| {
                let points = slots.into_iter().zip(values).map(|(slot, v)| (slot * granularity, v)).collect::<Vec<_>>();
                (granularity, points)
            })
        }

        proptest! {
            #![proptest_config(
                ProptestConfig { failure_persistence: None, ..ProptestConfig::default() }
            )]
            #[test]
            fn test_split_reassembles_any_series((granularity, points) in sparse_series()) {
                let agg = aggregated(granularity, &points);

                let mut reassembled = AggregatedSeries::new(mean(granularity));
                for (key, split) in agg.split() {
                    prop_assert!(split.series().timestamps().iter().all(|&ts| key.contains(ts)));
                    reassembled.append(split);
                }
                prop_assert_eq!(reassembled, agg);
            }

            #[test]
            fn test_chunks_round_trip_in_both_formats((granularity, points) in sparse_series()) {
                let agg = aggregated(granularity, &points);

                for (key, split) in agg.split() {
                    for compressed in [true, false] {
                        let (offset, data) = split.serialize(&key, compressed).unwrap();
                        let restored = AggregatedSeries::unserialize(&stored(offset, data), &key, mean(granularity)).unwrap();
                        prop_assert_eq!(&restored, &split);
                    }
                }
            }
        }
    }
}
