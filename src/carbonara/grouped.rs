//! Binning of a series by granularity and the per-bin reducers
//!
//! A `GroupedSeries` assigns every point of an ordered series to a bin, either
//! a fixed-duration bin keyed by its left edge or a calendar period. Because
//! the input is ordered and both bin functions are monotonic, every bin is a
//! contiguous run of points, so reducers walk the runs directly.

use crate::carbonara::calendar::CalendarPeriod;
use crate::carbonara::error::{CarbonaraError, CarbonaraResult};
use crate::carbonara::types::{round_timestamp, AggregationMethod, TimeSeries, Timestamp};
use std::fmt;

/// How points are assigned to bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grouping {
    /// Fixed-duration bins of this many nanoseconds from the origin
    Fixed(i64),
    /// Calendar period bins
    Calendar(CalendarPeriod),
}

impl Grouping {
    /// Bin key for a timestamp
    pub fn bucket(&self, timestamp: Timestamp) -> Timestamp {
        match self {
            Grouping::Fixed(granularity) => round_timestamp(timestamp, *granularity),
            Grouping::Calendar(period) => period.bucket(timestamp),
        }
    }

    pub fn can_derive(&self) -> bool {
        matches!(self, Grouping::Fixed(_))
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Fixed(granularity) => write!(f, "{}ns", granularity),
            Grouping::Calendar(period) => write!(f, "{}", period),
        }
    }
}

/// A series split into bins, ready to be reduced
#[derive(Debug, Clone)]
pub struct GroupedSeries {
    grouping: Grouping,
    start: Option<Timestamp>,
    /// Points at or after `start`
    series: TimeSeries,
    /// Points from the last one before `start`, used by `derived()`
    derive_source: TimeSeries,
    /// Bin key of each bin, ascending
    keys: Vec<Timestamp>,
    /// Offset of each bin's first point; one extra trailing entry
    bounds: Vec<usize>,
}

impl GroupedSeries {
    /// Group `series` by `grouping`, optionally only from `start` onward
    pub fn new(series: &TimeSeries, grouping: Grouping, start: Option<Timestamp>) -> CarbonaraResult<Self> {
        if let Grouping::Fixed(granularity) = grouping {
            if granularity <= 0 {
                return Err(CarbonaraError::InvalidGranularity(format!(
                    "{}ns",
                    granularity
                )));
            }
        }

        let (selected, derive_source) = match (start, grouping) {
            (None, _) => (series.clone(), series.clone()),
            (Some(start), Grouping::Fixed(_)) => {
                // Keep the point preceding `start` so the first difference exists
                let previous = series.lower_bound(start).saturating_sub(1);
                let derive_from = series.timestamps().get(previous).copied();
                (
                    series.slice(Some(start), None),
                    series.slice(derive_from, None),
                )
            }
            (Some(start), Grouping::Calendar(_)) => {
                let selected = series.slice(Some(start), None);
                (selected.clone(), selected)
            }
        };

        let mut keys = Vec::new();
        let mut bounds = Vec::new();
        for (idx, &ts) in selected.timestamps().iter().enumerate() {
            let key = grouping.bucket(ts);
            if keys.last() != Some(&key) {
                keys.push(key);
                bounds.push(idx);
            }
        }
        bounds.push(selected.len());

        Ok(Self {
            grouping,
            start,
            series: selected,
            derive_source,
            keys,
            bounds,
        })
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over (bin key, values of the bin)
    fn bins(&self) -> impl Iterator<Item = (Timestamp, &[f64])> + '_ {
        let values = self.series.values();
        self.keys
            .iter()
            .zip(self.bounds.windows(2))
            .map(move |(&key, w)| (key, &values[w[0]..w[1]]))
    }

    fn reduce(&self, f: impl Fn(&[f64]) -> Option<f64>) -> TimeSeries {
        let mut timestamps = Vec::with_capacity(self.len());
        let mut values = Vec::with_capacity(self.len());
        for (key, bin) in self.bins() {
            if let Some(value) = f(bin) {
                timestamps.push(key);
                values.push(value);
            }
        }
        TimeSeries::from_sorted(timestamps, values)
    }

    pub fn sum(&self) -> TimeSeries {
        self.reduce(|bin| Some(bin.iter().sum()))
    }

    pub fn mean(&self) -> TimeSeries {
        self.reduce(|bin| Some(bin.iter().sum::<f64>() / bin.len() as f64))
    }

    pub fn min(&self) -> TimeSeries {
        self.reduce(|bin| bin.iter().copied().reduce(f64::min))
    }

    pub fn max(&self) -> TimeSeries {
        self.reduce(|bin| bin.iter().copied().reduce(f64::max))
    }

    pub fn count(&self) -> TimeSeries {
        self.reduce(|bin| Some(bin.len() as f64))
    }

    /// Value at the smallest timestamp of each bin
    pub fn first(&self) -> TimeSeries {
        self.reduce(|bin| bin.first().copied())
    }

    /// Value at the largest timestamp of each bin
    pub fn last(&self) -> TimeSeries {
        self.reduce(|bin| bin.last().copied())
    }

    pub fn median(&self) -> TimeSeries {
        self.quantile(50.0)
    }

    /// Sample standard deviation; bins with a single point yield nothing
    pub fn std(&self) -> TimeSeries {
        self.reduce(|bin| {
            if bin.len() <= 1 {
                return None;
            }
            let n = bin.len() as f64;
            let mean = bin.iter().sum::<f64>() / n;
            let squares: f64 = bin.iter().map(|v| (v - mean) * (v - mean)).sum();
            Some((squares / (n - 1.0)).sqrt())
        })
    }

    /// Linear interpolation between order statistics, `q` in `[0, 100]`
    pub fn quantile(&self, q: f64) -> TimeSeries {
        self.reduce(|bin| {
            let mut ordered = bin.to_vec();
            ordered.sort_by(|a, b| a.total_cmp(b));

            let real_pos = (ordered.len() - 1) as f64 * (q / 100.0);
            let floor_pos = real_pos.floor();
            let ceil_pos = real_pos.ceil();
            let (lo, hi) = (floor_pos as usize, ceil_pos as usize);

            if lo == hi {
                return Some(ordered[lo]);
            }
            Some(ordered[lo] * (ceil_pos - real_pos) + ordered[hi] * (real_pos - floor_pos))
        })
    }

    /// Regroup the first differences of consecutive raw points
    pub fn derived(&self) -> CarbonaraResult<GroupedSeries> {
        if !self.grouping.can_derive() {
            return Err(CarbonaraError::CalendarDerive(self.grouping.to_string()));
        }

        let timestamps = self.derive_source.timestamps();
        let values = self.derive_source.values();
        let diffs = TimeSeries::from_sorted(
            timestamps.iter().skip(1).copied().collect(),
            values.windows(2).map(|w| w[1] - w[0]).collect(),
        );

        GroupedSeries::new(&diffs, self.grouping, self.start)
    }

    /// Static dispatch from a method to its reducer
    pub fn aggregate(&self, method: &AggregationMethod) -> CarbonaraResult<TimeSeries> {
        Ok(match method {
            AggregationMethod::Mean => self.mean(),
            AggregationMethod::Sum => self.sum(),
            AggregationMethod::Min => self.min(),
            AggregationMethod::Max => self.max(),
            AggregationMethod::Std => self.std(),
            AggregationMethod::Median => self.median(),
            AggregationMethod::Count => self.count(),
            AggregationMethod::First => self.first(),
            AggregationMethod::Last => self.last(),
            AggregationMethod::Quantile(q) => self.quantile(*q),
            AggregationMethod::Rate(inner) => self.derived()?.aggregate(inner)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbonara::types::seconds;

    fn grouped(points: &[(i64, f64)], granularity: i64) -> GroupedSeries {
        let series = TimeSeries::from_points(points.iter().map(|&(s, v)| (seconds(s), v)));
        GroupedSeries::new(&series, Grouping::Fixed(seconds(granularity)), None).unwrap()
    }

    fn reference_points() -> Vec<(i64, f64)> {
        vec![
            (0, 3.0),
            (10, 5.0),
            (20, 2.0),
            (30, 3.0),
            (40, 5.0),
            (60, 8.0),
            (70, 11.0),
            (80, 22.0),
            (90, 10.0),
            (100, 42.0),
            (110, 9.0),
            (120, 4.0),
            (130, 2.0),
        ]
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} vs {:?}", actual, expected);
        }
    }

    #[test]
    fn test_mean_per_minute() {
        let mean = grouped(&reference_points(), 60).mean();

        assert_eq!(mean.timestamps(), &[0, seconds(60), seconds(120)]);
        assert_close(mean.values(), &[3.6, 17.0, 3.0]);
    }

    #[test]
    fn test_standard_reducers() {
        let g = grouped(&reference_points(), 60);

        assert_eq!(g.sum().values(), &[18.0, 102.0, 6.0]);
        assert_eq!(g.min().values(), &[2.0, 8.0, 2.0]);
        assert_eq!(g.max().values(), &[5.0, 42.0, 4.0]);
        assert_eq!(g.count().values(), &[5.0, 6.0, 2.0]);
        assert_eq!(g.first().values(), &[3.0, 8.0, 4.0]);
        assert_eq!(g.last().values(), &[5.0, 9.0, 2.0]);
    }

    #[test]
    fn test_median_odd_and_even() {
        let g = grouped(&reference_points(), 60);
        // [2,3,3,5,5] -> 3; [8,9,10,11,22,42] -> 10.5; [2,4] -> 3
        assert_close(g.median().values(), &[3.0, 10.5, 3.0]);
    }

    #[test]
    fn test_quantiles() {
        let g = grouped(&[(0, 3.0), (10, 5.0), (20, 6.0)], 60);

        assert_close(g.quantile(95.0).values(), &[5.9]);
        assert_close(g.quantile(74.0).values(), &[5.48]);
        assert_close(g.quantile(50.0).values(), &[5.0]);
        assert_close(g.quantile(100.0).values(), &[6.0]);
        assert_close(g.quantile(0.0).values(), &[3.0]);
    }

    #[test]
    fn test_std_skips_single_point_bins() {
        let g = grouped(&[(0, 3.0), (10, 5.0), (60, 8.0)], 60);
        let std = g.std();

        assert_eq!(std.timestamps(), &[0]);
        assert_close(std.values(), &[2.0_f64.sqrt()]);
    }

    #[test]
    fn test_no_zero_fill() {
        let g = grouped(&[(0, 1.0), (300, 2.0)], 60);
        assert_eq!(g.count().timestamps(), &[0, seconds(300)]);
    }

    #[test]
    fn test_start_limits_bins() {
        let series = TimeSeries::from_points(reference_points().into_iter().map(|(s, v)| (seconds(s), v)));
        let g = GroupedSeries::new(&series, Grouping::Fixed(seconds(60)), Some(seconds(60))).unwrap();

        assert_eq!(g.mean().timestamps(), &[seconds(60), seconds(120)]);
    }

    #[test]
    fn test_derived() {
        let g = grouped(&[(0, 1.0), (10, 4.0), (20, 10.0), (60, 11.0), (70, 9.0)], 60);
        let rate = g.aggregate(&AggregationMethod::Rate(Box::new(AggregationMethod::Sum))).unwrap();

        // diffs: 10s->3, 20s->6, 60s->1, 70s->-2
        assert_eq!(rate.timestamps(), &[0, seconds(60)]);
        assert_eq!(rate.values(), &[9.0, -1.0]);
    }

    #[test]
    fn test_derived_uses_previous_bin_point() {
        let series = TimeSeries::from_points(vec![(seconds(50), 5.0), (seconds(60), 8.0), (seconds(70), 9.0)]);
        let g = GroupedSeries::new(&series, Grouping::Fixed(seconds(60)), Some(seconds(60))).unwrap();

        let rate = g.derived().unwrap().last();
        assert_eq!(rate.timestamps(), &[seconds(60)]);
        assert_eq!(rate.values(), &[1.0]);

        let rate = g.derived().unwrap().first();
        assert_eq!(rate.values(), &[3.0]);
    }

    #[test]
    fn test_calendar_grouping() {
        let day = seconds(86_400);
        // 1970-01-01 is a Thursday; the week starting Sunday 1970-01-04 begins at day 3
        let series = TimeSeries::from_points(vec![(0, 1.0), (2 * day, 2.0), (3 * day, 3.0), (40 * day, 4.0)]);

        let weekly = GroupedSeries::new(&series, Grouping::Calendar(CalendarPeriod::Week), None)
            .unwrap()
            .sum();
        assert_eq!(weekly.values(), &[3.0, 3.0, 4.0]);

        let monthly = GroupedSeries::new(&series, Grouping::Calendar(CalendarPeriod::Month), None)
            .unwrap()
            .sum();
        assert_eq!(monthly.timestamps(), &[0, 31 * day]);
        assert_eq!(monthly.values(), &[6.0, 4.0]);
    }

    #[test]
    fn test_derive_on_calendar_fails() {
        let series = TimeSeries::from_points(vec![(0, 1.0), (1, 2.0)]);
        let g = GroupedSeries::new(&series, Grouping::Calendar(CalendarPeriod::Year), None).unwrap();

        assert!(matches!(g.derived(), Err(CarbonaraError::CalendarDerive(_))));
        assert!(g
            .aggregate(&AggregationMethod::from_name("rate:mean").unwrap())
            .is_err());
    }

    #[test]
    fn test_invalid_granularity() {
        let series = TimeSeries::from_points(vec![(0, 1.0)]);
        assert!(GroupedSeries::new(&series, Grouping::Fixed(0), None).is_err());
    }
}
