//! Core data types for the Carbonara time-series model
//!
//! This module defines the fundamental types shared by every series kind:
//! - `Timestamp`: nanoseconds since the Unix epoch (the time origin)
//! - `Measure`: a single raw (timestamp, value) input
//! - `TimeSeries`: a columnar, ordered, unique-by-timestamp sequence
//! - `AggregationMethod` and `Aggregation`: what to compute and at which granularity

use crate::carbonara::error::{CarbonaraError, CarbonaraResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Nanoseconds since the Unix epoch
pub type Timestamp = i64;

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Span of `n` seconds, in nanoseconds
pub const fn seconds(n: i64) -> i64 {
    n * NANOS_PER_SECOND
}

/// Span of `n` minutes, in nanoseconds
pub const fn minutes(n: i64) -> i64 {
    seconds(n * 60)
}

/// Span of `n` hours, in nanoseconds
pub const fn hours(n: i64) -> i64 {
    minutes(n * 60)
}

/// Span of `n` days, in nanoseconds
pub const fn days(n: i64) -> i64 {
    hours(n * 24)
}

/// Floor a timestamp to the nearest multiple of `granularity` from the origin
pub fn round_timestamp(timestamp: Timestamp, granularity: i64) -> Timestamp {
    timestamp.div_euclid(granularity) * granularity
}

/// Reject timestamps that precede the time origin
pub fn check_epoch(timestamp: Timestamp) -> CarbonaraResult<()> {
    if timestamp < 0 {
        return Err(CarbonaraError::BeforeEpoch(timestamp));
    }
    Ok(())
}

/// Current wall-clock time as a `Timestamp`
pub fn now() -> Timestamp {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX)
}

/// A single raw measurement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Measure {
    /// Nanoseconds since the Unix epoch
    pub timestamp: Timestamp,
    /// The measured value
    pub value: f64,
}

impl Measure {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Create a measure from an RFC 3339 date, e.g. `2014-01-01T12:00:01Z`
    pub fn at(datetime: &str, value: f64) -> CarbonaraResult<Self> {
        let parsed = chrono::DateTime::parse_from_rfc3339(datetime)
            .map_err(|e| CarbonaraError::InvalidData(format!("{}: {}", datetime, e)))?;
        let timestamp = parsed
            .timestamp_nanos_opt()
            .ok_or_else(|| CarbonaraError::InvalidData(format!("{} out of range", datetime)))?;
        Ok(Self::new(timestamp, value))
    }
}

/// Ordered, unique-by-timestamp sequence of points, stored column-wise
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<Timestamp>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from unordered points; on duplicate timestamps the
    /// point appearing last in the input wins.
    pub fn from_points(points: impl IntoIterator<Item = (Timestamp, f64)>) -> Self {
        let mut points: Vec<(Timestamp, f64)> = points.into_iter().collect();
        // Stable sort keeps input order among equal timestamps
        points.sort_by_key(|(ts, _)| *ts);

        let mut series = Self {
            timestamps: Vec::with_capacity(points.len()),
            values: Vec::with_capacity(points.len()),
        };
        for (ts, value) in points {
            if series.timestamps.last() == Some(&ts) {
                if let Some(last) = series.values.last_mut() {
                    *last = value;
                }
            } else {
                series.timestamps.push(ts);
                series.values.push(value);
            }
        }
        series
    }

    pub fn from_measures(measures: &[Measure]) -> Self {
        Self::from_points(measures.iter().map(|m| (m.timestamp, m.value)))
    }

    /// Build from columns already known to be strictly increasing
    pub(crate) fn from_sorted(timestamps: Vec<Timestamp>, values: Vec<f64>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        debug_assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
        Self { timestamps, values }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first(&self) -> Option<Timestamp> {
        self.timestamps.first().copied()
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Value stored at exactly `timestamp`
    pub fn get(&self, timestamp: Timestamp) -> Option<f64> {
        self.timestamps
            .binary_search(&timestamp)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Index of the first point with a timestamp >= `timestamp`
    pub(crate) fn lower_bound(&self, timestamp: Timestamp) -> usize {
        self.timestamps.partition_point(|&ts| ts < timestamp)
    }

    /// Points within `[start, end)`; either bound may be open
    pub fn slice(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> TimeSeries {
        let lo = start.map(|s| self.lower_bound(s)).unwrap_or(0);
        let hi = end.map(|e| self.lower_bound(e)).unwrap_or(self.len()).max(lo);
        Self {
            timestamps: self.timestamps[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        }
    }

    /// Drop every point strictly older than `start`
    pub fn retain_from(&mut self, start: Timestamp) {
        let lo = self.lower_bound(start);
        self.timestamps.drain(..lo);
        self.values.drain(..lo);
    }

    /// Add the points of `later`, which usually all come after this series.
    /// Overlapping input falls back to `merge`.
    pub fn append(&mut self, later: TimeSeries) {
        match (self.last(), later.first()) {
            (Some(last), Some(first)) if first <= last => self.merge(&later),
            _ if self.is_empty() => *self = later,
            _ => {
                self.timestamps.extend(later.timestamps);
                self.values.extend(later.values);
            }
        }
    }

    /// Union of both series; `newer` wins on duplicate timestamps
    pub fn merge(&mut self, newer: &TimeSeries) {
        if newer.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = newer.clone();
            return;
        }

        let mut timestamps = Vec::with_capacity(self.len() + newer.len());
        let mut values = Vec::with_capacity(self.len() + newer.len());
        let (mut i, mut j) = (0, 0);

        while i < self.len() || j < newer.len() {
            let take_newer = match (self.timestamps.get(i), newer.timestamps.get(j)) {
                (Some(a), Some(b)) if a == b => {
                    // Same timestamp: skip the older point
                    i += 1;
                    true
                }
                (Some(a), Some(b)) => b < a,
                (None, Some(_)) => true,
                _ => false,
            };

            if take_newer {
                timestamps.push(newer.timestamps[j]);
                values.push(newer.values[j]);
                j += 1;
            } else {
                timestamps.push(self.timestamps[i]);
                values.push(self.values[i]);
                i += 1;
            }
        }

        self.timestamps = timestamps;
        self.values = values;
    }
}

/// Reduction applied to every bin of a grouped series
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationMethod {
    Mean,
    Sum,
    Min,
    Max,
    Std,
    Median,
    Count,
    First,
    Last,
    /// Percentile in `[0, 100]`
    Quantile(f64),
    /// Apply the inner method to first differences of the raw points
    Rate(Box<AggregationMethod>),
}

impl AggregationMethod {
    /// Methods available without parameters
    pub fn basic() -> &'static [AggregationMethod] {
        &[
            AggregationMethod::Mean,
            AggregationMethod::Sum,
            AggregationMethod::Min,
            AggregationMethod::Max,
            AggregationMethod::Std,
            AggregationMethod::Median,
            AggregationMethod::Count,
            AggregationMethod::First,
            AggregationMethod::Last,
        ]
    }

    pub fn is_rate(&self) -> bool {
        matches!(self, AggregationMethod::Rate(_))
    }

    /// Parse a method name: `mean`, `95pct`, `rate:max`, ...
    pub fn from_name(name: &str) -> CarbonaraResult<Self> {
        if let Some(inner) = name.strip_prefix("rate:") {
            let inner = Self::from_name(inner)?;
            if inner.is_rate() {
                return Err(CarbonaraError::UnknownAggregationMethod(name.to_string()));
            }
            return Ok(AggregationMethod::Rate(Box::new(inner)));
        }

        if let Some(pct) = name.strip_suffix("pct") {
            if !pct.is_empty() && pct.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(q) = pct.parse::<u32>() {
                    if q <= 100 {
                        return Ok(AggregationMethod::Quantile(q as f64));
                    }
                }
            }
            return Err(CarbonaraError::UnknownAggregationMethod(name.to_string()));
        }

        Ok(match name {
            "mean" => AggregationMethod::Mean,
            "sum" => AggregationMethod::Sum,
            "min" => AggregationMethod::Min,
            "max" => AggregationMethod::Max,
            "std" => AggregationMethod::Std,
            "median" => AggregationMethod::Median,
            "count" => AggregationMethod::Count,
            "first" => AggregationMethod::First,
            "last" => AggregationMethod::Last,
            _ => return Err(CarbonaraError::UnknownAggregationMethod(name.to_string())),
        })
    }
}

impl FromStr for AggregationMethod {
    type Err = CarbonaraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMethod::Mean => write!(f, "mean"),
            AggregationMethod::Sum => write!(f, "sum"),
            AggregationMethod::Min => write!(f, "min"),
            AggregationMethod::Max => write!(f, "max"),
            AggregationMethod::Std => write!(f, "std"),
            AggregationMethod::Median => write!(f, "median"),
            AggregationMethod::Count => write!(f, "count"),
            AggregationMethod::First => write!(f, "first"),
            AggregationMethod::Last => write!(f, "last"),
            AggregationMethod::Quantile(q) => write!(f, "{}pct", q),
            AggregationMethod::Rate(inner) => write!(f, "rate:{}", inner),
        }
    }
}

impl Serialize for AggregationMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AggregationMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// One declared downsampling: method at a granularity, with optional retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub method: AggregationMethod,
    /// Sampling interval in nanoseconds
    pub granularity: i64,
    /// Retention span in nanoseconds; `None` keeps everything
    pub timespan: Option<i64>,
}

impl Aggregation {
    pub fn new(method: AggregationMethod, granularity: i64, timespan: Option<i64>) -> Self {
        Self {
            method,
            granularity,
            timespan,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}ns", self.method, self.granularity)
    }
}
