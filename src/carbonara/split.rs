//! Split keys: deterministic chunk addresses for aggregated series
//!
//! Every aggregated series is tiled into chunks of `POINTS_PER_SPLIT` sample
//! slots. A chunk is addressed by the timestamp of its first slot, which is a
//! multiple of `granularity * POINTS_PER_SPLIT` from the origin.

use crate::carbonara::error::{CarbonaraError, CarbonaraResult};
use crate::carbonara::types::{round_timestamp, Timestamp};
use std::cmp::Ordering;
use std::fmt;

/// Number of sample slots covered by one chunk
pub const POINTS_PER_SPLIT: i64 = 3600;

/// Address of one chunk of an aggregated series
///
/// Keys only order against keys of the same granularity: `partial_cmp`
/// returns `None` across granularities, and `try_cmp` reports it as an error.
/// Equality is always defined and is simply false across granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitKey {
    key: Timestamp,
    sampling: i64,
}

impl SplitKey {
    /// Build a key from an already aligned chunk start
    pub fn new(key: Timestamp, sampling: i64) -> Self {
        Self { key, sampling }
    }

    /// Key of the chunk containing `timestamp`
    pub fn from_timestamp_and_sampling(timestamp: Timestamp, sampling: i64) -> Self {
        Self {
            key: round_timestamp(timestamp, sampling * POINTS_PER_SPLIT),
            sampling,
        }
    }

    /// Key of the chunk that follows this one
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> SplitKey {
        Self {
            key: self.key + self.span(),
            sampling: self.sampling,
        }
    }

    /// Start timestamp of the chunk
    pub fn key(&self) -> Timestamp {
        self.key
    }

    pub fn sampling(&self) -> i64 {
        self.sampling
    }

    /// Time covered by one chunk
    pub fn span(&self) -> i64 {
        self.sampling * POINTS_PER_SPLIT
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.key && timestamp < self.key + self.span()
    }

    /// Ordering that reports cross-granularity comparisons as an error
    pub fn try_cmp(&self, other: &SplitKey) -> CarbonaraResult<Ordering> {
        if self.sampling != other.sampling {
            return Err(CarbonaraError::IncomparableSplitKeys(
                self.sampling,
                other.sampling,
            ));
        }
        Ok(self.key.cmp(&other.key))
    }
}

impl PartialOrd for SplitKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for SplitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}
