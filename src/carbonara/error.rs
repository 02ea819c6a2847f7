//! Carbonara error types
//!
//! Errors raised by the time-series model and its binary codecs.

use thiserror::Error;

/// Errors that can occur while building, grouping or decoding series
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CarbonaraError {
    /// A timestamp lies before the time origin (Unix epoch)
    #[error("Timestamp {0} is before the Unix epoch")]
    BeforeEpoch(i64),

    /// A serialized payload could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The aggregation method name is not known
    #[error("Unknown aggregation method: {0}")]
    UnknownAggregationMethod(String),

    /// Rate of change requested on a calendar grouping
    #[error("Cannot derive aggregates on calendar granularity {0}")]
    CalendarDerive(String),

    /// Ordering requested between split keys of different granularities
    #[error("Cannot compare split keys with different granularities ({0} and {1})")]
    IncomparableSplitKeys(i64, i64),

    /// Granularity is zero, negative or otherwise unusable
    #[error("Invalid granularity: {0}")]
    InvalidGranularity(String),
}

impl From<lz4_flex::block::DecompressError> for CarbonaraError {
    fn from(err: lz4_flex::block::DecompressError) -> Self {
        CarbonaraError::InvalidData(format!("LZ4 decompression failed: {}", err))
    }
}

/// Result type alias for carbonara operations
pub type CarbonaraResult<T> = Result<T, CarbonaraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CarbonaraError::UnknownAggregationMethod("foobar".to_string());
        assert_eq!(err.to_string(), "Unknown aggregation method: foobar");

        let err = CarbonaraError::BeforeEpoch(-1);
        assert_eq!(err.to_string(), "Timestamp -1 is before the Unix epoch");
    }
}
