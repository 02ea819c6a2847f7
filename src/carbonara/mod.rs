//! Carbonara time-series model
//!
//! In-memory series types and their binary codecs:
//!
//! - **types**: Timestamps, `TimeSeries`, aggregation methods
//! - **calendar**: Calendar-period grouping (year, half, quarter, month, week)
//! - **grouped**: Binning of a series and per-bin reductions
//! - **bound**: The raw buffer, truncated to whole retention blocks
//! - **aggregated**: Downsampled series and their chunk formats
//! - **split**: Chunk addressing
//! - **error**: Error types
//!
//! # Data flow
//!
//! ```text
//!   Measures → BoundTimeSeries.set_values
//!                 └─ group_serie(granularity) → GroupedSeries
//!                       └─ aggregate(method) → AggregatedSeries
//!                             └─ split() → (SplitKey, chunk) → serialize
//! ```

pub mod aggregated;
pub mod bound;
pub mod calendar;
pub mod error;
pub mod grouped;
pub mod split;
pub mod types;

pub use aggregated::AggregatedSeries;
pub use bound::BoundTimeSeries;
pub use calendar::CalendarPeriod;
pub use error::{CarbonaraError, CarbonaraResult};
pub use grouped::{GroupedSeries, Grouping};
pub use split::{SplitKey, POINTS_PER_SPLIT};
pub use types::{
    days, hours, minutes, round_timestamp, seconds, Aggregation, AggregationMethod, Measure,
    TimeSeries, Timestamp,
};
