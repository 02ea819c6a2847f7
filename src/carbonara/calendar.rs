//! Gregorian calendar grouping helpers
//!
//! Maps timestamps to calendar-period bucket keys. Bucket keys are the
//! timestamp of the period's first instant (UTC), so they sort like time.

use crate::carbonara::error::{CarbonaraError, CarbonaraResult};
use crate::carbonara::types::Timestamp;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Calendar period usable as a grouping granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarPeriod {
    /// `Y`: calendar year
    Year,
    /// `H`: January-June or July-December
    Half,
    /// `Q`: calendar quarter
    Quarter,
    /// `M`: calendar month
    Month,
    /// `W`: week starting on Sunday
    Week,
}

impl CalendarPeriod {
    pub fn all() -> &'static [CalendarPeriod] {
        &[
            CalendarPeriod::Year,
            CalendarPeriod::Half,
            CalendarPeriod::Quarter,
            CalendarPeriod::Month,
            CalendarPeriod::Week,
        ]
    }

    pub fn symbol(&self) -> char {
        match self {
            CalendarPeriod::Year => 'Y',
            CalendarPeriod::Half => 'H',
            CalendarPeriod::Quarter => 'Q',
            CalendarPeriod::Month => 'M',
            CalendarPeriod::Week => 'W',
        }
    }

    /// Bucket key (period start) for a timestamp
    pub fn bucket(&self, timestamp: Timestamp) -> Timestamp {
        let date = to_date(timestamp);
        let start = match self {
            CalendarPeriod::Year => first_of_month(date.year(), 1),
            CalendarPeriod::Half => first_of_month(date.year(), (half_of_year(timestamp) - 1) * 6 + 1),
            CalendarPeriod::Quarter => {
                first_of_month(date.year(), (quarter_of_year(timestamp) - 1) * 3 + 1)
            }
            CalendarPeriod::Month => first_of_month(date.year(), date.month()),
            CalendarPeriod::Week => {
                date - chrono::Duration::days(i64::from(day_of_week(timestamp)))
            }
        };
        start
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| dt.and_utc().timestamp_nanos_opt())
            .unwrap_or(timestamp)
    }
}

impl FromStr for CalendarPeriod {
    type Err = CarbonaraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Y" => Ok(CalendarPeriod::Year),
            "H" => Ok(CalendarPeriod::Half),
            "Q" => Ok(CalendarPeriod::Quarter),
            "M" => Ok(CalendarPeriod::Month),
            "W" => Ok(CalendarPeriod::Week),
            _ => Err(CarbonaraError::InvalidGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn to_date(timestamp: Timestamp) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_nanos(timestamp).date_naive()
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Calendar month, 1 to 12
pub fn month_of_year(timestamp: Timestamp) -> u32 {
    to_date(timestamp).month()
}

/// ISO 8601 week number
pub fn iso_week_of_year(timestamp: Timestamp) -> u32 {
    to_date(timestamp).iso_week().week()
}

/// Day of the year, starting at 0 for January 1st
pub fn day_of_year(timestamp: Timestamp) -> u32 {
    to_date(timestamp).ordinal0()
}

/// Day of the month, starting at 1
pub fn day_of_month(timestamp: Timestamp) -> u32 {
    to_date(timestamp).day()
}

/// Day of the week, Sunday (0) to Saturday (6)
pub fn day_of_week(timestamp: Timestamp) -> u32 {
    to_date(timestamp).weekday().num_days_from_sunday()
}

/// Quarter of the year, 1 to 4
pub fn quarter_of_year(timestamp: Timestamp) -> u32 {
    (month_of_year(timestamp) - 1) / 3 + 1
}

/// Half of the year, 1 or 2
pub fn half_of_year(timestamp: Timestamp) -> u32 {
    (month_of_year(timestamp) - 1) / 6 + 1
}

/// Parse a calendar symbol, returning a validation error for unknown ones
pub fn parse_period(symbol: &str) -> CarbonaraResult<CalendarPeriod> {
    symbol.parse()
}
