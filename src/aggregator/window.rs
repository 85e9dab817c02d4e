//! Time windows over a plant series
//!
//! Calendar periods select rows by date. Rolling windows count available
//! rows from the end of the series; gaps in the source are not backfilled.

use crate::series::{PlantRecord, PlantTimeSeries};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A requested time period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimePeriodSpec {
    /// The latest available reading
    RealTime,
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    SpecificDate(NaiveDate),
    /// The last `n` available rows
    RollingWindow(usize),
}

impl fmt::Display for TimePeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePeriodSpec::RealTime => write!(f, "real_time"),
            TimePeriodSpec::Today => write!(f, "today"),
            TimePeriodSpec::Yesterday => write!(f, "yesterday"),
            TimePeriodSpec::ThisWeek => write!(f, "this_week"),
            TimePeriodSpec::LastWeek => write!(f, "last_week"),
            TimePeriodSpec::ThisMonth => write!(f, "this_month"),
            TimePeriodSpec::LastMonth => write!(f, "last_month"),
            TimePeriodSpec::SpecificDate(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TimePeriodSpec::RollingWindow(n) => write!(f, "last_{}_rows", n),
        }
    }
}

/// Rows of `series` that fall in `period`, with `today` anchoring relative periods
pub fn select_window<'a>(
    series: &'a PlantTimeSeries,
    period: TimePeriodSpec,
    today: NaiveDate,
) -> &'a [PlantRecord] {
    let records = series.records();
    match period {
        TimePeriodSpec::RealTime => tail(records, 1),
        TimePeriodSpec::RollingWindow(n) => tail(records, n),
        TimePeriodSpec::Today => date_range(records, Some(today), Some(today)),
        TimePeriodSpec::Yesterday => {
            let day = today - Duration::days(1);
            date_range(records, Some(day), Some(day))
        }
        TimePeriodSpec::SpecificDate(day) => date_range(records, Some(day), Some(day)),
        TimePeriodSpec::ThisWeek => date_range(records, Some(week_start(today)), None),
        TimePeriodSpec::LastWeek => {
            let start = week_start(today) - Duration::days(7);
            let end = week_start(today) - Duration::days(1);
            date_range(records, Some(start), Some(end))
        }
        TimePeriodSpec::ThisMonth => date_range(records, Some(month_start(today)), None),
        TimePeriodSpec::LastMonth => {
            let end = month_start(today) - Duration::days(1);
            date_range(records, Some(month_start(end)), Some(end))
        }
    }
}

/// The last `n` rows
pub fn tail(records: &[PlantRecord], n: usize) -> &[PlantRecord] {
    &records[records.len().saturating_sub(n)..]
}

/// Rows with `start <= date <= end`; records must be sorted by date
fn date_range(records: &[PlantRecord], start: Option<NaiveDate>, end: Option<NaiveDate>) -> &[PlantRecord] {
    let lo = match start {
        Some(start) => records.partition_point(|r| r.date < start),
        None => 0,
    };
    let hi = match end {
        Some(end) => records.partition_point(|r| r.date <= end),
        None => records.len(),
    };
    if lo >= hi {
        &[]
    } else {
        &records[lo..hi]
    }
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.day0() as i64)
}
