//! Per-plant data quality report

use crate::ingestion::catalog::CanonicalField;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingStats {
    pub count: usize,
    pub percentage: f64,
}

impl MissingStats {
    /// `total` is the raw row count the percentage is measured against
    pub fn new(count: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        };
        Self { count, percentage }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub plant_id: String,
    pub table_id: String,

    /// Rows in the raw table
    pub total_rows: usize,

    /// Rows kept in the canonical series
    pub valid_rows: usize,

    /// Rows dropped because the date did not parse
    pub dropped_null_dates: usize,

    /// Rows collapsed into a later row with the same date
    pub duplicate_dates: usize,

    /// Missing values per field, measured against `total_rows`
    pub missing: BTreeMap<CanonicalField, MissingStats>,

    pub date_range: Option<DateRange>,

    /// Raw column that satisfied each mapped field
    pub column_mapping: BTreeMap<CanonicalField, String>,

    /// Percentage fields that were rescaled from fractions
    pub rescaled_fields: Vec<CanonicalField>,
}

impl DataQualityReport {
    /// Fields with no source column
    pub fn unmapped_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| !self.column_mapping.contains_key(f))
            .collect()
    }

    /// Share of retained rows, in percent
    pub fn retention_pct(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.valid_rows as f64 / self.total_rows as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stats_percentage() {
        let stats = MissingStats::new(1, 4);
        assert_eq!(stats.percentage, 25.0);
        assert_eq!(MissingStats::new(0, 0).percentage, 0.0);
    }

    #[test]
    fn test_date_range_days_inclusive() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        };
        assert_eq!(range.days(), 30);
    }
}
