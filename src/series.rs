//! Canonical per-plant time series
//!
//! A `PlantTimeSeries` is strictly ascending by date with no duplicate dates.
//! The only way to build one is `PlantTimeSeries::from_records`, which sorts
//! and collapses duplicates, so every series in the store holds the invariant.

use crate::error::Result;
use crate::ingestion::catalog::CanonicalField;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One canonical row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub date: NaiveDate,
    /// Value per non-date canonical field; null when the source had no value
    pub values: BTreeMap<CanonicalField, Option<f64>>,
}

impl PlantRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: CanonicalField, value: Option<f64>) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn value(&self, field: CanonicalField) -> Option<f64> {
        self.values.get(&field).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantTimeSeries {
    plant_id: String,
    records: Vec<PlantRecord>,
    /// Fields that were resolved from a source column
    mapped_fields: BTreeSet<CanonicalField>,
}

impl PlantTimeSeries {
    /// Build a series, sorting by date. When several records share a date the
    /// last one wins. Returns the series and the number of records collapsed.
    pub fn from_records(
        plant_id: impl Into<String>,
        records: Vec<PlantRecord>,
        mapped_fields: BTreeSet<CanonicalField>,
    ) -> (Self, usize) {
        let incoming = records.len();
        let mut by_date: BTreeMap<NaiveDate, PlantRecord> = BTreeMap::new();
        for record in records {
            by_date.insert(record.date, record);
        }
        let records: Vec<PlantRecord> = by_date.into_values().collect();
        let collapsed = incoming - records.len();

        (
            Self {
                plant_id: plant_id.into(),
                records,
                mapped_fields,
            },
            collapsed,
        )
    }

    pub fn plant_id(&self) -> &str {
        &self.plant_id
    }

    pub fn records(&self) -> &[PlantRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mapped_fields(&self) -> &BTreeSet<CanonicalField> {
        &self.mapped_fields
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.mapped_fields.contains(&field)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Values of one field in date order, nulls included
    pub fn column(&self, field: CanonicalField) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.value(field)).collect()
    }

    /// Render as a polars frame: a `date` column followed by one column per
    /// value field in catalog order
    pub fn to_frame(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self
            .records
            .iter()
            .map(|r| r.date.format("%Y-%m-%d").to_string())
            .collect();
        let mut columns = vec![Series::new("date", dates).cast(&DataType::Date)?];

        for field in CanonicalField::value_fields() {
            columns.push(Series::new(field.name(), self.column(field)));
        }

        Ok(DataFrame::new(columns)?)
    }
}
