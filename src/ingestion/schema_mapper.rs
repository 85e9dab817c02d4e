//! Schema Mapper - raw plant export to canonical time series
//!
//! Column resolution runs in three stages: exact name, case-insensitive name,
//! then containment. Each stage visits every unresolved field in catalog order
//! before the next stage starts, so an exact spelling is never taken by another
//! field's looser pattern. Within a stage the first pattern wins, and for a
//! pattern the first column wins. A raw column satisfies at most one field.
//!
//! Short patterns (three characters or fewer, e.g. `PA`) only match whole
//! tokens in the containment stage, so `PA` does not claim `Capacity`.

use crate::ingestion::catalog::{field_catalog, CanonicalField, FieldDomain, FieldSpec};
use crate::ingestion::connector::TableDescriptor;
use crate::ingestion::quality::{DataQualityReport, DateRange, MissingStats};
use crate::series::{PlantRecord, PlantTimeSeries};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info};

/// Why a table could not be canonicalized
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MappingError {
    #[error("missing required field: {0}")]
    MissingRequiredField(CanonicalField),

    #[error("no valid dates")]
    NoValidDates,

    #[error("empty table")]
    EmptyTable,

    #[error("unreadable table: {0}")]
    UnreadableTable(String),
}

/// A successfully mapped table
#[derive(Debug, Clone)]
pub struct MappedPlant {
    pub series: PlantTimeSeries,
    pub report: DataQualityReport,
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

pub struct SchemaMapper {
    catalog: Vec<FieldSpec>,
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaMapper {
    pub fn new() -> Self {
        Self {
            catalog: field_catalog(),
        }
    }

    /// Resolve every canonical field against the raw column names
    pub fn resolve_columns(&self, columns: &[String]) -> BTreeMap<CanonicalField, String> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut resolved = BTreeMap::new();

        for stage in MatchStage::ALL {
            for spec in &self.catalog {
                if resolved.contains_key(&spec.field) {
                    continue;
                }
                let available: Vec<&str> = columns
                    .iter()
                    .map(String::as_str)
                    .filter(|c| !claimed.contains(c))
                    .collect();
                if let Some(column) = stage.find(spec.patterns, &available) {
                    debug!("Field {} <- column '{}' ({:?})", spec.field, column, stage);
                    claimed.insert(column);
                    resolved.insert(spec.field, column.to_string());
                }
            }
        }

        resolved
    }

    /// Map a frame that is not tied to a discovered table
    pub fn map_frame(&self, plant_id: &str, df: &DataFrame) -> Result<MappedPlant, MappingError> {
        let table = TableDescriptor {
            table_id: plant_id.to_string(),
            plant_id: plant_id.to_string(),
            location: None,
        };
        self.map_table(&table, df)
    }

    /// Canonicalize one raw table
    pub fn map_table(&self, table: &TableDescriptor, df: &DataFrame) -> Result<MappedPlant, MappingError> {
        let total_rows = df.height();
        if total_rows == 0 || df.width() == 0 {
            return Err(MappingError::EmptyTable);
        }

        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        let mapping = self.resolve_columns(&columns);

        if let Some(missing) = self
            .catalog
            .iter()
            .find(|s| s.required && !mapping.contains_key(&s.field))
        {
            return Err(MappingError::MissingRequiredField(missing.field));
        }

        let date_column = mapping
            .get(&CanonicalField::Date)
            .ok_or(MappingError::MissingRequiredField(CanonicalField::Date))?;
        let dates = coerce_dates(column(df, date_column)?)?;

        let mut values: BTreeMap<CanonicalField, Vec<Option<f64>>> = BTreeMap::new();
        let mut rescaled_fields = Vec::new();
        for spec in self.catalog.iter().filter(|s| s.domain != FieldDomain::Datetime) {
            let Some(raw_name) = mapping.get(&spec.field) else {
                continue;
            };
            let mut parsed = coerce_numeric(column(df, raw_name)?)?;
            if spec.domain == FieldDomain::Percentage && rescale_fractional(&mut parsed) {
                info!(
                    "{}: rescaled {} ×100 (column '{}' looks fractional)",
                    table.plant_id, spec.field, raw_name
                );
                rescaled_fields.push(spec.field);
            }
            values.insert(spec.field, parsed);
        }

        let mut missing = BTreeMap::new();
        let null_dates = dates.iter().filter(|d| d.is_none()).count();
        missing.insert(CanonicalField::Date, MissingStats::new(null_dates, total_rows));
        for field in CanonicalField::value_fields() {
            let count = match values.get(&field) {
                Some(parsed) => parsed.iter().filter(|v| v.is_none()).count(),
                None => total_rows,
            };
            missing.insert(field, MissingStats::new(count, total_rows));
        }

        let records: Vec<PlantRecord> = dates
            .iter()
            .enumerate()
            .filter_map(|(row, date)| {
                let date = (*date)?;
                let mut record = PlantRecord::new(date);
                for field in CanonicalField::value_fields() {
                    let value = values.get(&field).and_then(|parsed| parsed[row]);
                    record.values.insert(field, value);
                }
                Some(record)
            })
            .collect();

        if records.is_empty() {
            return Err(MappingError::NoValidDates);
        }

        let mapped_fields: BTreeSet<CanonicalField> = mapping.keys().copied().collect();
        let (series, duplicate_dates) =
            PlantTimeSeries::from_records(table.plant_id.clone(), records, mapped_fields);

        let date_range = match (series.first_date(), series.last_date()) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        let report = DataQualityReport {
            plant_id: table.plant_id.clone(),
            table_id: table.table_id.clone(),
            total_rows,
            valid_rows: series.len(),
            dropped_null_dates: null_dates,
            duplicate_dates,
            missing,
            date_range,
            column_mapping: mapping,
            rescaled_fields,
        };

        Ok(MappedPlant { series, report })
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series, MappingError> {
    df.column(name)
        .map_err(|e| MappingError::UnreadableTable(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchStage {
    Exact,
    CaseInsensitive,
    Containment,
}

impl MatchStage {
    const ALL: [MatchStage; 3] = [MatchStage::Exact, MatchStage::CaseInsensitive, MatchStage::Containment];

    fn find<'a>(&self, patterns: &[&str], columns: &[&'a str]) -> Option<&'a str> {
        patterns.iter().find_map(|pattern| {
            let lower = pattern.to_lowercase();
            columns.iter().copied().find(|c| match self {
                MatchStage::Exact => c.trim() == *pattern,
                MatchStage::CaseInsensitive => c.trim().to_lowercase() == lower,
                // short patterns only match a whole token
                MatchStage::Containment if lower.chars().count() <= 3 => c
                    .to_lowercase()
                    .split(|ch: char| !ch.is_alphanumeric())
                    .any(|token| token == lower),
                MatchStage::Containment => c.to_lowercase().contains(&lower),
            })
        })
    }
}

fn coerce_dates(series: &Series) -> Result<Vec<Option<NaiveDate>>, MappingError> {
    let as_text = series
        .cast(&DataType::String)
        .map_err(|e| MappingError::UnreadableTable(e.to_string()))?;
    let text = as_text
        .str()
        .map_err(|e| MappingError::UnreadableTable(e.to_string()))?;

    Ok(text.into_iter().map(|v| v.and_then(parse_date)).collect())
}

/// Parse a date cell; date-times keep only their date
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn coerce_numeric(series: &Series) -> Result<Vec<Option<f64>>, MappingError> {
    let unreadable = |e: PolarsError| MappingError::UnreadableTable(e.to_string());

    if series.dtype().is_numeric() {
        let floats = series.cast(&DataType::Float64).map_err(unreadable)?;
        let values = floats
            .f64()
            .map_err(unreadable)?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        return Ok(values);
    }

    let as_text = series.cast(&DataType::String).map_err(unreadable)?;
    let values = as_text
        .str()
        .map_err(unreadable)?
        .into_iter()
        .map(|v| v.and_then(parse_number))
        .collect();
    Ok(values)
}

/// Parse numeric text, ignoring surrounding whitespace and thousands separators
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Multiply the whole column by 100 when its non-null maximum is at most 1.0.
/// Returns whether the column was rescaled.
fn rescale_fractional(values: &mut [Option<f64>]) -> bool {
    let max = values
        .iter()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

    match max {
        Some(max) if max <= 1.0 => {
            for v in values.iter_mut().flatten() {
                *v *= 100.0;
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_exact_match_beats_containment() {
        let mapper = SchemaMapper::new();
        let mapping = mapper.resolve_columns(&names(&["date", "Net Export", "Export", "PA(%)"]));
        assert_eq!(mapping[&CanonicalField::EnergyExport], "Export");
        assert_eq!(mapping[&CanonicalField::AvailabilityPct], "PA(%)");
    }

    #[test]
    fn test_exact_module_temperature_not_taken_by_ambient_fallback() {
        let mapper = SchemaMapper::new();
        let mapping = mapper.resolve_columns(&names(&["date", "Export", "PA(%)", "Mod_Temp(°C)"]));
        assert_eq!(mapping[&CanonicalField::ModuleTemp], "Mod_Temp(°C)");
        assert!(!mapping.contains_key(&CanonicalField::AmbientTemp));

        // with both present each takes its own spelling
        let mapping = mapper.resolve_columns(&names(&["date", "Export", "PA(%)", "Mod_Temp(°C)", "Temp"]));
        assert_eq!(mapping[&CanonicalField::ModuleTemp], "Mod_Temp(°C)");
        assert_eq!(mapping[&CanonicalField::AmbientTemp], "Temp");
    }

    #[test]
    fn test_case_insensitive_match() {
        let mapper = SchemaMapper::new();
        let mapping = mapper.resolve_columns(&names(&["DATE", "mtr_export (kwh)", "plant availability"]));
        assert_eq!(mapping[&CanonicalField::Date], "DATE");
        assert_eq!(mapping[&CanonicalField::EnergyExport], "mtr_export (kwh)");
        assert_eq!(mapping[&CanonicalField::AvailabilityPct], "plant availability");
    }

    #[test]
    fn test_short_pattern_needs_whole_token() {
        let mapper = SchemaMapper::new();
        let mapping = mapper.resolve_columns(&names(&["date", "Export", "Plant Capacity"]));
        assert!(!mapping.contains_key(&CanonicalField::AvailabilityPct));
        assert_eq!(mapping[&CanonicalField::CapacityMw], "Plant Capacity");
    }

    #[test]
    fn test_fractional_percentages_scaled() {
        let df = df!(
            "date" => &["2024-06-01", "2024-06-02"],
            "PA" => &[0.95, 0.97],
            "Export" => &[1000.0, 1100.0]
        )
        .unwrap();
        let mapped = SchemaMapper::new().map_frame("PlantA", &df).unwrap();

        let availability = mapped.series.column(CanonicalField::AvailabilityPct);
        assert!((availability[0].unwrap() - 95.0).abs() < 1e-9);
        assert!((availability[1].unwrap() - 97.0).abs() < 1e-9);
        assert_eq!(
            mapped.series.column(CanonicalField::EnergyExport),
            vec![Some(1000.0), Some(1100.0)]
        );
        assert_eq!(mapped.report.rescaled_fields, vec![CanonicalField::AvailabilityPct]);
    }

    #[test]
    fn test_scaled_percentages_untouched() {
        let df = df!(
            "date" => &["2024-06-01", "2024-06-02"],
            "PA(%)" => &[0.5, 97.0],
            "Export" => &[1000.0, 1100.0]
        )
        .unwrap();
        let mapped = SchemaMapper::new().map_frame("PlantA", &df).unwrap();
        assert_eq!(
            mapped.series.column(CanonicalField::AvailabilityPct),
            vec![Some(0.5), Some(97.0)]
        );
        assert!(mapped.report.rescaled_fields.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let df = df!("date" => &["2024-06-01"], "Export" => &[10.0]).unwrap();
        let err = SchemaMapper::new().map_frame("PlantA", &df).unwrap_err();
        assert_eq!(err, MappingError::MissingRequiredField(CanonicalField::AvailabilityPct));
        assert!(err.to_string().starts_with("missing required field"));
    }

    #[test]
    fn test_no_valid_dates() {
        let df = df!(
            "date" => &["n/a", "unknown"],
            "PA" => &[95.0, 96.0],
            "Export" => &[1.0, 2.0]
        )
        .unwrap();
        let err = SchemaMapper::new().map_frame("PlantA", &df).unwrap_err();
        assert_eq!(err, MappingError::NoValidDates);
    }

    #[test]
    fn test_optional_field_fully_missing() {
        let df = df!(
            "date" => &["2024-06-01", "bad", "2024-06-03"],
            "PA" => &[95.0, 96.0, 97.0],
            "Export" => &["1,000", "x", " 1200 "]
        )
        .unwrap();
        let mapped = SchemaMapper::new().map_frame("PlantA", &df).unwrap();
        let report = &mapped.report;

        assert_eq!(report.total_rows, 3);
        assert_eq!(report.valid_rows, 2);
        assert_eq!(report.dropped_null_dates, 1);
        assert_eq!(report.missing[&CanonicalField::PerformanceRatioPct].count, 3);
        assert_eq!(report.missing[&CanonicalField::PerformanceRatioPct].percentage, 100.0);
        assert_eq!(report.missing[&CanonicalField::EnergyExport].count, 1);
        assert_eq!(
            mapped.series.column(CanonicalField::EnergyExport),
            vec![Some(1000.0), Some(1200.0)]
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 5);
        assert_eq!(parse_date("2024-06-05"), expected);
        assert_eq!(parse_date("05/06/2024"), expected);
        assert_eq!(parse_date("05-Jun-2024"), expected);
        assert_eq!(parse_date("2024-06-05 00:00:00"), expected);
        assert_eq!(parse_date("2024-13-45"), None);
    }
}
