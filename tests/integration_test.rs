use approx::assert_relative_eq;
use chrono::NaiveDate;
use plant_analytics::aggregator::diagnosis::Priority;
use plant_analytics::aggregator::ranking::rank_plants;
use plant_analytics::aggregator::stats::smooth_outliers_iqr;
use plant_analytics::ingestion::{CanonicalField, InMemorySource, MappingError};
use plant_analytics::query::classifier::Intent;
use plant_analytics::router::Payload;
use plant_analytics::{AppConfig, CanonicalPlantStore, DataAssistant, DegradedReason, FixedClock, Handler};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn assistant() -> DataAssistant {
    let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    DataAssistant::with_clock(AppConfig::default(), Arc::new(clock))
}

fn two_day_plant(pa: [f64; 2], export: [f64; 2]) -> PolarsResult<DataFrame> {
    df! [
        "Date" => ["2024-06-01", "2024-06-02"],
        "PA(%)" => pa,
        "Mtr_Export (kWh)" => export,
        "PR(%)" => [82.0, 84.0]
    ]
}

#[test]
fn test_fractional_availability_is_rescaled() -> TestResult {
    let assistant = assistant();
    let source = InMemorySource::new().with_table("PlantA", two_day_plant([0.95, 0.97], [1000.0, 1100.0])?);
    let store = assistant.load(&source)?;

    let series = store.get_series("PlantA").expect("PlantA loaded");
    let availability = series.column(CanonicalField::AvailabilityPct);
    assert_relative_eq!(availability[0].unwrap(), 95.0, epsilon = 1e-9);
    assert_relative_eq!(availability[1].unwrap(), 97.0, epsilon = 1e-9);
    assert_eq!(series.column(CanonicalField::EnergyExport), vec![Some(1000.0), Some(1100.0)]);

    let report = store.get_quality_report("PlantA").expect("report");
    assert_eq!(report.rescaled_fields, vec![CanonicalField::AvailabilityPct]);
    assert_eq!(report.valid_rows, 2);
    Ok(())
}

#[test]
fn test_scaled_availability_left_alone() -> TestResult {
    let assistant = assistant();
    let source = InMemorySource::new().with_table("PlantA", two_day_plant([0.95, 97.0], [1000.0, 1100.0])?);
    let store = assistant.load(&source)?;

    let series = store.get_series("PlantA").expect("PlantA loaded");
    assert_eq!(series.column(CanonicalField::AvailabilityPct), vec![Some(0.95), Some(97.0)]);
    Ok(())
}

#[test]
fn test_compare_two_named_plants() -> TestResult {
    let assistant = assistant();
    let source = InMemorySource::new()
        .with_table("PlantA", two_day_plant([0.95, 0.97], [1000.0, 1100.0])?)
        .with_table("PlantB", two_day_plant([0.90, 0.92], [900.0, 950.0])?);
    assistant.load(&source)?;

    let result = assistant.ask("compare PlantA vs PlantB")?;
    assert_eq!(result.category, Intent::Comparison);
    assert!(result.confidence > 0.0);
    assert_eq!(
        result.entities.plants,
        BTreeSet::from(["PlantA".to_string(), "PlantB".to_string()])
    );
    assert_eq!(result.handler, Handler::Comparison);

    match result.payload {
        Some(Payload::Comparison(view)) => {
            assert_eq!(view.rankings.energy[0].plant_id, "PlantA");
            assert_eq!(view.rankings.energy[1].plant_id, "PlantB");
        }
        other => panic!("expected a comparison payload, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_status_on_empty_store_is_degraded() -> TestResult {
    let assistant = assistant();
    assistant.publish(CanonicalPlantStore::empty());

    let result = assistant.ask("status")?;
    assert!(result.degraded);
    assert_eq!(result.reason, Some(DegradedReason::NoPlantsAvailable));
    assert_eq!(result.reason.map(|r| r.to_string()), Some("no plants available".to_string()));
    assert!(result.payload.is_none());
    Ok(())
}

#[test]
fn test_diagnosis_scores_low_availability_and_falling_energy() -> TestResult {
    let assistant = assistant();
    let df = df! [
        "date" => ["2024-06-08", "2024-06-09", "2024-06-10", "2024-06-11", "2024-06-12", "2024-06-13", "2024-06-14"],
        "Plant Availability" => [80.0, 80.0, 80.0, 80.0, 80.0, 80.0, 80.0],
        "Performance Ratio" => [90.0, 90.0, 90.0, 90.0, 90.0, 90.0, 90.0],
        "Export" => [1000.0, 1000.0, 1000.0, 800.0, 800.0, 800.0, 800.0]
    ]?;
    assistant.load(&InMemorySource::new().with_table("PlantA", df))?;

    let result = assistant.ask("why is PlantA underperforming over the last 7 days")?;
    assert_eq!(result.handler, Handler::Diagnostic);

    match result.payload {
        Some(Payload::Diagnostic { plants }) => {
            let d = &plants[0].diagnosis;
            assert_eq!(d.score, 5);
            assert_eq!(d.priority, Priority::High);
            assert_eq!(d.issues.len(), 2);
            assert_eq!(d.issues.len(), d.recommendations.len());
        }
        other => panic!("expected a diagnostic payload, got {:?}", other),
    }
    assert_eq!(result.issues.len(), 2);
    Ok(())
}

#[test]
fn test_missing_required_field_excludes_plant() -> TestResult {
    let assistant = assistant();
    let no_export = df! [
        "date" => ["2024-06-01", "2024-06-02"],
        "PA(%)" => [96.0, 97.0]
    ]?;
    let source = InMemorySource::new()
        .with_table("PlantA", two_day_plant([0.95, 0.97], [1000.0, 1100.0])?)
        .with_table("PlantB", no_export);
    let store = assistant.load(&source)?;

    assert_eq!(store.list_plant_ids(), vec!["PlantA".to_string()]);
    assert!(store.get_series("PlantB").is_none());

    let summary = store.summary();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded_count(), 1);
    assert_eq!(summary.failures[0].plant_id, "PlantB");
    assert_eq!(
        summary.failures[0].reason,
        MappingError::MissingRequiredField(CanonicalField::EnergyExport)
    );
    Ok(())
}

#[test]
fn test_ranking_ignores_input_order() {
    let values = vec![
        ("PlantC", 10.0),
        ("PlantA", 12.0),
        ("PlantB", 10.0),
        ("PlantD", 7.5),
        ("PlantE", 12.0),
    ];
    let expected = rank_plants(values.clone());
    let order: Vec<&str> = expected.iter().map(|r| r.plant_id.as_str()).collect();
    assert_eq!(order, vec!["PlantA", "PlantE", "PlantB", "PlantC", "PlantD"]);

    let mut rotated = values.clone();
    for _ in 0..values.len() {
        rotated.rotate_left(1);
        assert_eq!(rank_plants(rotated.clone()), expected);
    }
    let mut reversed = values;
    reversed.reverse();
    assert_eq!(rank_plants(reversed), expected);
}

#[test]
fn test_iqr_smoothing_leaves_clean_data_unchanged() {
    let clean = vec![96.0, 97.5, 95.0, 98.0, 96.5, 97.0];
    assert_eq!(smooth_outliers_iqr(&clean), clean);

    let spiky = vec![96.0, 97.5, 95.0, 98.0, 96.5, 10.0];
    let smoothed = smooth_outliers_iqr(&spiky);
    assert_ne!(smoothed, spiky);
    assert!(smoothed.iter().all(|v| *v > 90.0));
}

#[test]
fn test_unknown_plant_is_degraded_not_an_error() -> TestResult {
    let assistant = assistant();
    let source = InMemorySource::new().with_table("PlantA", two_day_plant([0.95, 0.97], [1000.0, 1100.0])?);
    assistant.load(&source)?;

    let result = assistant.ask("energy export of PlantQ")?;
    assert!(result.degraded);
    assert_eq!(result.reason, Some(DegradedReason::UnknownPlant));
    Ok(())
}
