//! Handler bodies
//!
//! Each handler receives the plants and window already chosen by the router
//! and returns a payload plus any issue/recommendation lists. Handlers never
//! fail: missing metrics simply produce empty sections.

use crate::aggregator::diagnosis::{assess_maintenance, diagnose, DiagnosisInput};
use crate::aggregator::insights::{
    alert_summary, availability_analysis, availability_portfolio, comparison_view, energy_analysis,
    financial_summary, forecast, plant_performance, plant_status, weather_impact, PlantWindow,
};
use crate::aggregator::stats::{completeness_pct, consistency_score, mean, trend, values};
use crate::aggregator::window::{select_window, TimePeriodSpec};
use crate::config::AppConfig;
use crate::ingestion::catalog::CanonicalField;
use crate::query::classifier::QueryClassifier;
use crate::query::entities::EntitySet;
use crate::router::result::{HelpTopic, Payload, PlantDiagnosis, PlantMaintenance};
use crate::series::{PlantRecord, PlantTimeSeries};
use crate::store::CanonicalPlantStore;
use chrono::NaiveDate;

const DEFAULT_PERFORMANCE_METRICS: &[CanonicalField] = &[
    CanonicalField::PerformanceRatioPct,
    CanonicalField::AvailabilityPct,
    CanonicalField::CapacityUtilizationPct,
    CanonicalField::EnergyExport,
];

/// Inputs shared by every handler
pub struct HandlerContext<'a> {
    pub store: &'a CanonicalPlantStore,
    pub plants: &'a [String],
    pub period: TimePeriodSpec,
    pub today: NaiveDate,
    pub entities: &'a EntitySet,
    pub config: &'a AppConfig,
}

pub struct HandlerOutput {
    pub payload: Payload,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    /// At least one selected plant had rows in the window
    pub has_data: bool,
}

impl HandlerOutput {
    fn new(payload: Payload, has_data: bool) -> Self {
        Self {
            payload,
            issues: Vec::new(),
            recommendations: Vec::new(),
            has_data,
        }
    }
}

struct Selected<'a> {
    series: &'a PlantTimeSeries,
    window: &'a [PlantRecord],
}

impl<'a> Selected<'a> {
    fn id(&self) -> &'a str {
        self.series.plant_id()
    }
}

impl<'a> HandlerContext<'a> {
    fn selected(&self) -> Vec<Selected<'a>> {
        self.plants
            .iter()
            .filter_map(|id| self.store.get_series(id))
            .map(|series| Selected {
                series,
                window: select_window(series, self.period, self.today),
            })
            .collect()
    }

    fn plant_windows(selected: &[Selected<'a>]) -> Vec<PlantWindow<'a>> {
        selected.iter().map(|s| (s.id(), s.window)).collect()
    }
}

fn any_rows(selected: &[Selected<'_>]) -> bool {
    selected.iter().any(|s| !s.window.is_empty())
}

pub fn status(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let plants: Vec<_> = selected.iter().map(|s| plant_status(s.id(), s.window)).collect();
    let total_energy: f64 = plants.iter().map(|p| p.energy).sum();
    HandlerOutput::new(Payload::Status { plants, total_energy }, any_rows(&selected))
}

pub fn performance(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let metrics: Vec<CanonicalField> = if ctx.entities.metrics.is_empty() {
        DEFAULT_PERFORMANCE_METRICS.to_vec()
    } else {
        ctx.entities.metrics.iter().copied().collect()
    };
    let selected = ctx.selected();
    let plants = selected
        .iter()
        .map(|s| plant_performance(s.id(), s.window, &metrics))
        .collect();
    HandlerOutput::new(Payload::Performance { plants }, any_rows(&selected))
}

pub fn energy(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let plants: Vec<_> = selected.iter().map(|s| energy_analysis(s.id(), s.window)).collect();
    let total_energy: f64 = plants.iter().map(|p| p.total).sum();
    HandlerOutput::new(Payload::Energy { plants, total_energy }, any_rows(&selected))
}

pub fn availability(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let plants: Vec<_> = selected
        .iter()
        .filter_map(|s| availability_analysis(s.id(), s.window))
        .collect();
    let portfolio = availability_portfolio(&plants);
    let has_data = !plants.is_empty();
    HandlerOutput::new(Payload::Availability { plants, portfolio }, has_data)
}

pub fn financial(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let windows = HandlerContext::plant_windows(&selected);
    let summary = financial_summary(&windows, &ctx.config.tariffs);
    HandlerOutput::new(Payload::Financial(summary), any_rows(&selected))
}

pub fn maintenance(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    let plants: Vec<PlantMaintenance> = selected
        .iter()
        .map(|s| {
            let pr_trend = trend_pct(s.window, CanonicalField::PerformanceRatioPct, ctx.config.analytics.min_trend_points);
            let energy = values(s.window, CanonicalField::EnergyExport);
            let consistency = (!energy.is_empty()).then(|| consistency_score(&energy));
            let assessment = assess_maintenance(pr_trend, consistency);

            issues.extend(assessment.issues.iter().map(|i| format!("{}: {}", s.id(), i)));
            if assessment.score > 0 {
                recommendations.push(format!("{}: {}", s.id(), assessment.recommendation));
            }
            PlantMaintenance {
                plant_id: s.id().to_string(),
                assessment,
            }
        })
        .collect();

    HandlerOutput {
        payload: Payload::Maintenance { plants },
        issues,
        recommendations,
        has_data: any_rows(&selected),
    }
}

pub fn comparison(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let windows = HandlerContext::plant_windows(&selected);
    let view = comparison_view(&windows, ctx.config.analytics.smooth_comparison_outliers);
    HandlerOutput::new(Payload::Comparison(view), any_rows(&selected))
}

pub fn diagnostic(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    let plants: Vec<PlantDiagnosis> = selected
        .iter()
        .map(|s| {
            let input = diagnosis_input(s.series, s.window, ctx.config.analytics.min_trend_points);
            let diagnosis = diagnose(&input, &ctx.config.diagnosis);
            issues.extend(diagnosis.issues.iter().map(|i| format!("{}: {}", s.id(), i)));
            recommendations.extend(diagnosis.recommendations.iter().map(|r| format!("{}: {}", s.id(), r)));
            PlantDiagnosis {
                plant_id: s.id().to_string(),
                input,
                diagnosis,
            }
        })
        .collect();

    HandlerOutput {
        payload: Payload::Diagnostic { plants },
        issues,
        recommendations,
        has_data: any_rows(&selected),
    }
}

pub fn forecast_handler(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let plants = selected
        .iter()
        .map(|s| forecast(s.id(), s.window, ctx.config.analytics.min_forecast_points))
        .collect();
    HandlerOutput::new(Payload::Forecast { plants }, any_rows(&selected))
}

pub fn weather(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let plants = selected
        .iter()
        .map(|s| {
            let mapped: Vec<CanonicalField> = s.series.mapped_fields().iter().copied().collect();
            weather_impact(s.id(), s.window, &mapped)
        })
        .collect();
    HandlerOutput::new(Payload::Weather { plants }, any_rows(&selected))
}

pub fn alerts(ctx: &HandlerContext<'_>) -> HandlerOutput {
    let selected = ctx.selected();
    let statuses: Vec<_> = selected.iter().map(|s| plant_status(s.id(), s.window)).collect();
    HandlerOutput::new(Payload::Alerts(alert_summary(&statuses)), any_rows(&selected))
}

/// The category catalog with a few keywords each, plus the loaded plants
pub fn help(store: &CanonicalPlantStore) -> HandlerOutput {
    let topics = QueryClassifier::new()
        .catalog()
        .iter()
        .map(|category| HelpTopic {
            category: category.intent,
            example_keywords: category.keywords.iter().take(3).map(|k| k.to_string()).collect(),
        })
        .collect();
    HandlerOutput::new(
        Payload::Help {
            topics,
            plants: store.list_plant_ids(),
        },
        true,
    )
}

/// Window aggregates for diagnosis. Completeness counts only the fields the
/// plant's table actually mapped.
pub fn diagnosis_input(series: &PlantTimeSeries, window: &[PlantRecord], min_trend_points: usize) -> DiagnosisInput {
    DiagnosisInput {
        avg_availability: mean(&values(window, CanonicalField::AvailabilityPct)),
        avg_performance_ratio: mean(&values(window, CanonicalField::PerformanceRatioPct)),
        energy_trend_pct: trend_pct(window, CanonicalField::EnergyExport, min_trend_points),
        completeness_pct: completeness_pct(window, series.mapped_fields()),
    }
}

fn trend_pct(window: &[PlantRecord], field: CanonicalField, min_points: usize) -> Option<f64> {
    let vals = values(window, field);
    if vals.len() < min_points {
        return None;
    }
    trend(&vals).map(|t| t.change_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::schema_mapper::SchemaMapper;
    use approx::assert_relative_eq;
    use polars::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn store_with(id: &str, dates: &[&str], energy: &[f64], pa: &[f64], pr: &[f64]) -> CanonicalPlantStore {
        let df = df!(
            "date" => dates,
            "Export" => energy,
            "PA(%)" => pa,
            "PR(%)" => pr
        )
        .unwrap();
        let mapped = SchemaMapper::new().map_frame(id, &df).unwrap();
        CanonicalPlantStore::from_mapped(vec![mapped])
    }

    #[test]
    fn test_diagnosis_input_from_window() {
        let store = store_with(
            "PlantA",
            &["2024-06-01", "2024-06-02", "2024-06-03", "2024-06-04"],
            &[1000.0, 1000.0, 800.0, 800.0],
            &[80.0, 80.0, 80.0, 80.0],
            &[90.0, 90.0, 90.0, 90.0],
        );
        let series = store.get_series("PlantA").unwrap();
        let input = diagnosis_input(series, series.records(), 2);

        assert_relative_eq!(input.avg_availability.unwrap(), 80.0);
        assert_relative_eq!(input.avg_performance_ratio.unwrap(), 90.0);
        assert_relative_eq!(input.energy_trend_pct.unwrap(), -20.0, epsilon = 1e-9);
        assert_relative_eq!(input.completeness_pct, 100.0);

        let d = diagnose(&input, &AppConfig::default().diagnosis);
        assert_eq!(d.score, 5);
    }

    #[test]
    fn test_status_uses_latest_reading() {
        let store = store_with(
            "PlantA",
            &["2024-06-01", "2024-06-02"],
            &[1000.0, 1100.0],
            &[96.0, 60.0],
            &[80.0, 80.0],
        );
        let plants = vec!["PlantA".to_string()];
        let entities = EntitySet::default();
        let config = AppConfig::default();
        let ctx = HandlerContext {
            store: &store,
            plants: &plants,
            period: TimePeriodSpec::RealTime,
            today: day(15),
            entities: &entities,
            config: &config,
        };

        let out = status(&ctx);
        assert!(out.has_data);
        match out.payload {
            Payload::Status { plants, total_energy } => {
                assert_eq!(plants[0].availability, Some(60.0));
                assert_relative_eq!(total_energy, 1100.0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_empty_window_reports_no_data() {
        let store = store_with("PlantA", &["2024-06-01"], &[1000.0], &[96.0], &[80.0]);
        let plants = vec!["PlantA".to_string()];
        let entities = EntitySet::default();
        let config = AppConfig::default();
        let ctx = HandlerContext {
            store: &store,
            plants: &plants,
            period: TimePeriodSpec::Today,
            today: day(15),
            entities: &entities,
            config: &config,
        };
        assert!(!energy(&ctx).has_data);
        assert!(!availability(&ctx).has_data);
    }
}
