//! Derived analytical views
//!
//! Each view summarizes one or more plant windows into a serializable payload.
//! Views never modify the records they are given; smoothing runs on copies.

use crate::aggregator::ranking::{rank_plants, RankedPlant};
use crate::aggregator::stats::{
    consistency_score, field_stats, mean, pearson, quantile, smooth_outliers_iqr, trend, values,
    FieldStats, Trend, TrendDirection,
};
use crate::config::{ScreeningThresholds, TariffTable};
use crate::ingestion::catalog::CanonicalField;
use crate::series::PlantRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A plant id paired with its selected window
pub type PlantWindow<'a> = (&'a str, &'a [PlantRecord]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingStatus {
    Excellent,
    Good,
    Warning,
    Critical,
    Offline,
    NoData,
}

impl OperatingStatus {
    /// Classify one availability reading; a missing reading counts as 0
    pub fn from_availability(availability: Option<f64>) -> Self {
        let a = availability.unwrap_or(0.0);
        if a > 95.0 {
            OperatingStatus::Excellent
        } else if a > 85.0 {
            OperatingStatus::Good
        } else if a > 70.0 {
            OperatingStatus::Warning
        } else if a > 0.0 {
            OperatingStatus::Critical
        } else {
            OperatingStatus::Offline
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantStatus {
    pub plant_id: String,
    pub status: OperatingStatus,
    pub availability: Option<f64>,
    pub performance_ratio: Option<f64>,
    pub energy: f64,
    pub data_points: usize,
    pub last_update: Option<NaiveDate>,
}

/// Status from the latest row of the window; energy is summed over the window
pub fn plant_status(plant_id: &str, window: &[PlantRecord]) -> PlantStatus {
    let Some(latest) = window.last() else {
        return PlantStatus {
            plant_id: plant_id.to_string(),
            status: OperatingStatus::NoData,
            availability: None,
            performance_ratio: None,
            energy: 0.0,
            data_points: 0,
            last_update: None,
        };
    };
    let availability = latest.value(CanonicalField::AvailabilityPct);

    PlantStatus {
        plant_id: plant_id.to_string(),
        status: OperatingStatus::from_availability(availability),
        availability,
        performance_ratio: latest.value(CanonicalField::PerformanceRatioPct),
        energy: values(window, CanonicalField::EnergyExport).iter().sum(),
        data_points: window.len(),
        last_update: Some(latest.date),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub stats: FieldStats,
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantPerformance {
    pub plant_id: String,
    pub metrics: BTreeMap<CanonicalField, MetricSummary>,
}

/// Stats and trend for each requested metric that has data in the window
pub fn plant_performance(plant_id: &str, window: &[PlantRecord], metrics: &[CanonicalField]) -> PlantPerformance {
    let mut out = BTreeMap::new();
    for &field in metrics {
        let stats = field_stats(window, field);
        if stats.count == 0 {
            continue;
        }
        out.insert(
            field,
            MetricSummary {
                trend: trend(&values(window, field)),
                stats,
            },
        );
    }
    PlantPerformance {
        plant_id: plant_id.to_string(),
        metrics: out,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyAnalysis {
    pub plant_id: String,
    pub total: f64,
    pub average_daily: Option<f64>,
    pub maximum_daily: Option<f64>,
    pub minimum_daily: Option<f64>,
    pub trend: Option<Trend>,
    pub data_points: usize,
    pub consistency_score: f64,
}

pub fn energy_analysis(plant_id: &str, window: &[PlantRecord]) -> EnergyAnalysis {
    let energy = values(window, CanonicalField::EnergyExport);
    let stats = field_stats(window, CanonicalField::EnergyExport);
    EnergyAnalysis {
        plant_id: plant_id.to_string(),
        total: stats.sum,
        average_daily: stats.mean,
        maximum_daily: stats.max,
        minimum_daily: stats.min,
        trend: trend(&energy),
        data_points: stats.count,
        consistency_score: consistency_score(&energy),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AvailabilityGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
}

impl AvailabilityGrade {
    pub fn from_average(avg: f64) -> Self {
        if avg >= 98.0 {
            AvailabilityGrade::APlus
        } else if avg >= 95.0 {
            AvailabilityGrade::A
        } else if avg >= 90.0 {
            AvailabilityGrade::B
        } else if avg >= 85.0 {
            AvailabilityGrade::C
        } else {
            AvailabilityGrade::D
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityAnalysis {
    pub plant_id: String,
    pub average: f64,
    pub maximum: f64,
    pub minimum: f64,
    pub trend: Option<Trend>,
    pub days_above_95: usize,
    pub days_below_85: usize,
    /// Share of readings above zero
    pub uptime_pct: f64,
    pub data_points: usize,
    pub grade: AvailabilityGrade,
}

/// None when the window has no availability readings
pub fn availability_analysis(plant_id: &str, window: &[PlantRecord]) -> Option<AvailabilityAnalysis> {
    let avail = values(window, CanonicalField::AvailabilityPct);
    let average = mean(&avail)?;
    let n = avail.len();

    Some(AvailabilityAnalysis {
        plant_id: plant_id.to_string(),
        average,
        maximum: avail.iter().copied().fold(f64::MIN, f64::max),
        minimum: avail.iter().copied().fold(f64::MAX, f64::min),
        trend: trend(&avail),
        days_above_95: avail.iter().filter(|a| **a >= 95.0).count(),
        days_below_85: avail.iter().filter(|a| **a < 85.0).count(),
        uptime_pct: avail.iter().filter(|a| **a > 0.0).count() as f64 / n as f64 * 100.0,
        data_points: n,
        grade: AvailabilityGrade::from_average(average),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPortfolio {
    pub total_plants: usize,
    pub portfolio_average: Option<f64>,
    pub grade_distribution: BTreeMap<AvailabilityGrade, usize>,
    pub plants_above_95: usize,
    pub plants_below_85: usize,
}

pub fn availability_portfolio(analyses: &[AvailabilityAnalysis]) -> AvailabilityPortfolio {
    let mut grade_distribution = BTreeMap::new();
    for a in analyses {
        *grade_distribution.entry(a.grade).or_insert(0) += 1;
    }
    let averages: Vec<f64> = analyses.iter().map(|a| a.average).collect();

    AvailabilityPortfolio {
        total_plants: analyses.len(),
        portfolio_average: mean(&averages),
        grade_distribution,
        plants_above_95: averages.iter().filter(|a| **a >= 95.0).count(),
        plants_below_85: averages.iter().filter(|a| **a < 85.0).count(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Solar,
    Wind,
}

impl Technology {
    pub fn from_plant_id(plant_id: &str) -> Self {
        if plant_id.to_lowercase().contains("wind") {
            Technology::Wind
        } else {
            Technology::Solar
        }
    }

    pub fn tariff(&self, tariffs: &TariffTable) -> f64 {
        match self {
            Technology::Solar => tariffs.solar,
            Technology::Wind => tariffs.wind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantFinancials {
    pub plant_id: String,
    pub technology: Technology,
    pub energy_kwh: f64,
    pub tariff: f64,
    pub estimated_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub plants: Vec<PlantFinancials>,
    pub total_energy: f64,
    pub total_revenue: f64,
    /// Revenue-weighted tariff; 0 when no energy was exported
    pub average_tariff: f64,
}

pub fn financial_summary(windows: &[PlantWindow<'_>], tariffs: &TariffTable) -> FinancialSummary {
    let plants: Vec<PlantFinancials> = windows
        .iter()
        .map(|&(plant_id, window)| {
            let technology = Technology::from_plant_id(plant_id);
            let tariff = technology.tariff(tariffs);
            let energy_kwh: f64 = values(window, CanonicalField::EnergyExport).iter().sum();
            PlantFinancials {
                plant_id: plant_id.to_string(),
                technology,
                energy_kwh,
                tariff,
                estimated_revenue: energy_kwh * tariff,
            }
        })
        .collect();

    let total_energy: f64 = plants.iter().map(|p| p.energy_kwh).sum();
    let total_revenue: f64 = plants.iter().map(|p| p.estimated_revenue).sum();
    let average_tariff = if total_energy > 0.0 {
        total_revenue / total_energy
    } else {
        0.0
    };

    FinancialSummary {
        plants,
        total_energy,
        total_revenue,
        average_tariff,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherImpact {
    pub plant_id: String,
    pub ghi: Option<FieldStats>,
    pub ghi_trend: Option<Trend>,
    pub ambient_temp: Option<FieldStats>,
    pub wind_speed: Option<FieldStats>,
    /// Correlation of the performance signal with each weather field
    pub correlations: BTreeMap<CanonicalField, f64>,
    pub performance_signal: Option<CanonicalField>,
}

pub fn weather_impact(plant_id: &str, window: &[PlantRecord], mapped: &[CanonicalField]) -> WeatherImpact {
    let present = |field: CanonicalField| {
        let stats = field_stats(window, field);
        (stats.count > 0).then_some(stats)
    };

    let performance_signal = [CanonicalField::PerformanceRatioPct, CanonicalField::EnergyExport]
        .into_iter()
        .find(|f| mapped.contains(f));

    let mut correlations = BTreeMap::new();
    if let Some(signal) = performance_signal {
        for weather in [
            CanonicalField::IrradianceGhi,
            CanonicalField::AmbientTemp,
            CanonicalField::WindSpeedAvg,
        ] {
            if let Some(r) = pearson(window, signal, weather) {
                correlations.insert(weather, r);
            }
        }
    }

    WeatherImpact {
        plant_id: plant_id.to_string(),
        ghi: present(CanonicalField::IrradianceGhi),
        ghi_trend: trend(&values(window, CanonicalField::IrradianceGhi)),
        ambient_temp: present(CanonicalField::AmbientTemp),
        wind_speed: present(CanonicalField::WindSpeedAvg),
        correlations,
        performance_signal,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPrediction {
    pub expected_value: f64,
    pub low: f64,
    pub high: f64,
    pub direction: Option<TrendDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantForecast {
    pub plant_id: String,
    pub history_points: usize,
    pub energy: Option<ForecastPrediction>,
    pub availability: Option<ForecastPrediction>,
}

/// Expected value is the historical mean with an interquartile range.
/// A metric needs at least `min_points` readings.
pub fn forecast(plant_id: &str, window: &[PlantRecord], min_points: usize) -> PlantForecast {
    let predict = |field: CanonicalField| -> Option<ForecastPrediction> {
        let v = values(window, field);
        if v.len() < min_points {
            return None;
        }
        Some(ForecastPrediction {
            expected_value: mean(&v)?,
            low: quantile(&v, 0.25)?,
            high: quantile(&v, 0.75)?,
            direction: trend(&v).map(|t| t.direction),
        })
    };

    PlantForecast {
        plant_id: plant_id.to_string(),
        history_points: window.len(),
        energy: predict(CanonicalField::EnergyExport),
        availability: predict(CanonicalField::AvailabilityPct),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantComparison {
    pub plant_id: String,
    pub total_energy: f64,
    pub avg_energy: Option<f64>,
    pub avg_availability: Option<f64>,
    pub avg_performance_ratio: Option<f64>,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRankings {
    pub energy: Vec<RankedPlant>,
    pub availability: Vec<RankedPlant>,
    pub performance: Vec<RankedPlant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonView {
    pub plants: Vec<PlantComparison>,
    pub rankings: ComparisonRankings,
    pub best_energy: Option<RankedPlant>,
    pub worst_energy: Option<RankedPlant>,
    /// Best over worst total energy, when both are positive
    pub energy_gap_ratio: Option<f64>,
    pub smoothed: bool,
}

/// Side-by-side comparison. With `smooth`, each plant's values are
/// IQR-smoothed on a copy before aggregation.
pub fn comparison_view(windows: &[PlantWindow<'_>], smooth: bool) -> ComparisonView {
    let prepared = |window: &[PlantRecord], field: CanonicalField| -> Vec<f64> {
        let v = values(window, field);
        if smooth {
            smooth_outliers_iqr(&v)
        } else {
            v
        }
    };

    let plants: Vec<PlantComparison> = windows
        .iter()
        .map(|&(plant_id, window)| {
            let energy = prepared(window, CanonicalField::EnergyExport);
            PlantComparison {
                plant_id: plant_id.to_string(),
                total_energy: energy.iter().sum(),
                avg_energy: mean(&energy),
                avg_availability: mean(&prepared(window, CanonicalField::AvailabilityPct)),
                avg_performance_ratio: mean(&prepared(window, CanonicalField::PerformanceRatioPct)),
                data_points: window.len(),
            }
        })
        .collect();

    let energy = rank_plants(plants.iter().map(|p| (p.plant_id.clone(), p.total_energy)));
    let availability = rank_plants(
        plants
            .iter()
            .filter_map(|p| Some((p.plant_id.clone(), p.avg_availability?))),
    );
    let performance = rank_plants(
        plants
            .iter()
            .filter_map(|p| Some((p.plant_id.clone(), p.avg_performance_ratio?))),
    );

    let best_energy = energy.first().cloned();
    let worst_energy = energy.last().cloned();
    let energy_gap_ratio = match (&best_energy, &worst_energy) {
        (Some(best), Some(worst)) if best.value > 0.0 && worst.value > 0.0 => Some(best.value / worst.value),
        _ => None,
    };

    ComparisonView {
        plants,
        rankings: ComparisonRankings {
            energy,
            availability,
            performance,
        },
        best_energy,
        worst_energy,
        energy_gap_ratio,
        smoothed: smooth,
    }
}

/// Mean of window-average availability and performance ratio, over the
/// metrics present. Used to pick comparison partners.
pub fn composite_score(window: &[PlantRecord]) -> Option<f64> {
    let parts: Vec<f64> = [CanonicalField::AvailabilityPct, CanonicalField::PerformanceRatioPct]
        .into_iter()
        .filter_map(|f| mean(&values(window, f)))
        .collect();
    mean(&parts)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Underperformer {
    pub plant_id: String,
    pub issues: Vec<String>,
}

/// Screen each window for low availability, low performance ratio and
/// falling energy. Plants with at least `min_issues` failures are returned,
/// most issues first then by id, capped at `max_plants`. A metric the window
/// does not carry is not counted against the plant.
pub fn underperforming_plants(windows: &[PlantWindow<'_>], criteria: &ScreeningThresholds) -> Vec<Underperformer> {
    let mut flagged: Vec<Underperformer> = windows
        .iter()
        .filter_map(|(plant_id, window)| {
            let mut issues = Vec::new();
            if let Some(a) = mean(&values(window, CanonicalField::AvailabilityPct)) {
                if a < criteria.availability_floor {
                    issues.push(format!("availability {:.1}% below {}%", a, criteria.availability_floor));
                }
            }
            if let Some(pr) = mean(&values(window, CanonicalField::PerformanceRatioPct)) {
                if pr < criteria.performance_ratio_floor {
                    issues.push(format!("performance ratio {:.1}% below {}%", pr, criteria.performance_ratio_floor));
                }
            }
            if let Some(t) = trend(&values(window, CanonicalField::EnergyExport)) {
                if t.change_pct < criteria.energy_trend_floor_pct {
                    issues.push(format!("energy trend {:.1}%", t.change_pct));
                }
            }
            (issues.len() >= criteria.min_issues).then(|| Underperformer {
                plant_id: plant_id.to_string(),
                issues,
            })
        })
        .collect();

    flagged.sort_by(|a, b| b.issues.len().cmp(&a.issues.len()).then_with(|| a.plant_id.cmp(&b.plant_id)));
    flagged.truncate(criteria.max_plants);
    flagged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub plant_id: String,
    pub severity: AlertSeverity,
    pub status: OperatingStatus,
    pub availability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub alerts: Vec<Alert>,
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

/// Critical and offline plants raise critical alerts, warning status raises a
/// warning, everything else is informational. Alerts are ordered by severity.
pub fn alert_summary(statuses: &[PlantStatus]) -> AlertSummary {
    let mut alerts: Vec<Alert> = statuses
        .iter()
        .map(|s| {
            let severity = match s.status {
                OperatingStatus::Critical | OperatingStatus::Offline => AlertSeverity::Critical,
                OperatingStatus::Warning => AlertSeverity::Warning,
                _ => AlertSeverity::Info,
            };
            Alert {
                plant_id: s.plant_id.clone(),
                severity,
                status: s.status,
                availability: s.availability,
            }
        })
        .collect();
    alerts.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.plant_id.cmp(&b.plant_id)));

    let count = |sev| alerts.iter().filter(|a| a.severity == sev).count();
    AlertSummary {
        critical_count: count(AlertSeverity::Critical),
        warning_count: count(AlertSeverity::Warning),
        info_count: count(AlertSeverity::Info),
        alerts,
    }
}
