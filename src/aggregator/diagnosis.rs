//! Diagnosis and maintenance scoring
//!
//! Each rule is independent and adds integer points. Triggered rules emit an
//! issue and a recommended action at the same index.

use crate::config::DiagnosisThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn from_score(score: u32) -> Self {
        match score {
            0 => Priority::Low,
            1..=2 => Priority::Medium,
            3..=5 => Priority::High,
            _ => Priority::Critical,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Window aggregates a diagnosis is computed from. Absent metrics skip their rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisInput {
    pub avg_availability: Option<f64>,
    pub avg_performance_ratio: Option<f64>,
    /// Signed first-half to second-half change of energy export, in percent
    pub energy_trend_pct: Option<f64>,
    pub completeness_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub score: u32,
    pub priority: Priority,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn diagnose(input: &DiagnosisInput, thresholds: &DiagnosisThresholds) -> Diagnosis {
    let mut score = 0;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(avail) = input.avg_availability {
        if avail < thresholds.availability_hard_floor {
            score += 3;
            issues.push(format!(
                "Low availability: {:.1}% (target: {:.0}%+)",
                avail, thresholds.availability_soft_floor
            ));
            recommendations.push("Schedule immediate maintenance inspection".to_string());
        } else if avail < thresholds.availability_soft_floor {
            score += 1;
            issues.push(format!("Below-target availability: {:.1}%", avail));
            recommendations.push("Review maintenance schedules".to_string());
        }
    }

    if let Some(pr) = input.avg_performance_ratio {
        if pr < thresholds.performance_ratio_floor {
            score += 2;
            issues.push(format!("Low performance ratio: {:.1}%", pr));
            recommendations.push("Check inverter efficiency and module soiling".to_string());
        }
    }

    if let Some(trend) = input.energy_trend_pct {
        if trend < thresholds.energy_trend_floor_pct {
            score += 2;
            issues.push(format!("Declining energy output: {:.1}% trend", trend));
            recommendations.push("Investigate equipment degradation".to_string());
        }
    }

    if input.completeness_pct < thresholds.completeness_floor_pct {
        score += 1;
        issues.push(format!("Poor data quality: {:.1}% complete", input.completeness_pct));
        recommendations.push("Check monitoring system connectivity".to_string());
    }

    Diagnosis {
        score,
        priority: Priority::from_score(score),
        issues,
        recommendations,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaintenancePriority {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceAssessment {
    pub score: u32,
    pub priority: MaintenancePriority,
    pub issues: Vec<String>,
    pub recommendation: String,
    pub estimated_downtime_hours: f64,
}

/// Maintenance need from the performance-ratio trend and energy consistency
pub fn assess_maintenance(pr_trend_pct: Option<f64>, energy_consistency: Option<f64>) -> MaintenanceAssessment {
    let mut score = 0;
    let mut issues = Vec::new();

    if pr_trend_pct.is_some_and(|t| t < -3.0) {
        score += 2;
        issues.push("Declining performance ratio".to_string());
    }
    if energy_consistency.is_some_and(|c| c < 0.8) {
        score += 1;
        issues.push("Inconsistent energy output".to_string());
    }

    let (priority, recommendation, downtime) = match score {
        s if s >= 5 => (MaintenancePriority::High, "Schedule immediate inspection", 24.0),
        s if s >= 3 => (MaintenancePriority::Medium, "Plan maintenance within 2 weeks", 8.0),
        s if s >= 1 => (MaintenancePriority::Low, "Include in next routine maintenance", 4.0),
        _ => (MaintenancePriority::None, "No immediate maintenance required", 0.0),
    };

    MaintenanceAssessment {
        score,
        priority,
        issues,
        recommendation: recommendation.to_string(),
        estimated_downtime_hours: downtime,
    }
}
