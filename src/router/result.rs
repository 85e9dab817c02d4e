//! Structured results handed to the response renderer

use crate::aggregator::diagnosis::{Diagnosis, DiagnosisInput, MaintenanceAssessment};
use crate::aggregator::insights::{
    AlertSummary, AvailabilityAnalysis, AvailabilityPortfolio, ComparisonView, EnergyAnalysis,
    FinancialSummary, PlantForecast, PlantPerformance, PlantStatus, WeatherImpact,
};
use crate::aggregator::window::TimePeriodSpec;
use crate::query::classifier::{CategoryScore, Intent};
use crate::query::entities::{EntitySet, UnresolvedPlant};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The concrete routine a query resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    Status,
    Performance,
    Energy,
    Availability,
    Financial,
    Maintenance,
    Comparison,
    Diagnostic,
    Forecast,
    Weather,
    Alert,
    Help,
    General,
}

impl Handler {
    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::Status => Handler::Status,
            Intent::Performance => Handler::Performance,
            Intent::Energy => Handler::Energy,
            Intent::Availability => Handler::Availability,
            Intent::Financial => Handler::Financial,
            Intent::Maintenance => Handler::Maintenance,
            Intent::Comparison => Handler::Comparison,
            Intent::Diagnostic => Handler::Diagnostic,
            Intent::Forecasting => Handler::Forecast,
            Intent::Weather => Handler::Weather,
            Intent::Alert => Handler::Alert,
            Intent::General => Handler::General,
        }
    }

    /// Handlers that look at the whole portfolio when no plant is named
    pub fn is_portfolio_wide(&self) -> bool {
        matches!(self, Handler::Comparison | Handler::Alert | Handler::Availability)
    }
}

/// Why a result carries no (or partial) data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    NoPlantsAvailable,
    UnknownPlant,
    NoDataInWindow,
    Unclassified,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DegradedReason::NoPlantsAvailable => "no plants available",
            DegradedReason::UnknownPlant => "unknown plant",
            DegradedReason::NoDataInWindow => "no data in window",
            DegradedReason::Unclassified => "unclassified",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantDiagnosis {
    pub plant_id: String,
    pub input: DiagnosisInput,
    pub diagnosis: Diagnosis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantMaintenance {
    pub plant_id: String,
    pub assessment: MaintenanceAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpTopic {
    pub category: Intent,
    pub example_keywords: Vec<String>,
}

/// Numeric payload of a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Status {
        plants: Vec<PlantStatus>,
        total_energy: f64,
    },
    Performance {
        plants: Vec<PlantPerformance>,
    },
    Energy {
        plants: Vec<EnergyAnalysis>,
        total_energy: f64,
    },
    Availability {
        plants: Vec<AvailabilityAnalysis>,
        portfolio: AvailabilityPortfolio,
    },
    Financial(FinancialSummary),
    Maintenance {
        plants: Vec<PlantMaintenance>,
    },
    Comparison(ComparisonView),
    Diagnostic {
        plants: Vec<PlantDiagnosis>,
    },
    Forecast {
        plants: Vec<PlantForecast>,
    },
    Weather {
        plants: Vec<WeatherImpact>,
    },
    Alerts(AlertSummary),
    Help {
        topics: Vec<HelpTopic>,
        plants: Vec<String>,
    },
    UnknownPlant {
        suggestions: Vec<UnresolvedPlant>,
        known_plants: Vec<String>,
    },
}

/// One answered query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub query_id: Uuid,
    pub category: Intent,
    pub confidence: f64,
    pub scores: Vec<CategoryScore>,
    pub handler: Handler,
    pub entities: EntitySet,
    /// Plants the handler actually looked at, after default selection
    pub plants: Vec<String>,
    /// `None` when the handler fell back to its default window
    pub period: Option<TimePeriodSpec>,
    pub payload: Option<Payload>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub degraded: bool,
    pub reason: Option<DegradedReason>,
    pub snapshot_version: u64,
}

impl AnalyticsResult {
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub(crate) fn degrade(&mut self, reason: DegradedReason) {
        self.degraded = true;
        self.reason = Some(reason);
    }
}
