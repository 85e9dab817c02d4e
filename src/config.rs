//! Runtime configuration
//!
//! Every section has defaults, so an absent file or a partial JSON document is
//! valid. Environment variables override the file:
//! - `PLANT_CONFIG`: path of the JSON file
//! - `PLANT_DATA_DIR`: directory of plant exports
//! - `PLANT_FILE_PREFIX`: prefix stripped from export file names

use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingestion: IngestionConfig,
    pub analytics: AnalyticsConfig,
    pub diagnosis: DiagnosisThresholds,
    pub screening: ScreeningThresholds,
    pub tariffs: TariffTable,
    pub aliases: AliasConfig,
}

/// Where plant exports live and how they are named
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub data_dir: PathBuf,
    /// Stripped from the file stem to form the plant id (e.g. `DGR_`)
    pub file_prefix: String,
    pub file_extension: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("files"),
            file_prefix: "DGR_".to_string(),
            file_extension: "csv".to_string(),
        }
    }
}

/// Window sizes and default-selection limits used by the router.
/// Window sizes count available rows, not calendar days.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub default_window_rows: usize,
    pub comparison_window_rows: usize,
    pub forecast_window_rows: usize,
    pub diagnosis_window_rows: usize,
    pub default_plant_limit: usize,
    pub comparison_top_n: usize,
    /// Plants per technology when a comparison asks for solar and wind
    pub mixed_comparison_per_technology: usize,
    pub smooth_comparison_outliers: bool,
    pub min_forecast_points: usize,
    pub min_trend_points: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_window_rows: 30,
            comparison_window_rows: 7,
            forecast_window_rows: 90,
            diagnosis_window_rows: 30,
            default_plant_limit: 5,
            comparison_top_n: 2,
            mixed_comparison_per_technology: 3,
            smooth_comparison_outliers: true,
            min_forecast_points: 8,
            min_trend_points: 2,
        }
    }
}

/// Floors used by diagnosis scoring
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisThresholds {
    pub availability_hard_floor: f64,
    pub availability_soft_floor: f64,
    pub performance_ratio_floor: f64,
    pub energy_trend_floor_pct: f64,
    pub completeness_floor_pct: f64,
}

impl Default for DiagnosisThresholds {
    fn default() -> Self {
        Self {
            availability_hard_floor: 85.0,
            availability_soft_floor: 95.0,
            performance_ratio_floor: 75.0,
            energy_trend_floor_pct: -15.0,
            completeness_floor_pct: 80.0,
        }
    }
}

/// Checks used to pick plants for diagnosis when a query names none.
/// A plant qualifies when it fails at least `min_issues` of them over its
/// last `window_rows` rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningThresholds {
    pub window_rows: usize,
    pub availability_floor: f64,
    pub performance_ratio_floor: f64,
    pub energy_trend_floor_pct: f64,
    pub min_issues: usize,
    pub max_plants: usize,
}

impl Default for ScreeningThresholds {
    fn default() -> Self {
        Self {
            window_rows: 7,
            availability_floor: 90.0,
            performance_ratio_floor: 80.0,
            energy_trend_floor_pct: -10.0,
            min_issues: 2,
            max_plants: 5,
        }
    }
}

/// Tariff per kWh by technology
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffTable {
    pub solar: f64,
    pub wind: f64,
}

impl Default for TariffTable {
    fn default() -> Self {
        Self {
            solar: 3.50,
            wind: 3.20,
        }
    }
}

/// Known short codes: if a plant id contains the key token, the listed
/// aliases also resolve to that plant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub short_codes: BTreeMap<String, Vec<String>>,
}

impl Default for AliasConfig {
    fn default() -> Self {
        let mut short_codes = BTreeMap::new();
        short_codes.insert("NTPC".to_string(), vec!["ntpc".to_string()]);
        short_codes.insert("JPPL".to_string(), vec!["jppl".to_string(), "jp".to_string()]);
        short_codes.insert("ESP".to_string(), vec!["esp".to_string()]);
        Self { short_codes }
    }
}

impl AppConfig {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("PLANT_CONFIG").ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var("PLANT_DATA_DIR") {
            config.ingestion.data_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("PLANT_FILE_PREFIX") {
            config.ingestion.file_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.analytics;
        if a.default_window_rows == 0
            || a.comparison_window_rows == 0
            || a.forecast_window_rows == 0
            || a.diagnosis_window_rows == 0
        {
            return Err(AnalyticsError::Config(
                "window sizes must be at least one row".to_string(),
            ));
        }
        if a.comparison_top_n < 2 {
            return Err(AnalyticsError::Config(
                "comparison_top_n must be at least 2".to_string(),
            ));
        }
        if self.screening.window_rows == 0 || self.screening.min_issues == 0 {
            return Err(AnalyticsError::Config(
                "screening needs at least one row and one issue".to_string(),
            ));
        }
        let d = &self.diagnosis;
        if d.availability_hard_floor > d.availability_soft_floor {
            return Err(AnalyticsError::Config(format!(
                "availability hard floor {} exceeds soft floor {}",
                d.availability_hard_floor, d.availability_soft_floor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"diagnosis": {"availability_hard_floor": 80.0}}"#).unwrap();
        assert_eq!(config.diagnosis.availability_hard_floor, 80.0);
        assert_eq!(config.diagnosis.availability_soft_floor, 95.0);
        assert_eq!(config.analytics.comparison_top_n, 2);
        assert_eq!(config.ingestion.file_prefix, "DGR_");
    }

    #[test]
    fn test_validate_rejects_inverted_floors() {
        let mut config = AppConfig::default();
        config.diagnosis.availability_hard_floor = 99.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_screening_defaults_and_override() {
        let config: AppConfig =
            serde_json::from_str(r#"{"screening": {"max_plants": 3}}"#).unwrap();
        assert_eq!(config.screening.max_plants, 3);
        assert_eq!(config.screening.window_rows, 7);
        assert_eq!(config.screening.min_issues, 2);
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.screening.min_issues = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = AppConfig::default();
        config.analytics.comparison_window_rows = 0;
        assert!(config.validate().is_err());
    }
}
