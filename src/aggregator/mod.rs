//! Metric Aggregator - pure statistics over plant windows
//!
//! Nothing here touches the store. Callers select a window with
//! `window::select_window` and hand the records to the functions below.

pub mod diagnosis;
pub mod insights;
pub mod ranking;
pub mod stats;
pub mod window;

pub use diagnosis::{assess_maintenance, diagnose, Diagnosis, DiagnosisInput, MaintenanceAssessment, Priority};
pub use ranking::{rank_plants, RankedPlant};
pub use stats::{consistency_score, field_stats, smooth_outliers_iqr, trend, FieldStats, Trend, TrendDirection};
pub use window::{select_window, TimePeriodSpec};
