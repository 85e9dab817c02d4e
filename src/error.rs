use crate::store::LoadSummary;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error(
        "No plants loaded: {} of {} tables failed to map",
        .summary.failed_count(),
        .summary.attempted
    )]
    NoPlantsLoaded { summary: Box<LoadSummary> },

    // Contract violation: queries must not be routed before a snapshot is published
    #[error("Plant store has not been initialized")]
    StoreNotInitialized,
}

impl From<polars::error::PolarsError> for AnalyticsError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnalyticsError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
