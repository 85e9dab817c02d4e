pub mod aggregator;
pub mod clock;
pub mod config;
pub mod data_assistant;
pub mod error;
pub mod ingestion;
pub mod query;
pub mod router;
pub mod series;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use data_assistant::DataAssistant;
pub use error::{AnalyticsError, Result};
pub use ingestion::{CanonicalField, CsvDirectorySource, InMemorySource, SchemaMapper, TableSource};
pub use router::{AnalyticsResult, DegradedReason, Handler};
pub use series::{PlantRecord, PlantTimeSeries};
pub use store::{CanonicalPlantStore, PlantStoreHandle};
