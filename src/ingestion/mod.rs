//! Ingestion - plant exports into canonical series
//!
//! Pipeline: TableSource -> SchemaMapper -> (PlantTimeSeries, DataQualityReport)

pub mod catalog;
pub mod connector;
pub mod quality;
pub mod schema_mapper;

pub use catalog::{field_catalog, CanonicalField, FieldDomain, FieldSpec};
pub use connector::{CsvDirectorySource, InMemorySource, TableDescriptor, TableSource};
pub use quality::{DataQualityReport, DateRange, MissingStats};
pub use schema_mapper::{MappedPlant, MappingError, SchemaMapper};
