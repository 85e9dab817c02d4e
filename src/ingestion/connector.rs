//! Table Source Trait - Abstract interface for plant exports
//!
//! A source discovers one table per plant and opens it as a polars frame.
//! Discovery failures abort a load; open failures only affect that table.

use crate::config::IngestionConfig;
use crate::error::{AnalyticsError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// A discovered table, not yet opened
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Unique identifier of the table within its source (e.g. file name)
    pub table_id: String,

    /// Plant the table describes
    pub plant_id: String,

    /// Filesystem location, when the source is file-backed
    pub location: Option<PathBuf>,
}

/// Table Source Trait
///
/// Implementations:
/// - CsvDirectorySource: one CSV export per plant in a directory
/// - InMemorySource: frames handed over by the caller
pub trait TableSource: Send + Sync {
    /// List every table the source can provide, in a stable order
    fn discover(&self) -> Result<Vec<TableDescriptor>>;

    /// Read one table as a named-column frame
    fn open(&self, table: &TableDescriptor) -> Result<DataFrame>;

    /// Source type (e.g., "csv_directory", "memory")
    fn source_type(&self) -> &str;
}

/// CSV Directory Source - reads `<prefix><plant>.<ext>` files
pub struct CsvDirectorySource {
    data_dir: PathBuf,
    file_prefix: String,
    file_extension: String,
}

impl CsvDirectorySource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_prefix: String::new(),
            file_extension: "csv".to_string(),
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            file_extension: config.file_extension.clone(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Plant id for a file stem, or None when the stem does not carry the prefix
    fn plant_id_for(&self, stem: &str) -> Option<String> {
        let id = stem.strip_prefix(self.file_prefix.as_str())?.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}

impl TableSource for CsvDirectorySource {
    fn discover(&self) -> Result<Vec<TableDescriptor>> {
        let entries = std::fs::read_dir(&self.data_dir).map_err(|e| {
            AnalyticsError::Source(format!(
                "Failed to read data directory {:?}: {}",
                self.data_dir, e
            ))
        })?;

        let mut tables = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext_matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(&self.file_extension))
                .unwrap_or(false);
            if !ext_matches {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(plant_id) = self.plant_id_for(stem) else {
                debug!("Skipping {:?}: no '{}' prefix", path, self.file_prefix);
                continue;
            };
            let table_id = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(stem)
                .to_string();

            tables.push(TableDescriptor {
                table_id,
                plant_id,
                location: Some(path),
            });
        }

        tables.sort_by(|a, b| a.table_id.cmp(&b.table_id));
        debug!("Discovered {} tables in {:?}", tables.len(), self.data_dir);
        Ok(tables)
    }

    fn open(&self, table: &TableDescriptor) -> Result<DataFrame> {
        let path = table
            .location
            .clone()
            .unwrap_or_else(|| self.data_dir.join(&table.table_id));

        let df = LazyCsvReader::new(&path)
            .with_has_header(true)
            .with_infer_schema_length(None)
            .finish()
            .map_err(|e| AnalyticsError::Source(format!("Failed to read CSV {:?}: {}", path, e)))?
            .collect()
            .map_err(|e| AnalyticsError::Source(format!("Failed to collect {:?}: {}", path, e)))?;

        Ok(df)
    }

    fn source_type(&self) -> &str {
        "csv_directory"
    }
}

/// In-Memory Source - frames supplied by the caller
#[derive(Default)]
pub struct InMemorySource {
    tables: Vec<(TableDescriptor, DataFrame)>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; the table id defaults to the plant id
    pub fn with_table(mut self, plant_id: impl Into<String>, df: DataFrame) -> Self {
        let plant_id = plant_id.into();
        self.tables.push((
            TableDescriptor {
                table_id: plant_id.clone(),
                plant_id,
                location: None,
            },
            df,
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableSource for InMemorySource {
    fn discover(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.tables.iter().map(|(desc, _)| desc.clone()).collect())
    }

    fn open(&self, table: &TableDescriptor) -> Result<DataFrame> {
        self.tables
            .iter()
            .find(|(desc, _)| desc.table_id == table.table_id)
            .map(|(_, df)| df.clone())
            .ok_or_else(|| AnalyticsError::Source(format!("Unknown table '{}'", table.table_id)))
    }

    fn source_type(&self) -> &str {
        "memory"
    }
}
