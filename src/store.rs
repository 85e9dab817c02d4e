//! Canonical Plant Store
//!
//! A store is an immutable snapshot of `plant_id -> (series, quality report)`.
//! Reloads build a complete new store and publish it through
//! `PlantStoreHandle`, which swaps a single pointer: readers hold the `Arc`
//! they dereferenced and never see a mix of two loads.

use crate::error::{AnalyticsError, Result};
use crate::ingestion::catalog::CanonicalField;
use crate::ingestion::connector::TableSource;
use crate::ingestion::quality::DataQualityReport;
use crate::ingestion::schema_mapper::{MappedPlant, MappingError, SchemaMapper};
use crate::series::PlantTimeSeries;
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PlantEntry {
    pub series: PlantTimeSeries,
    pub report: DataQualityReport,
}

/// A table that could not be loaded, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFailure {
    pub table_id: String,
    pub plant_id: String,
    pub reason: MappingError,
}

/// Outcome of one load run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub run_id: Uuid,
    pub source_type: String,
    pub attempted: usize,
    pub succeeded: Vec<String>,
    pub failures: Vec<TableFailure>,
}

impl LoadSummary {
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_type: source_type.into(),
            attempted: 0,
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalPlantStore {
    version: u64,
    plants: BTreeMap<String, PlantEntry>,
    summary: LoadSummary,
}

impl CanonicalPlantStore {
    /// A store with no plants
    pub fn empty() -> Self {
        Self {
            version: 0,
            plants: BTreeMap::new(),
            summary: LoadSummary::new("empty"),
        }
    }

    /// Assemble a store from already-mapped plants
    pub fn from_mapped(plants: Vec<MappedPlant>) -> Self {
        let mut summary = LoadSummary::new("memory");
        summary.attempted = plants.len();
        let mut store = Self {
            version: 0,
            plants: BTreeMap::new(),
            summary,
        };
        for mapped in plants {
            store.insert(mapped);
        }
        store
    }

    /// Map every table the source discovers. Per-table failures are recorded
    /// in the summary; the build fails only when discovery fails or no table
    /// maps at all.
    pub fn build(source: &dyn TableSource, mapper: &SchemaMapper) -> Result<Self> {
        let tables = source.discover()?;
        let mut summary = LoadSummary::new(source.source_type());
        summary.attempted = tables.len();
        let mut store = Self {
            version: 0,
            plants: BTreeMap::new(),
            summary,
        };

        for table in &tables {
            let outcome = source
                .open(table)
                .map_err(|e| MappingError::UnreadableTable(e.to_string()))
                .and_then(|df| mapper.map_table(table, &df));

            match outcome {
                Ok(mapped) => {
                    info!(
                        "Loaded {} from {}: {} of {} rows valid",
                        table.plant_id, table.table_id, mapped.report.valid_rows, mapped.report.total_rows
                    );
                    store.insert(mapped);
                }
                Err(reason) => {
                    warn!("Skipping {} ({}): {}", table.plant_id, table.table_id, reason);
                    store.summary.failures.push(TableFailure {
                        table_id: table.table_id.clone(),
                        plant_id: table.plant_id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Load {}: {} of {} tables loaded",
            store.summary.run_id,
            store.summary.succeeded_count(),
            store.summary.attempted
        );

        if store.plants.is_empty() {
            return Err(AnalyticsError::NoPlantsLoaded {
                summary: Box::new(store.summary),
            });
        }
        Ok(store)
    }

    fn insert(&mut self, mapped: MappedPlant) {
        let plant_id = mapped.series.plant_id().to_string();
        if self.plants.contains_key(&plant_id) {
            warn!("Plant {} appears in more than one table; keeping the later one", plant_id);
        } else {
            self.summary.succeeded.push(plant_id.clone());
        }
        self.plants.insert(
            plant_id,
            PlantEntry {
                series: mapped.series,
                report: mapped.report,
            },
        );
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.plants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    pub fn contains(&self, plant_id: &str) -> bool {
        self.plants.contains_key(plant_id)
    }

    /// Plant ids in ascending order
    pub fn list_plant_ids(&self) -> Vec<String> {
        self.plants.keys().cloned().collect()
    }

    pub fn get_series(&self, plant_id: &str) -> Option<&PlantTimeSeries> {
        self.plants.get(plant_id).map(|e| &e.series)
    }

    pub fn get_quality_report(&self, plant_id: &str) -> Option<&DataQualityReport> {
        self.plants.get(plant_id).map(|e| &e.report)
    }

    pub fn quality_reports(&self) -> impl Iterator<Item = &DataQualityReport> {
        self.plants.values().map(|e| &e.report)
    }

    pub fn series(&self) -> impl Iterator<Item = &PlantTimeSeries> {
        self.plants.values().map(|e| &e.series)
    }

    /// How many plants mapped each field
    pub fn column_availability(&self) -> BTreeMap<CanonicalField, usize> {
        let mut counts = BTreeMap::new();
        for field in CanonicalField::ALL {
            let n = self.series().filter(|s| s.has_field(field)).count();
            counts.insert(field, n);
        }
        counts
    }
}

/// Shared handle to the current store snapshot
pub struct PlantStoreHandle {
    current: ArcSwapOption<CanonicalPlantStore>,
    next_version: AtomicU64,
    mapper: SchemaMapper,
}

impl Default for PlantStoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PlantStoreHandle {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            next_version: AtomicU64::new(1),
            mapper: SchemaMapper::new(),
        }
    }

    /// Build a new store from `source` and publish it. On failure the
    /// previous snapshot stays current.
    pub fn load(&self, source: &dyn TableSource) -> Result<Arc<CanonicalPlantStore>> {
        let store = CanonicalPlantStore::build(source, &self.mapper)?;
        Ok(self.publish(store))
    }

    /// Swap in a prebuilt store, stamping it with the next version
    pub fn publish(&self, mut store: CanonicalPlantStore) -> Arc<CanonicalPlantStore> {
        store.version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let store = Arc::new(store);
        self.current.store(Some(store.clone()));
        info!("Published plant store v{} with {} plants", store.version, store.len());
        store
    }

    /// Current snapshot, if any store has been published
    pub fn snapshot(&self) -> Option<Arc<CanonicalPlantStore>> {
        self.current.load_full()
    }

    pub fn require_snapshot(&self) -> Result<Arc<CanonicalPlantStore>> {
        self.snapshot().ok_or(AnalyticsError::StoreNotInitialized)
    }
}
