//! Data Assistant - question answering over the current plant snapshot
//!
//! Ties the pieces together: the store handle owns the snapshot, the
//! classifier and extractor read the query, and the router picks and runs a
//! handler. Every `ask` works against a single snapshot, so a concurrent
//! reload never changes the data underneath a query.

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::Result;
use crate::ingestion::connector::TableSource;
use crate::ingestion::quality::DataQualityReport;
use crate::query::classifier::QueryClassifier;
use crate::query::entities::{EntityExtractor, PlantAliasIndex};
use crate::router::{AnalyticsResult, AnalyticsRouter};
use crate::store::{CanonicalPlantStore, LoadSummary, PlantStoreHandle};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::{debug, info};

/// Alias index built for one store version
struct AliasSnapshot {
    version: u64,
    index: Arc<PlantAliasIndex>,
}

pub struct DataAssistant {
    config: AppConfig,
    store: PlantStoreHandle,
    clock: Arc<dyn Clock>,
    classifier: QueryClassifier,
    extractor: EntityExtractor,
    router: AnalyticsRouter,
    aliases: ArcSwapOption<AliasSnapshot>,
}

impl DataAssistant {
    pub fn new(config: AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            router: AnalyticsRouter::new(config.clone()),
            config,
            store: PlantStoreHandle::new(),
            clock,
            classifier: QueryClassifier::new(),
            extractor: EntityExtractor::new(),
            aliases: ArcSwapOption::empty(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &PlantStoreHandle {
        &self.store
    }

    /// Map every table from `source` and publish the result
    pub fn load(&self, source: &dyn TableSource) -> Result<Arc<CanonicalPlantStore>> {
        let store = self.store.load(source)?;
        let summary = store.summary();
        info!(
            "Loaded {} of {} plant tables from {} (run {})",
            summary.succeeded_count(),
            summary.attempted,
            summary.source_type,
            summary.run_id
        );
        Ok(store)
    }

    pub fn publish(&self, store: CanonicalPlantStore) -> Arc<CanonicalPlantStore> {
        self.store.publish(store)
    }

    /// Answer one free-text question against the current snapshot. Fails only
    /// when no snapshot has been published yet.
    pub fn ask(&self, text: &str) -> Result<AnalyticsResult> {
        let store = self.store.require_snapshot()?;
        let index = self.alias_index(&store);

        let classification = self.classifier.classify(text);
        let entities = self.extractor.extract(text, &index, self.clock.as_ref());
        debug!("Entities for {:?}: {:?}", text, entities);

        Ok(self
            .router
            .route(text, classification, entities, &store, self.clock.as_ref()))
    }

    pub fn plant_ids(&self) -> Result<Vec<String>> {
        Ok(self.store.require_snapshot()?.list_plant_ids())
    }

    pub fn quality_reports(&self) -> Result<Vec<DataQualityReport>> {
        let store = self.store.require_snapshot()?;
        Ok(store.quality_reports().cloned().collect())
    }

    pub fn load_summary(&self) -> Result<LoadSummary> {
        Ok(self.store.require_snapshot()?.summary().clone())
    }

    fn alias_index(&self, store: &CanonicalPlantStore) -> Arc<PlantAliasIndex> {
        if let Some(cached) = self.aliases.load_full() {
            if cached.version == store.version() {
                return cached.index.clone();
            }
        }
        let index = Arc::new(PlantAliasIndex::build(&store.list_plant_ids(), &self.config.aliases));
        self.aliases.store(Some(Arc::new(AliasSnapshot {
            version: store.version(),
            index: index.clone(),
        })));
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::AnalyticsError;
    use crate::ingestion::connector::InMemorySource;
    use crate::router::{DegradedReason, Handler};
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn assistant() -> DataAssistant {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        DataAssistant::with_clock(AppConfig::default(), Arc::new(clock))
    }

    #[test]
    fn test_ask_before_load_is_an_error() {
        let err = assistant().ask("status").unwrap_err();
        assert!(matches!(err, AnalyticsError::StoreNotInitialized));
    }

    #[test]
    fn test_ask_after_load() {
        let assistant = assistant();
        let df = df!(
            "date" => &["2024-06-14", "2024-06-15"],
            "PA(%)" => &[0.96, 0.98],
            "Mtr_Export (kWh)" => &[1000.0, 1100.0]
        )
        .unwrap();
        let source = InMemorySource::new().with_table("NTPC_Solar", df);
        assistant.load(&source).unwrap();

        let result = assistant.ask("what is the status of ntpc today").unwrap();
        assert_eq!(result.handler, Handler::Status);
        assert_eq!(result.plants, vec!["NTPC_Solar".to_string()]);
        assert!(!result.degraded);
        assert_eq!(result.snapshot_version, 1);

        assistant.publish(CanonicalPlantStore::empty());
        let result = assistant.ask("status").unwrap();
        assert_eq!(result.reason, Some(DegradedReason::NoPlantsAvailable));
        assert_eq!(result.snapshot_version, 2);
    }
}
