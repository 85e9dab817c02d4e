//! Analytics Router
//!
//! Turns a classification and an entity set into exactly one handler call.
//! Routing walks `Unclassified -> Classified -> Resolved`; the resolved
//! handler always produces an `AnalyticsResult`. Query-time problems (empty
//! store, unknown plant, empty window, unclassifiable text) come back as
//! degraded results, never as errors.

pub mod handlers;
pub mod result;

use crate::aggregator::insights::{composite_score, underperforming_plants, PlantWindow, Technology};
use crate::aggregator::ranking::{rank_plants, ranked_ids};
use crate::aggregator::window::{select_window, tail, TimePeriodSpec};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::query::classifier::{Classification, Intent};
use crate::query::entities::EntitySet;
use crate::store::CanonicalPlantStore;
use chrono::NaiveDate;
use handlers::{HandlerContext, HandlerOutput};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use result::{AnalyticsResult, DegradedReason, Handler, Payload};

/// Routing progress for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    Unclassified,
    Classified(Intent),
    Resolved(Handler),
}

impl RouteState {
    pub fn classify(self, classification: &Classification) -> Self {
        match self {
            RouteState::Unclassified => RouteState::Classified(classification.intent),
            other => other,
        }
    }

    /// Two or more named plants, or any comparison marker, force the
    /// comparison handler whatever the classifier said. Unclassified text
    /// asking for help goes to the help handler.
    pub fn resolve(self, text: &str, entities: &EntitySet) -> Self {
        match self {
            RouteState::Classified(_) if entities.wants_comparison() => RouteState::Resolved(Handler::Comparison),
            RouteState::Classified(Intent::General) => {
                if text.to_lowercase().contains("help") {
                    RouteState::Resolved(Handler::Help)
                } else {
                    RouteState::Resolved(Handler::General)
                }
            }
            RouteState::Classified(intent) => RouteState::Resolved(Handler::for_intent(intent)),
            other => other,
        }
    }

    pub fn handler(&self) -> Option<Handler> {
        match self {
            RouteState::Resolved(handler) => Some(*handler),
            _ => None,
        }
    }
}

pub struct AnalyticsRouter {
    config: AppConfig,
}

impl AnalyticsRouter {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn route(
        &self,
        text: &str,
        classification: Classification,
        entities: EntitySet,
        store: &CanonicalPlantStore,
        clock: &dyn Clock,
    ) -> AnalyticsResult {
        let state = RouteState::Unclassified
            .classify(&classification)
            .resolve(text, &entities);
        let handler = state.handler().unwrap_or(Handler::General);
        info!(
            "Routing {:?} to {:?} (category {}, confidence {:.2})",
            text, handler, classification.intent, classification.confidence
        );

        let mut result = AnalyticsResult {
            query_id: Uuid::new_v4(),
            category: classification.intent,
            confidence: classification.confidence,
            scores: classification.scores,
            handler,
            entities,
            plants: Vec::new(),
            period: None,
            payload: None,
            issues: Vec::new(),
            recommendations: Vec::new(),
            degraded: false,
            reason: None,
            snapshot_version: store.version(),
        };

        match handler {
            Handler::Help => {
                let out = handlers::help(store);
                result.payload = Some(out.payload);
                return result;
            }
            Handler::General => {
                warn!("Query {:?} matched no category", text);
                result.degrade(DegradedReason::Unclassified);
                return result;
            }
            _ => {}
        }

        if store.is_empty() {
            warn!("No plants loaded; {:?} degraded", handler);
            result.degrade(DegradedReason::NoPlantsAvailable);
            return result;
        }

        if result.entities.plants.is_empty() && !result.entities.unresolved_plants.is_empty() {
            warn!("Unknown plant mentioned in {:?}", text);
            result.payload = Some(Payload::UnknownPlant {
                suggestions: result.entities.unresolved_plants.clone(),
                known_plants: store.list_plant_ids(),
            });
            result.recommendations = result
                .entities
                .unresolved_plants
                .iter()
                .map(|u| format!("Did you mean {}?", u.suggestion))
                .collect();
            result.degrade(DegradedReason::UnknownPlant);
            return result;
        }

        let today = clock.today();
        let requested = result.entities.primary_period();
        let period = requested.unwrap_or_else(|| self.default_period(handler));
        let plants = self.select_plants(handler, &result.entities, store, period, today);
        debug!("Selected plants {:?} over {}", plants, period);

        let ctx = HandlerContext {
            store,
            plants: &plants,
            period,
            today,
            entities: &result.entities,
            config: &self.config,
        };
        let output = self.dispatch(handler, &ctx);

        result.plants = plants;
        result.period = requested;
        result.payload = Some(output.payload);
        result.issues = output.issues;
        result.recommendations = output.recommendations;
        if !output.has_data {
            warn!("No rows for {:?} in window {}", result.plants, period);
            result.degrade(DegradedReason::NoDataInWindow);
        }
        result
    }

    fn dispatch(&self, handler: Handler, ctx: &HandlerContext<'_>) -> HandlerOutput {
        match handler {
            Handler::Status => handlers::status(ctx),
            Handler::Performance => handlers::performance(ctx),
            Handler::Energy => handlers::energy(ctx),
            Handler::Availability => handlers::availability(ctx),
            Handler::Financial => handlers::financial(ctx),
            Handler::Maintenance => handlers::maintenance(ctx),
            Handler::Comparison => handlers::comparison(ctx),
            Handler::Diagnostic => handlers::diagnostic(ctx),
            Handler::Forecast => handlers::forecast_handler(ctx),
            Handler::Weather => handlers::weather(ctx),
            Handler::Alert => handlers::alerts(ctx),
            Handler::Help | Handler::General => handlers::help(ctx.store),
        }
    }

    /// Window used when the query names no period
    pub fn default_period(&self, handler: Handler) -> TimePeriodSpec {
        let analytics = &self.config.analytics;
        match handler {
            Handler::Status | Handler::Alert => TimePeriodSpec::RealTime,
            Handler::Comparison => TimePeriodSpec::RollingWindow(analytics.comparison_window_rows),
            Handler::Diagnostic | Handler::Maintenance => TimePeriodSpec::RollingWindow(analytics.diagnosis_window_rows),
            Handler::Forecast => TimePeriodSpec::RollingWindow(analytics.forecast_window_rows),
            _ => TimePeriodSpec::RollingWindow(analytics.default_window_rows),
        }
    }

    /// Named plants when there are any. Otherwise portfolio handlers look at
    /// every plant, diagnosis and maintenance look at the plants that fail
    /// screening, and the rest at the first few in id order. Comparison with
    /// fewer than two named plants takes a solar/wind mix when the query names
    /// both technologies, and is otherwise topped up from the composite ranking.
    pub fn select_plants(
        &self,
        handler: Handler,
        entities: &EntitySet,
        store: &CanonicalPlantStore,
        period: TimePeriodSpec,
        today: NaiveDate,
    ) -> Vec<String> {
        let named: Vec<String> = entities
            .plants
            .iter()
            .filter(|id| store.contains(id))
            .cloned()
            .collect();

        if handler == Handler::Comparison && named.len() < 2 {
            if entities.technologies.len() > 1 {
                let mixed = self.technology_mix(named.clone(), store);
                if mixed.len() >= 2 {
                    return mixed;
                }
            }
            return self.fill_comparison(named, store, period, today);
        }
        if !named.is_empty() {
            return named;
        }

        let ids = store.list_plant_ids();
        if handler.is_portfolio_wide() {
            return ids;
        }
        if matches!(handler, Handler::Diagnostic | Handler::Maintenance) {
            let flagged = self.screen_underperformers(store);
            if !flagged.is_empty() {
                return flagged;
            }
        }
        ids.into_iter().take(self.config.analytics.default_plant_limit).collect()
    }

    fn screen_underperformers(&self, store: &CanonicalPlantStore) -> Vec<String> {
        let criteria = &self.config.screening;
        let windows: Vec<PlantWindow<'_>> = store
            .series()
            .map(|s| (s.plant_id(), tail(s.records(), criteria.window_rows)))
            .collect();
        let flagged = underperforming_plants(&windows, criteria);
        info!("Screening flagged {} of {} plants", flagged.len(), windows.len());
        flagged.into_iter().map(|u| u.plant_id).collect()
    }

    /// Up to `mixed_comparison_per_technology` plants of each technology, in
    /// id order, counting plants already named
    fn technology_mix(&self, mut selected: Vec<String>, store: &CanonicalPlantStore) -> Vec<String> {
        let per_technology = self.config.analytics.mixed_comparison_per_technology;
        for technology in [Technology::Solar, Technology::Wind] {
            let have = selected
                .iter()
                .filter(|id| Technology::from_plant_id(id) == technology)
                .count();
            let picks: Vec<String> = store
                .list_plant_ids()
                .into_iter()
                .filter(|id| Technology::from_plant_id(id) == technology && !selected.contains(id))
                .take(per_technology.saturating_sub(have))
                .collect();
            selected.extend(picks);
        }
        selected
    }

    fn fill_comparison(
        &self,
        mut selected: Vec<String>,
        store: &CanonicalPlantStore,
        period: TimePeriodSpec,
        today: NaiveDate,
    ) -> Vec<String> {
        let target = self.config.analytics.comparison_top_n.max(2);
        let candidates: Vec<(String, f64)> = store
            .series()
            .filter(|s| !selected.iter().any(|id| id == s.plant_id()))
            .filter_map(|s| composite_score(select_window(s, period, today)).map(|score| (s.plant_id().to_string(), score)))
            .collect();

        for id in ranked_ids(&rank_plants(candidates)) {
            if selected.len() >= target {
                break;
            }
            selected.push(id);
        }

        // Plants without availability or PR only fill what is left
        for id in store.list_plant_ids() {
            if selected.len() >= target {
                break;
            }
            if !selected.contains(&id) {
                selected.push(id);
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ingestion::schema_mapper::SchemaMapper;
    use crate::query::classifier::QueryClassifier;
    use crate::query::entities::{EntityExtractor, PlantAliasIndex};
    use polars::prelude::*;

    fn clock() -> FixedClock {
        FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    fn plant(id: &str, pa: f64, pr: f64) -> crate::ingestion::schema_mapper::MappedPlant {
        let df = df!(
            "date" => &["2024-06-01", "2024-06-02"],
            "Export" => &[1000.0, 1100.0],
            "PA(%)" => &[pa, pa],
            "PR(%)" => &[pr, pr]
        )
        .unwrap();
        SchemaMapper::new().map_frame(id, &df).unwrap()
    }

    fn ask(store: &CanonicalPlantStore, text: &str) -> AnalyticsResult {
        let config = AppConfig::default();
        let index = PlantAliasIndex::build(&store.list_plant_ids(), &config.aliases);
        let classification = QueryClassifier::new().classify(text);
        let entities = EntityExtractor::new().extract(text, &index, &clock());
        AnalyticsRouter::new(config).route(text, classification, entities, store, &clock())
    }

    #[test]
    fn test_route_states() {
        let classification = QueryClassifier::new().classify("status");
        let state = RouteState::Unclassified.classify(&classification);
        assert_eq!(state, RouteState::Classified(Intent::Status));
        assert_eq!(state.handler(), None);

        let resolved = state.resolve("status", &EntitySet::default());
        assert_eq!(resolved.handler(), Some(Handler::Status));
    }

    #[test]
    fn test_comparator_forces_comparison() {
        let mut entities = EntitySet::default();
        entities.comparators.insert("versus".to_string());
        let state = RouteState::Classified(Intent::Energy).resolve("energy a versus b", &entities);
        assert_eq!(state.handler(), Some(Handler::Comparison));
    }

    #[test]
    fn test_empty_store_degrades() {
        let result = ask(&CanonicalPlantStore::empty(), "status");
        assert!(result.degraded);
        assert_eq!(result.reason, Some(DegradedReason::NoPlantsAvailable));
        assert_eq!(result.handler, Handler::Status);
    }

    #[test]
    fn test_unclassified_and_help() {
        let store = CanonicalPlantStore::from_mapped(vec![plant("PlantA", 96.0, 80.0)]);
        let result = ask(&store, "xyzzy");
        assert_eq!(result.reason, Some(DegradedReason::Unclassified));

        let result = ask(&store, "help");
        assert_eq!(result.handler, Handler::Help);
        assert!(!result.degraded);
    }

    #[test]
    fn test_comparison_fallback_fills_from_ranking() {
        let store = CanonicalPlantStore::from_mapped(vec![
            plant("PlantA", 90.0, 70.0),
            plant("PlantB", 99.0, 85.0),
            plant("PlantC", 95.0, 80.0),
        ]);
        let result = ask(&store, "compare PlantA with the others");
        assert_eq!(result.handler, Handler::Comparison);
        assert_eq!(result.plants, vec!["PlantA".to_string(), "PlantB".to_string()]);

        let result = ask(&store, "compare plants");
        assert_eq!(result.plants, vec!["PlantB".to_string(), "PlantC".to_string()]);
    }

    #[test]
    fn test_solar_and_wind_comparison_takes_both_technologies() {
        let store = CanonicalPlantStore::from_mapped(vec![
            plant("SolarA", 96.0, 80.0),
            plant("SolarB", 97.0, 81.0),
            plant("SolarC", 98.0, 82.0),
            plant("SolarD", 99.0, 83.0),
            plant("WindA", 95.0, 79.0),
            plant("WindB", 94.0, 78.0),
        ]);
        let result = ask(&store, "compare solar and wind plants");
        assert_eq!(result.handler, Handler::Comparison);
        assert_eq!(
            result.plants,
            vec!["SolarA", "SolarB", "SolarC", "WindA", "WindB"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        // one technology only falls back to the ranking
        let result = ask(&store, "compare solar plants");
        assert_eq!(result.plants, vec!["SolarD".to_string(), "SolarC".to_string()]);
    }

    #[test]
    fn test_diagnosis_without_plants_screens_underperformers() {
        let store = CanonicalPlantStore::from_mapped(vec![
            plant("PlantA", 96.0, 85.0),
            plant("PlantB", 85.0, 70.0),
            plant("PlantC", 99.0, 85.0),
        ]);
        let result = ask(&store, "why is performance low");
        assert_eq!(result.handler, Handler::Diagnostic);
        assert_eq!(result.plants, vec!["PlantB".to_string()]);

        let healthy = CanonicalPlantStore::from_mapped(vec![plant("PlantA", 96.0, 85.0), plant("PlantC", 99.0, 85.0)]);
        let result = ask(&healthy, "why is performance low");
        assert_eq!(result.plants, vec!["PlantA".to_string(), "PlantC".to_string()]);
    }

    #[test]
    fn test_unknown_plant_degrades_with_suggestion() {
        let store = CanonicalPlantStore::from_mapped(vec![plant("PlantA", 96.0, 80.0)]);
        let result = ask(&store, "status of PlantZ");
        assert_eq!(result.reason, Some(DegradedReason::UnknownPlant));
        assert_eq!(result.recommendations, vec!["Did you mean PlantA?".to_string()]);
    }

    #[test]
    fn test_no_data_in_window() {
        let store = CanonicalPlantStore::from_mapped(vec![plant("PlantA", 96.0, 80.0)]);
        let result = ask(&store, "energy generation today");
        assert_eq!(result.handler, Handler::Energy);
        assert_eq!(result.period, Some(TimePeriodSpec::Today));
        assert_eq!(result.reason, Some(DegradedReason::NoDataInWindow));
    }
}
