//! Entity Extractor - plants, metrics and time periods in free text
//!
//! Plants and metrics resolve through alias tables. Aliases of three
//! characters or fewer (`pr`, `jp`, `now`) must match a whole word; longer
//! ones match anywhere in the lowercased text. Relative periods resolve
//! against an injected clock; date candidates that do not form a real
//! calendar date are dropped.

use crate::aggregator::insights::Technology;
use crate::aggregator::window::TimePeriodSpec;
use crate::clock::Clock;
use crate::config::AliasConfig;
use crate::ingestion::catalog::CanonicalField;
use crate::query::classifier::compile_all;
use crate::query::fuzzy_matcher::FuzzyMatcher;
use chrono::{Datelike, Days, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

const METRIC_ALIASES: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::EnergyExport,
        &[
            "energy export", "energy", "generation", "kwh", "units", "electricity",
            "power generation", "output", "production", "export", "generated energy",
            "electrical energy",
        ],
    ),
    (
        CanonicalField::AvailabilityPct,
        &[
            "availability", "uptime", "plant availability", "pa", "operational time",
            "running time", "online time", "availability factor", "operational availability",
        ],
    ),
    (
        CanonicalField::PerformanceRatioPct,
        &[
            "performance ratio", "pr", "performance", "efficiency", "performance factor",
            "plant performance", "pr ratio", "performance index", "efficiency ratio",
        ],
    ),
    (
        CanonicalField::CapacityUtilizationPct,
        &[
            "capacity utilization", "cuf", "capacity factor", "plf", "plant load factor",
            "utilization factor", "capacity usage",
        ],
    ),
    (
        CanonicalField::IrradianceGhi,
        &[
            "ghi", "global horizontal irradiance", "solar irradiance", "irradiation",
            "solar resource", "sunlight", "radiation",
        ],
    ),
    (CanonicalField::IrradiancePoa, &["poa", "plane of array"]),
    (
        CanonicalField::AmbientTemp,
        &["temperature", "temp", "ambient temperature", "operating temperature"],
    ),
    (
        CanonicalField::ModuleTemp,
        &["module temperature", "cell temperature"],
    ),
    (
        CanonicalField::WindSpeedAvg,
        &["wind speed", "wind", "wind velocity", "ws", "wind resource", "wind data"],
    ),
];

/// Named relative periods: (period, keywords, patterns)
const PERIOD_VOCABULARY: &[(TimePeriodSpec, &[&str], &[&str])] = &[
    (
        TimePeriodSpec::RealTime,
        &["now", "current", "live", "real-time", "present", "instant"],
        &[r"right now", r"at present", r"currently", r"real.?time"],
    ),
    (
        TimePeriodSpec::Today,
        &["today", "today's", "this morning", "this afternoon", "this evening"],
        &[r"today.*performance", r"\bthis day\b", r"today.*generation"],
    ),
    (
        TimePeriodSpec::Yesterday,
        &["yesterday", "yesterday's", "last night", "previous day"],
        &[r"yesterday.*data", r"\bprevious day\b", r"\blast day\b"],
    ),
    (
        TimePeriodSpec::ThisWeek,
        &["this week", "current week", "weekly", "week to date"],
        &[r"this.*week", r"current.*week", r"weekly.*summary"],
    ),
    (
        TimePeriodSpec::LastWeek,
        &["last week", "previous week", "past week"],
        &[r"last.*week", r"previous.*week", r"past.*week"],
    ),
    (
        TimePeriodSpec::ThisMonth,
        &["this month", "current month", "monthly", "month to date", "mtd"],
        &[r"this.*month", r"current.*month", r"monthly.*report"],
    ),
    (
        TimePeriodSpec::LastMonth,
        &["last month", "previous month", "past month"],
        &[r"last.*month", r"previous.*month", r"past.*month"],
    ),
];

const COMPARATORS: &[&str] = &["vs", "versus", "against", "compared to", "better than", "worse than"];

const ACTIONS: &[&str] = &[
    "show", "display", "give", "provide", "analyze", "compare", "calculate", "forecast",
];

/// Words that often sit next to a plant name without being one
const GENERIC_WORDS: &[&str] = &[
    "plant", "plants", "solar", "wind", "farm", "site", "sites", "portfolio", "please",
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

lazy_static! {
    static ref PERIOD_PATTERNS: Vec<(TimePeriodSpec, Vec<Regex>)> = PERIOD_VOCABULARY
        .iter()
        .map(|(period, _, patterns)| (*period, compile_all(patterns)))
        .collect();

    static ref CAPACITY: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*mw").unwrap();
    static ref ROLLING: Regex = Regex::new(r"\b(?:last|past|previous)\s+(\d+)\s+days?\b").unwrap();
    static ref DAYS_AGO: Regex = Regex::new(r"\b(\d+)\s+days?\s+ago\b").unwrap();
    static ref NUMBER: Regex = Regex::new(r"\b\d+(?:\.\d+)?(?:\s*(?:%|kwh\b|mwh\b|mw\b))?").unwrap();
    static ref TOKEN: Regex = Regex::new(r"[A-Za-z0-9][A-Za-z0-9_\-]*").unwrap();

    static ref YMD: Regex = Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b").unwrap();
    static ref DMY: Regex = Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").unwrap();
    static ref DAY_MONTH: Regex = Regex::new(
        r"\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?(?:,?\s+(\d{4}))?",
    )
    .unwrap();
    static ref MONTH_DAY: Regex = Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})(?:,?\s+(\d{4}))?\b",
    )
    .unwrap();
}

/// Everything recognized in one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    pub plants: BTreeSet<String>,
    pub metrics: BTreeSet<CanonicalField>,
    pub time_periods: BTreeSet<TimePeriodSpec>,
    /// Numeric literals, with their unit when one was given
    pub values: Vec<String>,
    pub comparators: BTreeSet<String>,
    pub actions: BTreeSet<String>,
    /// Technologies named in the text ("solar", "wind")
    pub technologies: BTreeSet<Technology>,
    /// Words that look like a misspelled plant name, with the closest known id
    pub unresolved_plants: Vec<UnresolvedPlant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedPlant {
    pub mention: String,
    pub suggestion: String,
    pub similarity: f64,
}

impl EntitySet {
    /// The most specific requested period: explicit dates, then rolling
    /// windows, then named periods, with real-time last
    pub fn primary_period(&self) -> Option<TimePeriodSpec> {
        self.time_periods.iter().copied().min_by_key(period_rank)
    }

    /// Two or more plants or any comparison marker
    pub fn wants_comparison(&self) -> bool {
        self.plants.len() >= 2 || !self.comparators.is_empty()
    }
}

fn period_rank(period: &TimePeriodSpec) -> (u8, TimePeriodSpec) {
    let rank = match period {
        TimePeriodSpec::SpecificDate(_) => 0,
        TimePeriodSpec::RollingWindow(_) => 1,
        TimePeriodSpec::Today => 2,
        TimePeriodSpec::Yesterday => 3,
        TimePeriodSpec::ThisWeek => 4,
        TimePeriodSpec::LastWeek => 5,
        TimePeriodSpec::ThisMonth => 6,
        TimePeriodSpec::LastMonth => 7,
        TimePeriodSpec::RealTime => 8,
    };
    (rank, *period)
}

/// Alias table for the plants of one store snapshot
#[derive(Debug, Clone, Default)]
pub struct PlantAliasIndex {
    ids: Vec<String>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl PlantAliasIndex {
    pub fn build(plant_ids: &[String], config: &AliasConfig) -> Self {
        let mut aliases = BTreeMap::new();
        for id in plant_ids {
            let mut set = BTreeSet::new();
            let lower = id.to_lowercase();
            set.insert(lower.clone());
            set.insert(lower.replace(['_', '-'], " "));

            if let Some(caps) = CAPACITY.captures(&lower) {
                let capacity = &caps[1];
                set.insert(format!("{}mw", capacity));
                set.insert(format!("{} mw", capacity));
            }

            for (token, codes) in &config.short_codes {
                if id.contains(token.as_str()) {
                    set.extend(codes.iter().map(|c| c.to_lowercase()));
                }
            }

            set.retain(|a| !a.trim().is_empty());
            aliases.insert(id.clone(), set);
        }

        Self {
            ids: plant_ids.to_vec(),
            aliases,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn aliases(&self, plant_id: &str) -> Option<&BTreeSet<String>> {
        self.aliases.get(plant_id)
    }

    fn mentions_substring(&self, word: &str) -> bool {
        self.aliases
            .values()
            .flatten()
            .any(|alias| alias.contains(word))
    }
}

pub struct EntityExtractor {
    matcher: FuzzyMatcher,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            matcher: FuzzyMatcher::default(),
        }
    }

    pub fn extract(&self, text: &str, plants: &PlantAliasIndex, clock: &dyn Clock) -> EntitySet {
        let lower = text.to_lowercase();
        let words = tokens(&lower);

        let mut entities = EntitySet {
            plants: self.extract_plants(&lower, &words, plants),
            metrics: extract_metrics(&lower, &words),
            time_periods: extract_periods(&lower, &words, clock.today()),
            values: extract_values(&lower),
            comparators: matching(COMPARATORS, &lower, &words),
            actions: matching(ACTIONS, &lower, &words),
            technologies: extract_technologies(&lower),
            unresolved_plants: Vec::new(),
        };

        if entities.plants.is_empty() {
            entities.unresolved_plants = self.unresolved_plants(&words, plants);
        }
        entities
    }

    fn extract_plants(&self, lower: &str, words: &HashSet<String>, index: &PlantAliasIndex) -> BTreeSet<String> {
        index
            .aliases
            .iter()
            .filter(|(_, aliases)| aliases.iter().any(|a| alias_matches(a, lower, words)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Words that are close to, but not part of, a known plant name
    fn unresolved_plants(&self, words: &HashSet<String>, index: &PlantAliasIndex) -> Vec<UnresolvedPlant> {
        let mut out: Vec<UnresolvedPlant> = words
            .iter()
            .filter(|w| w.chars().count() >= 4)
            .filter(|w| !GENERIC_WORDS.contains(&w.as_str()))
            .filter(|w| !index.mentions_substring(w))
            .filter_map(|w| {
                let (id, similarity) = self.matcher.best_match(w, index.ids())?;
                Some(UnresolvedPlant {
                    mention: w.clone(),
                    suggestion: id.to_string(),
                    similarity,
                })
            })
            .collect();
        out.sort_by(|a, b| a.mention.cmp(&b.mention));
        out
    }
}

fn tokens(lower: &str) -> HashSet<String> {
    TOKEN.find_iter(lower).map(|m| m.as_str().to_string()).collect()
}

fn alias_matches(alias: &str, lower: &str, words: &HashSet<String>) -> bool {
    if alias.chars().count() <= 3 {
        words.contains(alias)
    } else {
        lower.contains(alias)
    }
}

fn matching(vocabulary: &[&str], lower: &str, words: &HashSet<String>) -> BTreeSet<String> {
    vocabulary
        .iter()
        .filter(|v| alias_matches(v, lower, words))
        .map(|v| v.to_string())
        .collect()
}

fn extract_metrics(lower: &str, words: &HashSet<String>) -> BTreeSet<CanonicalField> {
    METRIC_ALIASES
        .iter()
        .filter(|(_, aliases)| aliases.iter().any(|a| alias_matches(a, lower, words)))
        .map(|(field, _)| *field)
        .collect()
}

fn extract_technologies(lower: &str) -> BTreeSet<Technology> {
    [("solar", Technology::Solar), ("wind", Technology::Wind)]
        .into_iter()
        .filter(|(word, _)| lower.contains(word))
        .map(|(_, technology)| technology)
        .collect()
}

fn extract_values(lower: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    NUMBER
        .find_iter(lower)
        .map(|m| m.as_str().split_whitespace().collect::<String>())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

fn extract_periods(lower: &str, words: &HashSet<String>, today: NaiveDate) -> BTreeSet<TimePeriodSpec> {
    let mut periods = BTreeSet::new();

    for (period, keywords, _) in PERIOD_VOCABULARY {
        if keywords.iter().any(|k| alias_matches(k, lower, words)) {
            periods.insert(*period);
        }
    }
    for (period, patterns) in PERIOD_PATTERNS.iter() {
        if patterns.iter().any(|p| p.is_match(lower)) {
            periods.insert(*period);
        }
    }

    for caps in ROLLING.captures_iter(lower) {
        if let Some(n) = caps[1].parse::<usize>().ok().filter(|n| *n > 0) {
            periods.insert(TimePeriodSpec::RollingWindow(n));
        }
    }
    for caps in DAYS_AGO.captures_iter(lower) {
        if let Some(date) = caps[1]
            .parse::<u64>()
            .ok()
            .and_then(|n| today.checked_sub_days(Days::new(n)))
        {
            periods.insert(TimePeriodSpec::SpecificDate(date));
        }
    }

    for date in extract_dates(lower, today) {
        periods.insert(TimePeriodSpec::SpecificDate(date));
    }
    periods
}

/// Absolute dates in the text; a missing year defaults to the clock's year
pub fn extract_dates(lower: &str, today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    for caps in YMD.captures_iter(lower) {
        if let (Some(y), Some(m), Some(d)) = (num(&caps, 1), num(&caps, 2), num(&caps, 3)) {
            dates.extend(NaiveDate::from_ymd_opt(y as i32, m, d));
        }
    }
    for caps in DMY.captures_iter(lower) {
        if let (Some(d), Some(m), Some(y)) = (num(&caps, 1), num(&caps, 2), num(&caps, 3)) {
            let year = if y < 100 { 2000 + y } else { y };
            dates.extend(NaiveDate::from_ymd_opt(year as i32, m, d));
        }
    }
    for caps in DAY_MONTH.captures_iter(lower) {
        let month = caps.get(2).and_then(|m| month_number(m.as_str()));
        let year = num(&caps, 3).map(|y| y as i32).unwrap_or(today.year());
        if let (Some(d), Some(m)) = (num(&caps, 1), month) {
            dates.extend(NaiveDate::from_ymd_opt(year, m, d));
        }
    }
    for caps in MONTH_DAY.captures_iter(lower) {
        let month = caps.get(1).and_then(|m| month_number(m.as_str()));
        let year = num(&caps, 3).map(|y| y as i32).unwrap_or(today.year());
        if let (Some(m), Some(d)) = (month, num(&caps, 2)) {
            dates.extend(NaiveDate::from_ymd_opt(year, m, d));
        }
    }

    dates.sort();
    dates.dedup();
    dates
}

fn num(caps: &regex::Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok())
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn clock() -> FixedClock {
        FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    fn index(ids: &[&str]) -> PlantAliasIndex {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        PlantAliasIndex::build(&ids, &AliasConfig::default())
    }

    #[test]
    fn test_compare_two_plants() {
        let e = EntityExtractor::new().extract("compare PlantA vs PlantB", &index(&["PlantA", "PlantB"]), &clock());
        assert_eq!(e.plants, BTreeSet::from(["PlantA".to_string(), "PlantB".to_string()]));
        assert!(e.comparators.contains("vs"));
        assert!(e.actions.contains("compare"));
        assert!(e.wants_comparison());
    }

    #[test]
    fn test_plant_aliases() {
        let idx = index(&["NTPC_Solar_50MW", "JPPL-Wind"]);
        let aliases = idx.aliases("NTPC_Solar_50MW").unwrap();
        assert!(aliases.contains("ntpc solar 50mw"));
        assert!(aliases.contains("50 mw"));
        assert!(aliases.contains("ntpc"));

        let e = EntityExtractor::new().extract("how is jp doing", &idx, &clock());
        assert_eq!(e.plants, BTreeSet::from(["JPPL-Wind".to_string()]));

        // "jp" inside another word does not count
        let e = EntityExtractor::new().extract("jpeg export", &idx, &clock());
        assert!(e.plants.is_empty());
    }

    #[test]
    fn test_metrics_short_aliases_need_whole_words() {
        let idx = index(&[]);
        let e = EntityExtractor::new().extract("show PR and availability", &idx, &clock());
        assert!(e.metrics.contains(&CanonicalField::PerformanceRatioPct));
        assert!(e.metrics.contains(&CanonicalField::AvailabilityPct));

        let e = EntityExtractor::new().extract("compare", &idx, &clock());
        assert!(!e.metrics.contains(&CanonicalField::PerformanceRatioPct));
        assert!(!e.metrics.contains(&CanonicalField::AvailabilityPct));
    }

    #[test]
    fn test_relative_periods() {
        let idx = index(&[]);
        let e = EntityExtractor::new().extract("energy for the last 7 days", &idx, &clock());
        assert!(e.time_periods.contains(&TimePeriodSpec::RollingWindow(7)));
        assert_eq!(e.primary_period(), Some(TimePeriodSpec::RollingWindow(7)));

        let e = EntityExtractor::new().extract("output 3 days ago", &idx, &clock());
        assert_eq!(
            e.primary_period(),
            Some(TimePeriodSpec::SpecificDate(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()))
        );

        let e = EntityExtractor::new().extract("yesterday's generation", &idx, &clock());
        assert_eq!(e.primary_period(), Some(TimePeriodSpec::Yesterday));
    }

    #[test]
    fn test_day_words_inside_longer_periods() {
        let idx = index(&["PlantA"]);
        let extractor = EntityExtractor::new();

        let e = extractor.extract("energy this month by day for PlantA", &idx, &clock());
        assert_eq!(e.time_periods, BTreeSet::from([TimePeriodSpec::ThisMonth]));
        assert_eq!(e.primary_period(), Some(TimePeriodSpec::ThisMonth));

        let e = extractor.extract("plantA weekly summary of last days", &idx, &clock());
        assert_eq!(e.time_periods, BTreeSet::from([TimePeriodSpec::ThisWeek]));
        assert_eq!(e.primary_period(), Some(TimePeriodSpec::ThisWeek));

        let e = extractor.extract("output for this day", &idx, &clock());
        assert_eq!(e.primary_period(), Some(TimePeriodSpec::Today));

        let e = extractor.extract("what happened on the last day", &idx, &clock());
        assert_eq!(e.primary_period(), Some(TimePeriodSpec::Yesterday));
    }

    #[test]
    fn test_every_period_pattern_compiles() {
        for ((period, _, patterns), (compiled_period, compiled)) in PERIOD_VOCABULARY.iter().zip(PERIOD_PATTERNS.iter()) {
            assert_eq!(period, compiled_period);
            assert_eq!(patterns.len(), compiled.len());
        }
        assert_eq!(PERIOD_PATTERNS.len(), PERIOD_VOCABULARY.len());
    }

    #[test]
    fn test_absolute_dates_and_invalid_dropped() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let dates = extract_dates("on 2024-06-01 and 02/06/2024 and 5 jun and march 3, 2023", today);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2023, 3, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            ]
        );
        assert!(extract_dates("2024-13-45 and 31/02/2024", today).is_empty());
    }

    #[test]
    fn test_technologies_mentioned() {
        let e = EntityExtractor::new().extract("compare solar and wind plants", &index(&[]), &clock());
        assert_eq!(e.technologies, BTreeSet::from([Technology::Solar, Technology::Wind]));

        let e = EntityExtractor::new().extract("compare plants", &index(&[]), &clock());
        assert!(e.technologies.is_empty());
    }

    #[test]
    fn test_values_keep_units() {
        let e = EntityExtractor::new().extract("plants below 85 % or over 1200 kwh", &index(&[]), &clock());
        assert_eq!(e.values, vec!["85%".to_string(), "1200kwh".to_string()]);
    }

    #[test]
    fn test_unresolved_plant_suggestion() {
        let e = EntityExtractor::new().extract("status of PlantZ", &index(&["PlantA", "PlantB"]), &clock());
        assert!(e.plants.is_empty());
        assert_eq!(e.unresolved_plants.len(), 1);
        assert_eq!(e.unresolved_plants[0].mention, "plantz");
        assert_eq!(e.unresolved_plants[0].suggestion, "PlantA");
    }
}
