//! Query Classifier - scored intent detection
//!
//! Each category scores `2·keywords + 3·patterns + 1.5·sub-category keywords`,
//! plus 2 when the text contains one of the category's technical terms as a
//! whole word. Keywords match as substrings of the lowercased text. The
//! highest score wins; ties go to the category listed first.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Status,
    Performance,
    Energy,
    Availability,
    Financial,
    Maintenance,
    Comparison,
    Diagnostic,
    Forecasting,
    Weather,
    Alert,
    /// Nothing scored
    General,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Status => "status",
            Intent::Performance => "performance",
            Intent::Energy => "energy",
            Intent::Availability => "availability",
            Intent::Financial => "financial",
            Intent::Maintenance => "maintenance",
            Intent::Comparison => "comparison",
            Intent::Diagnostic => "diagnostic",
            Intent::Forecasting => "forecasting",
            Intent::Weather => "weather",
            Intent::Alert => "alert",
            Intent::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct QueryCategory {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
    pub patterns: Vec<Regex>,
    pub subcategories: &'static [(&'static str, &'static [&'static str])],
    /// Whole-word terms that earn the pre-scan bonus
    pub technical_terms: &'static [&'static str],
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
];

pub(crate) fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\b\w+\b").unwrap();

    static ref CATALOG: Vec<QueryCategory> = vec![
        QueryCategory {
            intent: Intent::Status,
            keywords: &["status", "current", "now", "today", "live", "real-time", "present", "active"],
            patterns: compile_all(&[
                r"what.*status", r"how.*doing", r"current.*state", r"right now",
                r"today.*performance", r"live.*data", r"real.?time",
            ]),
            subcategories: &[
                ("plant_status", &["plant", "facility", "site", "unit"]),
                ("system_status", &["system", "grid", "network", "connection"]),
                ("equipment_status", &["inverter", "transformer", "module", "panel"]),
            ],
            technical_terms: &["status", "condition", "state", "online", "offline"],
        },
        QueryCategory {
            intent: Intent::Performance,
            keywords: &["performance", "efficiency", "pr", "ratio", "output", "generation", "capacity"],
            patterns: compile_all(&[
                r"performance.*ratio", r"how.*performing", r"efficiency.*analysis",
                r"pr.*trend", r"capacity.*factor", r"generation.*efficiency",
            ]),
            subcategories: &[
                ("overall_performance", &["overall", "total", "portfolio", "combined"]),
                ("comparative_performance", &["compare", "vs", "versus", "against", "better", "worse"]),
                ("trending_performance", &["trend", "trending", "over time", "historical"]),
            ],
            technical_terms: &["pr", "performance", "efficiency", "ratio", "factor"],
        },
        QueryCategory {
            intent: Intent::Energy,
            keywords: &["energy", "generation", "export", "kwh", "mwh", "units", "production"],
            patterns: compile_all(&[
                r"energy.*export", r"generation.*today", r"kwh.*produced",
                r"total.*energy", r"daily.*generation", r"monthly.*production",
            ]),
            subcategories: &[
                ("daily_energy", &["daily", "today", "yesterday", "day"]),
                ("periodic_energy", &["weekly", "monthly", "quarterly", "yearly"]),
                ("cumulative_energy", &["total", "cumulative", "sum", "overall"]),
            ],
            technical_terms: &["kwh", "mwh", "energy", "generation", "export", "import"],
        },
        QueryCategory {
            intent: Intent::Availability,
            keywords: &["availability", "uptime", "downtime", "operational", "running", "online", "offline"],
            patterns: compile_all(&[
                r"plant.*availability", r"uptime.*analysis", r"downtime.*report",
                r"operational.*hours", r"running.*time", r"availability.*factor",
            ]),
            subcategories: &[
                ("current_availability", &["current", "now", "present", "today"]),
                ("historical_availability", &["historical", "past", "previous", "last"]),
                ("availability_trends", &["trend", "pattern", "over time", "changing"]),
            ],
            technical_terms: &["availability", "uptime", "downtime", "operational"],
        },
        QueryCategory {
            intent: Intent::Financial,
            keywords: &["revenue", "cost", "financial", "money", "profit", "roi", "tariff", "price"],
            patterns: compile_all(&[
                r"revenue.*analysis", r"financial.*performance", r"cost.*analysis",
                r"roi.*calculation", r"tariff.*rate", r"money.*made",
            ]),
            subcategories: &[
                ("revenue_analysis", &["revenue", "income", "earnings", "sales"]),
                ("cost_analysis", &["cost", "expense", "expenditure", "opex"]),
                ("profitability", &["profit", "roi", "return", "margin"]),
            ],
            technical_terms: &["revenue", "cost", "roi", "profit", "tariff"],
        },
        QueryCategory {
            intent: Intent::Maintenance,
            keywords: &["maintenance", "repair", "service", "outage", "shutdown", "fault"],
            patterns: compile_all(&[
                r"maintenance.*schedule", r"repair.*needed", r"service.*due",
                r"outage.*report", r"fault.*analysis", r"breakdown.*summary",
            ]),
            subcategories: &[
                ("preventive_maintenance", &["preventive", "scheduled", "routine", "regular"]),
                ("corrective_maintenance", &["corrective", "repair", "fix", "emergency"]),
                ("maintenance_planning", &["schedule", "plan", "upcoming", "due"]),
            ],
            technical_terms: &[],
        },
        QueryCategory {
            intent: Intent::Comparison,
            keywords: &["compare", "vs", "versus", "against", "better", "worse", "best", "worst"],
            patterns: compile_all(&[
                r"compare.*plants", r"vs.*performance", r"better.*than",
                r"best.*performing", r"worst.*performer", r"ranking.*plants",
            ]),
            subcategories: &[
                ("plant_comparison", &["plant", "site", "facility", "location"]),
                ("technology_comparison", &["solar", "wind", "technology", "type"]),
                ("time_comparison", &["yesterday", "last week", "last month", "year over year"]),
            ],
            technical_terms: &[],
        },
        QueryCategory {
            intent: Intent::Diagnostic,
            keywords: &["why", "reason", "cause", "problem", "issue", "trouble", "fault"],
            patterns: compile_all(&[
                r"why.*low", r"reason.*for", r"cause.*of", r"problem.*with",
                r"issue.*analysis", r"trouble.*shooting", r"fault.*diagnosis",
            ]),
            subcategories: &[
                ("performance_issues", &["low performance", "poor pr", "underperforming"]),
                ("availability_issues", &["downtime", "outage", "not running"]),
                ("equipment_issues", &["inverter", "transformer", "module", "grid"]),
            ],
            technical_terms: &[],
        },
        QueryCategory {
            intent: Intent::Forecasting,
            keywords: &["forecast", "prediction", "estimate", "expected", "projection"],
            patterns: compile_all(&[
                r"forecast.*generation", r"predict.*performance", r"estimate.*revenue",
                r"expected.*output", r"projection.*analysis",
            ]),
            subcategories: &[
                ("short_term", &["today", "tomorrow", "this week", "next week"]),
                ("medium_term", &["this month", "next month", "quarter"]),
                ("long_term", &["year", "annual", "yearly", "long term"]),
            ],
            technical_terms: &[],
        },
        QueryCategory {
            intent: Intent::Weather,
            keywords: &["weather", "irradiance", "temperature", "wind", "solar", "ghi", "poa"],
            patterns: compile_all(&[
                r"weather.*impact", r"irradiance.*data", r"temperature.*effect",
                r"wind.*speed", r"solar.*resource", r"weather.*correlation",
            ]),
            subcategories: &[
                ("current_weather", &["current", "today", "now", "present"]),
                ("weather_impact", &["impact", "effect", "influence", "correlation"]),
                ("weather_trends", &["trend", "pattern", "historical", "seasonal"]),
            ],
            technical_terms: &["irradiance", "ghi", "poa", "temperature", "wind"],
        },
        QueryCategory {
            intent: Intent::Alert,
            keywords: &["alert", "alarm", "warning", "notification", "critical", "urgent"],
            patterns: compile_all(&[
                r"critical.*alerts", r"warning.*messages", r"alarm.*status",
                r"urgent.*issues", r"notification.*summary",
            ]),
            subcategories: &[
                ("critical_alerts", &["critical", "severe", "major", "high priority"]),
                ("warning_alerts", &["warning", "caution", "medium priority"]),
                ("info_alerts", &["info", "information", "low priority", "notification"]),
            ],
            technical_terms: &[],
        },
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub intent: Intent,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Winning score over the sum of all scores; 0 when nothing scored
    pub confidence: f64,
    /// Every category score in catalog order
    pub scores: Vec<CategoryScore>,
}

#[derive(Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// The fixed catalog, in evaluation order
    pub fn catalog(&self) -> &'static [QueryCategory] {
        CATALOG.as_slice()
    }

    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let words = meaningful_words(&lower);

        let scores: Vec<CategoryScore> = CATALOG
            .iter()
            .map(|category| CategoryScore {
                intent: category.intent,
                score: score(category, &lower, &words),
            })
            .collect();

        let total: f64 = scores.iter().map(|s| s.score).sum();
        let mut best: Option<&CategoryScore> = None;
        for s in &scores {
            if best.map_or(true, |b| s.score > b.score) {
                best = Some(s);
            }
        }

        let (intent, confidence) = match best {
            Some(b) if total > 0.0 => (b.intent, b.score / total),
            _ => (Intent::General, 0.0),
        };
        debug!("Classified {:?} as {} (confidence {:.2})", text, intent, confidence);

        Classification {
            intent,
            confidence,
            scores,
        }
    }
}

/// Score of one category against lowercased text
pub fn score(category: &QueryCategory, lower: &str, words: &HashSet<String>) -> f64 {
    let keyword_hits = category.keywords.iter().filter(|k| lower.contains(*k)).count();
    let pattern_hits = category.patterns.iter().filter(|p| p.is_match(lower)).count();
    let sub_hits: usize = category
        .subcategories
        .iter()
        .map(|(_, kws)| kws.iter().filter(|k| lower.contains(*k)).count())
        .sum();
    let technical_bonus = category
        .technical_terms
        .iter()
        .any(|t| words.contains(*t));

    2.0 * keyword_hits as f64
        + 3.0 * pattern_hits as f64
        + 1.5 * sub_hits as f64
        + if technical_bonus { 2.0 } else { 0.0 }
}

/// Lowercased word tokens minus stop words
fn meaningful_words(lower: &str) -> HashSet<String> {
    WORD
        .find_iter(lower)
        .map(|m| m.as_str().to_string())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}
