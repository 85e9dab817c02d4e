use lazy_static::lazy_static;
use regex::Regex;
use strsim::jaro_winkler;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Fuzzy matcher for plant names that were mentioned but not resolved
pub struct FuzzyMatcher {
    /// Similarity threshold (0.0-1.0) for considering two strings as matches
    pub similarity_threshold: f64,
    /// Whether to normalize strings before comparison
    pub normalize: bool,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            normalize: true,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            normalize: true,
        }
    }

    /// Lowercase, drop punctuation and separators, collapse whitespace
    pub fn normalize_string(&self, s: &str) -> String {
        if !self.normalize {
            return s.to_lowercase();
        }

        let normalized: String = s
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();

        WHITESPACE.replace_all(&normalized, " ").trim().to_string()
    }

    /// Similarity between two strings, 0.0 to 1.0
    pub fn similarity(&self, s1: &str, s2: &str) -> f64 {
        let norm1 = self.normalize_string(s1);
        let norm2 = self.normalize_string(s2);

        let jw_score = jaro_winkler(&norm1, &norm2);

        // Substring matches ("ntpc" vs "ntpc solar") get up to a 10% bonus,
        // shrinking as the lengths diverge
        let is_substring = norm1.contains(&norm2) || norm2.contains(&norm1);
        let substring_bonus = if is_substring && !norm1.is_empty() && !norm2.is_empty() {
            let len_diff = (norm1.len() as f64 - norm2.len() as f64).abs();
            let max_len = norm1.len().max(norm2.len()) as f64;
            (1.0 - (len_diff / max_len)) * 0.1
        } else {
            0.0
        };

        (jw_score + substring_bonus).min(1.0)
    }

    pub fn is_match(&self, s1: &str, s2: &str) -> bool {
        self.similarity(s1, s2) >= self.similarity_threshold
    }

    /// Closest candidate at or above the threshold, ties to the first candidate
    pub fn best_match<'a>(&self, mention: &str, candidates: &'a [String]) -> Option<(&'a str, f64)> {
        let mut best: Option<(&'a str, f64)> = None;
        for candidate in candidates {
            let score = self.similarity(mention, candidate);
            if score < self.similarity_threshold {
                continue;
            }
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((candidate.as_str(), score));
            }
        }
        best
    }
}
