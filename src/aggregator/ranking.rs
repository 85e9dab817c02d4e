//! Deterministic plant rankings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPlant {
    /// 1-based position
    pub rank: usize,
    pub plant_id: String,
    pub value: f64,
}

/// Order by value descending, ties by plant id ascending. The order is total,
/// so any permutation of the same input ranks identically.
pub fn rank_plants<I, S>(values: I) -> Vec<RankedPlant>
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    let mut entries: Vec<(String, f64)> = values.into_iter().map(|(id, v)| (id.into(), v)).collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (plant_id, value))| RankedPlant {
            rank: i + 1,
            plant_id,
            value,
        })
        .collect()
}

/// Plant ids in ranked order
pub fn ranked_ids(ranking: &[RankedPlant]) -> Vec<String> {
    ranking.iter().map(|r| r.plant_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ties_break_by_id() {
        let ranking = rank_plants(vec![("Charlie", 5.0), ("alpha", 9.0), ("Bravo", 5.0)]);
        assert_eq!(ranked_ids(&ranking), vec!["alpha", "Bravo", "Charlie"]);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[2].rank, 3);
    }

    #[test]
    fn test_shuffled_input_same_order() {
        let a = rank_plants(vec![("P3", 1.0), ("P1", 2.0), ("P2", 2.0), ("P4", 0.5)]);
        let b = rank_plants(vec![("P2", 2.0), ("P4", 0.5), ("P3", 1.0), ("P1", 2.0)]);
        assert_eq!(a, b);
    }
}
