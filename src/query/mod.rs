//! Query understanding: intent scoring and entity resolution

pub mod classifier;
pub mod entities;
pub mod fuzzy_matcher;

pub use classifier::{Classification, Intent, QueryClassifier};
pub use entities::{EntityExtractor, EntitySet, PlantAliasIndex, UnresolvedPlant};
pub use fuzzy_matcher::FuzzyMatcher;
