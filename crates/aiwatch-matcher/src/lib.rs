//! Entity matching: scores feed items against the entity registry and keeps
//! at most one match per `(entity, item)` pair.

pub mod error;
pub mod matcher;
pub mod strategy;

pub use error::MatchingFailure;
pub use matcher::{match_entities, match_models, match_tools, select_best, EntityMatcher};
pub use strategy::{EntityText, ItemText, Score};
