use aiwatch_core::MatchStrategy;
use thiserror::Error;

/// A strategy could not score one `(item, entity)` comparison.
///
/// Never propagated out of the matcher: the comparison scores 0.0 and the
/// failure is logged.
#[derive(Debug, Error, PartialEq)]
pub enum MatchingFailure {
    #[error("entity {entity_id} has no usable names after normalization")]
    EmptyEntityNames { entity_id: String },

    #[error("{strategy} strategy produced non-finite score for entity {entity_id}")]
    NonFiniteScore {
        entity_id: String,
        strategy: MatchStrategy,
    },
}
