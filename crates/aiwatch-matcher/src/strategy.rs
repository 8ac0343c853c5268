use std::collections::BTreeSet;

use aiwatch_core::{
    extract_keywords, jaccard, normalize, similarity_weighted, Entity, FeedItem, MatchStrategy,
};

use crate::error::MatchingFailure;

/// Item text prepared once and reused against every entity.
#[derive(Debug, Clone)]
pub struct ItemText {
    /// Normalized title + body, padded with spaces for whole-token lookup.
    padded_full_text: String,
    title_or_body: String,
    keywords: BTreeSet<String>,
}

impl ItemText {
    #[must_use]
    pub fn new(item: &FeedItem) -> Self {
        let full_text = item.full_text();
        Self {
            padded_full_text: format!(" {} ", normalize(&full_text)),
            title_or_body: item.title_or_body().to_string(),
            keywords: extract_keywords(&full_text),
        }
    }

    fn contains_phrase(&self, normalized_phrase: &str) -> bool {
        self.padded_full_text
            .contains(&format!(" {normalized_phrase} "))
    }
}

/// Entity names prepared once per registry snapshot.
#[derive(Debug, Clone)]
pub struct EntityText {
    pub entity_id: String,
    raw_names: Vec<String>,
    normalized_names: Vec<String>,
    keywords: BTreeSet<String>,
}

impl EntityText {
    #[must_use]
    pub fn new(entity: &Entity) -> Self {
        let raw_names: Vec<String> = entity.names().map(str::to_string).collect();
        let normalized_names: Vec<String> = raw_names
            .iter()
            .map(|n| normalize(n))
            .filter(|n| !n.is_empty())
            .collect();
        let keywords = raw_names.iter().flat_map(|n| extract_keywords(n)).collect();

        Self {
            entity_id: entity.entity_id.clone(),
            raw_names,
            normalized_names,
            keywords,
        }
    }

    fn ensure_names(&self) -> Result<(), MatchingFailure> {
        if self.normalized_names.is_empty() {
            return Err(MatchingFailure::EmptyEntityNames {
                entity_id: self.entity_id.clone(),
            });
        }
        Ok(())
    }
}

/// The shared scoring capability of the strategy variants.
pub trait Score {
    /// Score `item` against `entity` in `[0, 1]`.
    ///
    /// `token_weight` is the Jaccard weight used by fuzzy similarity.
    ///
    /// # Errors
    ///
    /// Returns [`MatchingFailure`] when the comparison cannot be made.
    fn score(
        &self,
        item: &ItemText,
        entity: &EntityText,
        token_weight: f64,
    ) -> Result<f64, MatchingFailure>;
}

impl Score for MatchStrategy {
    fn score(
        &self,
        item: &ItemText,
        entity: &EntityText,
        token_weight: f64,
    ) -> Result<f64, MatchingFailure> {
        entity.ensure_names()?;

        let score = match self {
            MatchStrategy::Exact => {
                let found = entity
                    .normalized_names
                    .iter()
                    .any(|name| item.contains_phrase(name));
                if found {
                    1.0
                } else {
                    0.0
                }
            }
            MatchStrategy::Fuzzy => entity
                .raw_names
                .iter()
                .map(|name| similarity_weighted(&item.title_or_body, name, token_weight))
                .fold(0.0, f64::max),
            MatchStrategy::Keyword => jaccard(&item.keywords, &entity.keywords),
        };

        if !score.is_finite() {
            return Err(MatchingFailure::NonFiniteScore {
                entity_id: entity.entity_id.clone(),
                strategy: *self,
            });
        }
        Ok(score.clamp(0.0, 1.0))
    }
}
