use std::cmp::Ordering;

use aiwatch_core::{
    Entity, EntityKind, EntityRegistry, FeedItem, Match, MatchConfidence, MatchStrategy,
    MatchThresholds,
};
use chrono::Utc;

use crate::strategy::{EntityText, ItemText, Score};

/// Matches feed items against one registry snapshot.
///
/// Entity names are normalized once at construction. The matcher holds no
/// mutable state, so one instance can be shared across threads for a run.
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    entities: Vec<(Entity, EntityText)>,
    thresholds: MatchThresholds,
}

impl EntityMatcher {
    #[must_use]
    pub fn new(registry: &EntityRegistry, thresholds: MatchThresholds) -> Self {
        let entities = registry
            .entities
            .iter()
            .map(|e| (e.clone(), EntityText::new(e)))
            .collect();
        Self {
            entities,
            thresholds,
        }
    }

    #[must_use]
    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All surviving matches for `item`, at most one per entity, ordered by
    /// score (desc), strategy precedence, then entity id.
    #[must_use]
    pub fn match_entities(&self, item: &FeedItem) -> Vec<Match> {
        self.match_filtered(item, None)
    }

    /// [`match_entities`](Self::match_entities) restricted to models.
    #[must_use]
    pub fn match_models(&self, item: &FeedItem) -> Vec<Match> {
        self.match_filtered(item, Some(EntityKind::Model))
    }

    /// [`match_entities`](Self::match_entities) restricted to tools.
    #[must_use]
    pub fn match_tools(&self, item: &FeedItem) -> Vec<Match> {
        self.match_filtered(item, Some(EntityKind::Tool))
    }

    fn match_filtered(&self, item: &FeedItem, kind: Option<EntityKind>) -> Vec<Match> {
        let text = ItemText::new(item);
        let matched_at = Utc::now();

        let mut matches: Vec<Match> = self
            .entities
            .iter()
            .filter(|(entity, _)| kind.is_none_or(|k| entity.kind == k))
            .filter_map(|(entity, prepared)| {
                let candidates = self.score_all(item, &text, prepared);
                let (strategy, score, confidence) = select_best(&candidates, self.thresholds)?;
                Some(Match {
                    entity_id: entity.entity_id.clone(),
                    entity_kind: entity.kind,
                    feed_item_id: item.feed_item_id.clone(),
                    score,
                    strategy,
                    confidence,
                    matched_at,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.strategy.precedence().cmp(&a.strategy.precedence()))
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        matches
    }

    fn score_all(
        &self,
        item: &FeedItem,
        text: &ItemText,
        entity: &EntityText,
    ) -> Vec<(MatchStrategy, f64)> {
        MatchStrategy::ALL
            .iter()
            .map(|strategy| {
                let score = strategy
                    .score(text, entity, self.thresholds.token_weight)
                    .unwrap_or_else(|e| {
                        tracing::warn!(
                            entity = %entity.entity_id,
                            feed_item = %item.feed_item_id,
                            strategy = %strategy,
                            error = %e,
                            "matching strategy failed; scoring 0.0"
                        );
                        0.0
                    });
                (*strategy, score)
            })
            .collect()
    }
}

/// Reduce one entity's strategy candidates to the single surviving match.
///
/// Candidates below the candidate threshold are dropped. Among the rest the
/// highest score wins, ties going to the strategy with higher precedence
/// (exact > fuzzy > keyword). Returns `None` when nothing survives.
#[must_use]
pub fn select_best(
    candidates: &[(MatchStrategy, f64)],
    thresholds: MatchThresholds,
) -> Option<(MatchStrategy, f64, MatchConfidence)> {
    candidates
        .iter()
        .copied()
        .filter(|(_, score)| score.is_finite() && *score >= thresholds.candidate)
        .max_by(|(sa, a), (sb, b)| match a.total_cmp(b) {
            Ordering::Equal => sa.precedence().cmp(&sb.precedence()),
            other => other,
        })
        .map(|(strategy, score)| {
            (
                strategy,
                score,
                MatchConfidence::from_score(score, thresholds.confirmed),
            )
        })
}

/// One-shot matching against `registry` without keeping a matcher around.
#[must_use]
pub fn match_entities(
    item: &FeedItem,
    registry: &EntityRegistry,
    thresholds: MatchThresholds,
) -> Vec<Match> {
    EntityMatcher::new(registry, thresholds).match_entities(item)
}

#[must_use]
pub fn match_models(
    item: &FeedItem,
    registry: &EntityRegistry,
    thresholds: MatchThresholds,
) -> Vec<Match> {
    match_entities(item, &registry.of_kind(EntityKind::Model), thresholds)
}

#[must_use]
pub fn match_tools(
    item: &FeedItem,
    registry: &EntityRegistry,
    thresholds: MatchThresholds,
) -> Vec<Match> {
    match_entities(item, &registry.of_kind(EntityKind::Tool), thresholds)
}
