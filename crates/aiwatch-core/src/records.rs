use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntityKind;
use crate::items::{stable_hash, FeedItem};

/// The closed set of matching strategies.
///
/// Variant identity takes part in tie-breaking, so the set stays enumerable:
/// when two candidates for the same pair score equally, the one with the
/// higher [`precedence`](MatchStrategy::precedence) wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    Fuzzy,
    Keyword,
}

impl MatchStrategy {
    pub const ALL: [MatchStrategy; 3] = [
        MatchStrategy::Exact,
        MatchStrategy::Fuzzy,
        MatchStrategy::Keyword,
    ];

    /// Tie-break rank: exact > fuzzy > keyword.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            MatchStrategy::Exact => 2,
            MatchStrategy::Fuzzy => 1,
            MatchStrategy::Keyword => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Fuzzy => "fuzzy",
            MatchStrategy::Keyword => "keyword",
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(MatchStrategy::Exact),
            "fuzzy" => Ok(MatchStrategy::Fuzzy),
            "keyword" => Ok(MatchStrategy::Keyword),
            other => Err(format!("unknown match strategy '{other}'")),
        }
    }
}

/// Confirmed matches are high-confidence; tentative ones are persisted but
/// flagged for downstream review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    Confirmed,
    Tentative,
}

impl MatchConfidence {
    /// Classify a candidate score against the confirmed threshold.
    #[must_use]
    pub fn from_score(score: f64, confirmed_threshold: f64) -> Self {
        if score >= confirmed_threshold {
            MatchConfidence::Confirmed
        } else {
            MatchConfidence::Tentative
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchConfidence::Confirmed => "confirmed",
            MatchConfidence::Tentative => "tentative",
        }
    }
}

impl std::fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchConfidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(MatchConfidence::Confirmed),
            "tentative" => Ok(MatchConfidence::Tentative),
            other => Err(format!("unknown match confidence '{other}'")),
        }
    }
}

/// A scored association between one feed item and one entity. Ephemeral:
/// produced and consumed within a single pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub feed_item_id: String,
    /// In `[0, 1]`.
    pub score: f64,
    pub strategy: MatchStrategy,
    pub confidence: MatchConfidence,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confidence == MatchConfidence::Confirmed
    }
}

/// The durable artifact written by the update repository. Unique on
/// `upsert_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub upsert_key: String,
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub feed_item_id: String,
    pub source_id: String,
    pub score: f64,
    pub strategy: MatchStrategy,
    pub confidence: MatchConfidence,
    pub title: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl UpdateRecord {
    /// Build the record for a match against the item it was computed from.
    #[must_use]
    pub fn from_match(m: &Match, item: &FeedItem) -> Self {
        Self {
            upsert_key: upsert_key(&m.entity_id, &m.feed_item_id),
            entity_id: m.entity_id.clone(),
            entity_kind: m.entity_kind,
            feed_item_id: m.feed_item_id.clone(),
            source_id: item.source_id.clone(),
            score: m.score,
            strategy: m.strategy,
            confidence: m.confidence,
            title: item.title.clone(),
            url: item.url.clone(),
            published_at: item.published_at,
        }
    }
}

/// Deterministic key for an `(entity, feed item)` pair.
#[must_use]
pub fn upsert_key(entity_id: &str, feed_item_id: &str) -> String {
    stable_hash(&[entity_id, feed_item_id])
}
