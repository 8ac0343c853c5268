use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Non-fatal problems noticed while turning a raw entry into a [`FeedItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformWarning {
    /// The entry had neither a guid nor a url; the id was derived from the
    /// title and raw date, so collisions are more likely.
    MissingGuid,
    /// The entry carried no publication date; `published_at` is the
    /// ingestion time.
    MissingDate,
    /// The publication date could not be parsed; `published_at` is the
    /// ingestion time.
    UnparseableDate { raw: String },
}

impl std::fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformWarning::MissingGuid => {
                write!(f, "entry has no guid or url; id derived from title and date")
            }
            TransformWarning::MissingDate => {
                write!(f, "entry has no publication date; using ingestion time")
            }
            TransformWarning::UnparseableDate { raw } => {
                write!(f, "unparseable publication date '{raw}'; using ingestion time")
            }
        }
    }
}

/// Canonical unit of ingested content. Immutable once built by the transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Stable across runs for the same upstream guid/url; see [`feed_item_id`].
    pub feed_item_id: String,
    pub source_id: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Normalized category labels.
    pub raw_categories: BTreeSet<String>,
    pub warnings: Vec<TransformWarning>,
}

impl FeedItem {
    /// Title and body joined with a space, for whole-item matching.
    #[must_use]
    pub fn full_text(&self) -> String {
        match (self.title.is_empty(), self.body.is_empty()) {
            (false, false) => format!("{} {}", self.title, self.body),
            (false, true) => self.title.clone(),
            (true, _) => self.body.clone(),
        }
    }

    /// The title, or the body when the title is empty.
    #[must_use]
    pub fn title_or_body(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.body
        } else {
            &self.title
        }
    }
}

/// Hex SHA-256 over `parts`, each prefixed with its little-endian byte length.
#[must_use]
pub fn stable_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Derive the feed item id from the source id and the entry's guid or url.
#[must_use]
pub fn feed_item_id(source_id: &str, guid_or_url: &str) -> String {
    stable_hash(&[source_id, guid_or_url.trim()])
}

/// Fallback id for entries without guid/url, derived from the title and the
/// raw (unparsed) date string so it stays stable across runs.
#[must_use]
pub fn fallback_feed_item_id(source_id: &str, title: &str, raw_date: &str) -> String {
    stable_hash(&["untracked", source_id, title.trim(), raw_date.trim()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, body: &str) -> FeedItem {
        FeedItem {
            feed_item_id: "id".to_string(),
            source_id: "src".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            url: None,
            published_at: Utc::now(),
            raw_categories: BTreeSet::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn feed_item_id_is_deterministic() {
        let a = feed_item_id("openai-blog", "https://openai.com/index/gpt-4o");
        let b = feed_item_id("openai-blog", "https://openai.com/index/gpt-4o");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn feed_item_id_is_scoped_by_source() {
        let a = feed_item_id("source-a", "guid-1");
        let b = feed_item_id("source-b", "guid-1");
        assert_ne!(a, b);
    }

    #[test]
    fn feed_item_id_ignores_surrounding_whitespace() {
        assert_eq!(feed_item_id("s", " guid-1\n"), feed_item_id("s", "guid-1"));
    }

    #[test]
    fn fallback_id_differs_from_guid_id() {
        assert_ne!(
            fallback_feed_item_id("s", "Title", "2024-05-13"),
            feed_item_id("s", "Title")
        );
    }

    #[test]
    fn stable_hash_separates_parts() {
        assert_ne!(stable_hash(&["ab", "c"]), stable_hash(&["a", "bc"]));
    }

    #[test]
    fn stable_hash_is_unambiguous_for_parts_containing_nul() {
        assert_ne!(stable_hash(&["a\0b", "c"]), stable_hash(&["a", "b\0c"]));
        assert_ne!(stable_hash(&["a", ""]), stable_hash(&["a\0"]));
    }

    #[test]
    fn full_text_joins_title_and_body() {
        assert_eq!(item("Title", "Body").full_text(), "Title Body");
        assert_eq!(item("Title", "").full_text(), "Title");
        assert_eq!(item("", "Body").full_text(), "Body");
    }

    #[test]
    fn title_or_body_falls_back_to_body() {
        assert_eq!(item("  ", "Body").title_or_body(), "Body");
        assert_eq!(item("Title", "Body").title_or_body(), "Title");
    }
}
