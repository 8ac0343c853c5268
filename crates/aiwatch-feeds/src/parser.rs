use async_trait::async_trait;

use crate::error::FeedError;

/// One entry as a parser found it, before normalization.
///
/// Every field is optional; the transformer decides how to cope with gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub guid: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    /// The publication date exactly as it appeared in the document.
    pub published: Option<String>,
    pub categories: Vec<String>,
}

impl RawEntry {
    /// The guid when present and non-blank, otherwise the url.
    #[must_use]
    pub fn guid_or_url(&self) -> Option<&str> {
        non_blank(self.guid.as_deref()).or_else(|| non_blank(self.url.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Lazy, finite sequence of raw entries produced by one `fetch`.
///
/// Entries are decoded as the sequence is pulled. An `Err` item means the
/// document itself is malformed from that point on; the sequence ends after it.
pub type RawEntries = Box<dyn Iterator<Item = Result<RawEntry, FeedError>> + Send>;

/// A feed protocol implementation registered with the
/// [`ParserFactory`](crate::ParserFactory) under one source type.
#[async_trait]
pub trait Parser: Send + Sync {
    /// The source type this parser is registered under, e.g. `"rss"`.
    fn source_type(&self) -> &str;

    /// Retrieve the document at `endpoint` (one round trip) and return its
    /// entries. Not restartable: fetching again re-issues the request.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the endpoint cannot be read or the document
    /// cannot be opened as this parser's format.
    async fn fetch(&self, endpoint: &str) -> Result<RawEntries, FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_or_url_prefers_guid() {
        let entry = RawEntry {
            guid: Some("guid-1".to_string()),
            url: Some("https://example.com/a".to_string()),
            ..RawEntry::default()
        };
        assert_eq!(entry.guid_or_url(), Some("guid-1"));
    }

    #[test]
    fn guid_or_url_skips_blank_guid() {
        let entry = RawEntry {
            guid: Some("   ".to_string()),
            url: Some("https://example.com/a".to_string()),
            ..RawEntry::default()
        };
        assert_eq!(entry.guid_or_url(), Some("https://example.com/a"));
    }

    #[test]
    fn guid_or_url_none_when_both_missing() {
        assert_eq!(RawEntry::default().guid_or_url(), None);
    }
}
