use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::ApiParser;
use crate::error::FeedError;
use crate::fetch::{EndpointFetcher, HttpConfig};
use crate::parser::Parser;
use crate::rss::RssParser;

/// Registry of [`Parser`] implementations keyed by source type.
///
/// Type names are matched case-insensitively. Supporting a new feed type means
/// registering another parser; nothing already registered changes.
#[derive(Clone, Default)]
pub struct ParserFactory {
    parsers: BTreeMap<String, Arc<dyn Parser>>,
}

impl ParserFactory {
    /// An empty factory. Every lookup fails until parsers are registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with the built-in `rss` and `api` parsers, sharing one HTTP
    /// client.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn with_defaults(http: &HttpConfig) -> Result<Self, FeedError> {
        let fetcher = Arc::new(EndpointFetcher::new(http)?);
        let mut factory = Self::new();
        factory.register(Arc::new(RssParser::new(Arc::clone(&fetcher))));
        factory.register(Arc::new(ApiParser::new(fetcher)));
        Ok(factory)
    }

    /// Register `parser` under its own [`Parser::source_type`], replacing any
    /// parser previously registered under that name.
    pub fn register(&mut self, parser: Arc<dyn Parser>) -> &mut Self {
        let key = parser.source_type().trim().to_ascii_lowercase();
        self.parsers.insert(key, parser);
        self
    }

    /// # Errors
    ///
    /// Returns [`FeedError::Configuration`] naming `source_type` when no parser
    /// is registered for it.
    pub fn create_parser(&self, source_type: &str) -> Result<Arc<dyn Parser>, FeedError> {
        self.parsers
            .get(&source_type.trim().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| FeedError::Configuration {
                source_type: source_type.to_string(),
            })
    }

    /// Registered type names, sorted.
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ParserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserFactory")
            .field("types", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::parser::{RawEntries, RawEntry};

    struct StaticParser;

    #[async_trait]
    impl Parser for StaticParser {
        fn source_type(&self) -> &str {
            "Static"
        }

        async fn fetch(&self, _endpoint: &str) -> Result<RawEntries, FeedError> {
            Ok(Box::new(std::iter::once(Ok(RawEntry::default()))))
        }
    }

    #[test]
    fn defaults_register_rss_and_api() {
        let factory = ParserFactory::with_defaults(&HttpConfig::default()).unwrap();
        let types: Vec<&str> = factory.registered_types().collect();
        assert_eq!(types, vec!["api", "rss"]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let factory = ParserFactory::with_defaults(&HttpConfig::default()).unwrap();
        assert_eq!(factory.create_parser("RSS").unwrap().source_type(), "rss");
        assert_eq!(factory.create_parser(" api ").unwrap().source_type(), "api");
    }

    #[test]
    fn unknown_type_is_configuration_error_naming_the_type() {
        let factory = ParserFactory::with_defaults(&HttpConfig::default()).unwrap();
        let err = factory.create_parser("gopher").err().unwrap();
        assert!(matches!(err, FeedError::Configuration { ref source_type } if source_type == "gopher"));
        assert!(err.to_string().contains("gopher"));
    }

    #[tokio::test]
    async fn registered_parser_is_returned_without_touching_defaults() {
        let mut factory = ParserFactory::with_defaults(&HttpConfig::default()).unwrap();
        factory.register(Arc::new(StaticParser));

        let parser = factory.create_parser("static").unwrap();
        let entries: Vec<_> = parser.fetch("anything").await.unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(factory.create_parser("rss").is_ok());
    }
}
