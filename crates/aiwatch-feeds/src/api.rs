use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::FeedError;
use crate::fetch::EndpointFetcher;
use crate::parser::{Parser, RawEntries, RawEntry};

/// Keys under which polling APIs commonly nest their entry array.
const ENVELOPE_KEYS: &[&str] = &["items", "entries", "data", "results", "hits"];

const GUID_KEYS: &[&str] = &["guid", "id", "uuid", "objectID"];
const URL_KEYS: &[&str] = &["url", "link", "html_url", "permalink"];
const TITLE_KEYS: &[&str] = &["title", "name", "headline"];
const BODY_KEYS: &[&str] = &["body", "description", "summary", "content", "text"];
const DATE_KEYS: &[&str] = &[
    "published_at",
    "publishedAt",
    "published",
    "pubDate",
    "date",
    "created_at",
    "createdAt",
    "updated_at",
    "updatedAt",
];
const CATEGORY_KEYS: &[&str] = &["categories", "tags", "category", "labels"];

/// Parser for JSON polling APIs.
///
/// Accepts a top-level array of entry objects, or an object carrying that
/// array under one of `items`, `entries`, `data`, `results`, or `hits`.
pub struct ApiParser {
    fetcher: Arc<EndpointFetcher>,
}

impl ApiParser {
    #[must_use]
    pub fn new(fetcher: Arc<EndpointFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Parser for ApiParser {
    fn source_type(&self) -> &str {
        "api"
    }

    async fn fetch(&self, endpoint: &str) -> Result<RawEntries, FeedError> {
        let bytes = self.fetcher.fetch_bytes(endpoint).await?;
        let entries = entries_from_json(endpoint, &bytes)?;
        Ok(Box::new(entries.into_iter().map(|v| Ok(raw_entry_from_json(v)))))
    }
}

/// Locate the entry array in a JSON document.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] if the body is not JSON, or
/// [`FeedError::Parse`] if no entry array can be found.
pub fn entries_from_json(endpoint: &str, body: &[u8]) -> Result<Vec<Value>, FeedError> {
    let document: Value = serde_json::from_slice(body).map_err(|e| FeedError::Deserialize {
        context: endpoint.to_string(),
        source: e,
    })?;

    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut object) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| FeedError::Parse {
                endpoint: endpoint.to_string(),
                reason: format!(
                    "expected an array or an object with one of {ENVELOPE_KEYS:?} holding an array"
                ),
            }),
        other => Err(FeedError::Parse {
            endpoint: endpoint.to_string(),
            reason: format!("expected an array or object, found {}", json_kind(&other)),
        }),
    }
}

/// Map one JSON entry onto a [`RawEntry`], best effort.
///
/// Non-object entries keep a bare string as the title and are otherwise empty.
#[must_use]
pub fn raw_entry_from_json(value: Value) -> RawEntry {
    let object = match value {
        Value::Object(object) => object,
        Value::String(s) => {
            return RawEntry {
                title: Some(s),
                ..RawEntry::default()
            }
        }
        _ => return RawEntry::default(),
    };

    RawEntry {
        guid: first_scalar(&object, GUID_KEYS),
        url: first_scalar(&object, URL_KEYS),
        title: first_scalar(&object, TITLE_KEYS),
        body: first_scalar(&object, BODY_KEYS),
        published: first_scalar(&object, DATE_KEYS),
        categories: categories(&object),
    }
}

fn first_scalar(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn categories(object: &Map<String, Value>) -> Vec<String> {
    let Some(value) = CATEGORY_KEYS.iter().find_map(|key| object.get(*key)) else {
        return Vec::new();
    };

    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => first_scalar(obj, &["name", "label", "term"]),
                other => scalar_to_string(other),
            })
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_top_level_array() {
        let body = br#"[{"id": 1}, {"id": 2}]"#;
        assert_eq!(entries_from_json("e", body).unwrap().len(), 2);
    }

    #[test]
    fn accepts_enveloped_array() {
        for key in ENVELOPE_KEYS {
            let mut envelope = Map::new();
            envelope.insert((*key).to_string(), json!([{"id": "a"}]));
            envelope.insert("next".to_string(), Value::Null);
            let body = Value::Object(envelope).to_string();
            assert_eq!(entries_from_json("e", body.as_bytes()).unwrap().len(), 1);
        }
    }

    #[test]
    fn rejects_object_without_entry_array() {
        let err = entries_from_json("e", br#"{"status": "ok"}"#).unwrap_err();
        assert!(matches!(err, FeedError::Parse { .. }));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = entries_from_json("e", b"<html>").unwrap_err();
        assert!(matches!(err, FeedError::Deserialize { .. }));
    }

    #[test]
    fn maps_common_field_names() {
        let entry = raw_entry_from_json(json!({
            "id": 42,
            "html_url": "https://github.com/org/repo/releases/v1",
            "name": "v1.0 released",
            "body": "Adds GPT-4o support",
            "published_at": "2024-05-13T10:00:00Z",
            "tags": ["release", {"name": "models"}, 7]
        }));

        assert_eq!(entry.guid.as_deref(), Some("42"));
        assert_eq!(
            entry.url.as_deref(),
            Some("https://github.com/org/repo/releases/v1")
        );
        assert_eq!(entry.title.as_deref(), Some("v1.0 released"));
        assert_eq!(entry.body.as_deref(), Some("Adds GPT-4o support"));
        assert_eq!(entry.published.as_deref(), Some("2024-05-13T10:00:00Z"));
        assert_eq!(entry.categories, vec!["release", "models", "7"]);
    }

    #[test]
    fn comma_separated_category_string_is_split() {
        let entry = raw_entry_from_json(json!({"category": "models, tools ,"}));
        assert_eq!(entry.categories, vec!["models", "tools"]);
    }

    #[test]
    fn non_object_entries_are_best_effort() {
        assert_eq!(
            raw_entry_from_json(json!("bare headline")).title.as_deref(),
            Some("bare headline")
        );
        assert_eq!(raw_entry_from_json(json!(null)), RawEntry::default());
    }
}
