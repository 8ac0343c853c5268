use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// An externally configured feed to ingest.
///
/// `source_type` is kept as the raw string from the configuration; the parser
/// factory decides whether it is a registered type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(alias = "url")]
    pub endpoint: String,
    #[serde(default)]
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl FeedSource {
    #[must_use]
    pub fn new(id: &str, source_type: &str, endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            source_type: source_type.to_string(),
            endpoint: endpoint.to_string(),
            last_fetched_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<FeedSource>,
}

/// Load and validate the feed-source list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sources_file: SourcesFile =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse {
            path: path.display().to_string(),
            source: e,
        })?;

    validate_sources(&sources_file)?;

    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for source in &sources_file.sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id must be non-empty".to_string(),
            ));
        }

        if source.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has an empty endpoint",
                source.id
            )));
        }

        if !seen_ids.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id: '{}'",
                source.id
            )));
        }
    }

    Ok(())
}
