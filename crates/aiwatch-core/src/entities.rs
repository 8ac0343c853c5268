use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Model,
    Tool,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Tool => "tool",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(EntityKind::Model),
            "tool" => Ok(EntityKind::Tool),
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

/// A known model or tool that feed content may mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "id")]
    pub entity_id: String,
    pub kind: EntityKind,
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl Entity {
    #[must_use]
    pub fn new(entity_id: &str, kind: EntityKind, canonical_name: &str, aliases: &[&str]) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            kind,
            canonical_name: canonical_name.to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Read-only snapshot of the known entities for one pipeline run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityRegistry {
    pub entities: Vec<Entity>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    /// A registry containing only the entities of `kind`.
    #[must_use]
    pub fn of_kind(&self, kind: EntityKind) -> EntityRegistry {
        EntityRegistry {
            entities: self
                .entities
                .iter()
                .filter(|e| e.kind == kind)
                .cloned()
                .collect(),
        }
    }
}

/// Load and validate the entity registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_registry(path: &Path) -> Result<EntityRegistry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let registry: EntityRegistry =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse {
            path: path.display().to_string(),
            source: e,
        })?;

    validate_registry(&registry)?;

    Ok(registry)
}

fn validate_registry(registry: &EntityRegistry) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for entity in &registry.entities {
        if entity.entity_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "entity id must be non-empty".to_string(),
            ));
        }

        if entity.canonical_name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "entity '{}' has an empty canonical name",
                entity.entity_id
            )));
        }

        if !seen_ids.insert(entity.entity_id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate entity id: '{}'",
                entity.entity_id
            )));
        }
    }

    Ok(())
}
