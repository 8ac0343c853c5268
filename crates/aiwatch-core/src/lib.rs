//! Shared domain model, configuration, and text-matching utilities for the
//! aiwatch feed pipeline.

pub mod app_config;
pub mod config;
pub mod entities;
pub mod error;
pub mod items;
pub mod records;
pub mod sources;
pub mod text;

pub use app_config::{AppConfig, Environment, MatchThresholds};
pub use config::{load_app_config, load_app_config_from_env};
pub use entities::{load_registry, Entity, EntityKind, EntityRegistry};
pub use error::ConfigError;
pub use items::{fallback_feed_item_id, feed_item_id, stable_hash, FeedItem, TransformWarning};
pub use records::{upsert_key, Match, MatchConfidence, MatchStrategy, UpdateRecord};
pub use sources::{load_sources, FeedSource, SourcesFile};
pub use text::{extract_keywords, jaccard, normalize, similarity, similarity_weighted};
