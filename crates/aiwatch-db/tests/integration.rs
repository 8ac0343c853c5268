//! Offline tests for aiwatch-db: pool configuration and the repository
//! contract exercised through the in-memory implementation.
//! These tests do not require a live database connection.

use std::path::PathBuf;
use std::sync::Arc;

use aiwatch_core::{
    upsert_key, AppConfig, EntityKind, Environment, MatchConfidence, MatchStrategy,
    MatchThresholds, UpdateRecord,
};
use aiwatch_db::{connect_pool_from_config, DbError, InMemoryUpdateRepository, PoolConfig, UpdateRepository};
use chrono::Utc;

fn app_config(database_url: Option<&str>) -> AppConfig {
    AppConfig {
        database_url: database_url.map(str::to_string),
        env: Environment::Test,
        log_level: "info".to_string(),
        sources_path: PathBuf::from("./config/sources.yaml"),
        entities_path: PathBuf::from("./config/entities.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        fetch_timeout_secs: 30,
        source_timeout_secs: 60,
        user_agent: "ua".to_string(),
        max_concurrent_sources: 4,
        thresholds: MatchThresholds::default(),
    }
}

fn record(entity_id: &str, item: &str, score: f64) -> UpdateRecord {
    UpdateRecord {
        upsert_key: upsert_key(entity_id, item),
        entity_id: entity_id.to_string(),
        entity_kind: EntityKind::Model,
        feed_item_id: item.to_string(),
        source_id: "openai-blog".to_string(),
        score,
        strategy: MatchStrategy::Exact,
        confidence: MatchConfidence::Confirmed,
        title: "OpenAI releases GPT-4o update".to_string(),
        url: Some("https://openai.com/index/gpt-4o".to_string()),
        published_at: Utc::now(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config(None));
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[tokio::test]
async fn connect_without_database_url_is_typed_error() {
    let result = connect_pool_from_config(&app_config(None)).await;
    assert!(matches!(result, Err(DbError::MissingDatabaseUrl)));
}

#[tokio::test]
async fn repeated_upserts_converge_on_one_record() {
    let repo = InMemoryUpdateRepository::new();
    for _ in 0..3 {
        repo.upsert(&record("gpt4o", "item-1", 1.0)).await.unwrap();
    }

    let stored = repo.find_by_model_id("gpt4o", None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].version, 3);
    assert_eq!(stored[0].record.strategy, MatchStrategy::Exact);
}

#[tokio::test]
async fn concurrent_upserts_of_one_key_never_duplicate() {
    let repo = Arc::new(InMemoryUpdateRepository::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let score = 0.6 + f64::from(i) * 0.01;
                repo.upsert(&record("gpt4o", "item-1", score)).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(repo.len().await, 1);
    let stored = repo.find_by_entity_id("gpt4o", None).await.unwrap();
    assert_eq!(stored[0].version, 16);
}

#[tokio::test]
async fn bulk_upsert_reports_outcomes_in_input_order() {
    let repo = InMemoryUpdateRepository::new();
    let mut mismatched = record("gpt4o", "item-2", 0.9);
    mismatched.upsert_key = "bogus".to_string();

    let outcomes = repo
        .bulk_upsert(vec![
            record("gpt4o", "item-1", 0.9),
            mismatched,
            record("gpt4o", "item-3", 0.9),
        ])
        .await;

    let flags: Vec<bool> = outcomes.iter().map(aiwatch_db::UpsertOutcome::is_ok).collect();
    assert_eq!(flags, vec![true, false, true]);
    assert_eq!(outcomes[1].record.upsert_key, "bogus");
    assert_eq!(repo.len().await, 2);
}
