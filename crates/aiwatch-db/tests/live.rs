//! Live integration tests for `PgUpdateRepository` using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/aiwatch-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use aiwatch_core::{
    upsert_key, EntityKind, MatchConfidence, MatchStrategy, UpdateRecord,
};
use aiwatch_db::{DbError, PgUpdateRepository, UpdateRepository};
use chrono::{Duration, TimeZone, Utc};

fn record(entity_id: &str, kind: EntityKind, item: &str, score: f64) -> UpdateRecord {
    UpdateRecord {
        upsert_key: upsert_key(entity_id, item),
        entity_id: entity_id.to_string(),
        entity_kind: kind,
        feed_item_id: item.to_string(),
        source_id: "ai-news".to_string(),
        score,
        strategy: MatchStrategy::Fuzzy,
        confidence: MatchConfidence::Tentative,
        title: format!("Item {item}"),
        url: None,
        published_at: Utc.with_ymd_and_hms(2024, 5, 13, 10, 0, 0).unwrap(),
    }
}

async fn count_rows(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM update_records")
        .fetch_one(pool)
        .await
        .expect("count query failed")
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_inserts_then_replaces(pool: sqlx::PgPool) {
    let repo = PgUpdateRepository::new(pool.clone());

    let first = repo
        .upsert(&record("gpt4o", EntityKind::Model, "item-1", 0.7))
        .await
        .expect("first upsert failed");
    assert_eq!(first.version, 1);

    let mut replacement = record("gpt4o", EntityKind::Model, "item-1", 1.0);
    replacement.strategy = MatchStrategy::Exact;
    replacement.confidence = MatchConfidence::Confirmed;
    replacement.title = "Renamed".to_string();

    let second = repo.upsert(&replacement).await.expect("second upsert failed");
    assert_eq!(second.version, 2);
    assert_eq!(second.record, replacement);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(count_rows(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_and_update_enforce_key_presence(pool: sqlx::PgPool) {
    let repo = PgUpdateRepository::new(pool);
    let r = record("cursor", EntityKind::Tool, "item-1", 0.8);

    assert!(matches!(repo.update(&r).await, Err(DbError::NotFound { .. })));
    repo.create(&r).await.expect("create failed");
    assert!(matches!(repo.create(&r).await, Err(DbError::Duplicate { .. })));
    assert_eq!(repo.update(&r).await.expect("update failed").version, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_upsert_isolates_bad_records(pool: sqlx::PgPool) {
    let repo = PgUpdateRepository::new(pool.clone());

    let outcomes = repo
        .bulk_upsert(vec![
            record("gpt4o", EntityKind::Model, "a", 0.9),
            record("gpt4o", EntityKind::Model, "b", 7.5),
            record("gpt4o", EntityKind::Model, "c", 0.9),
        ])
        .await;

    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1].result, Err(DbError::InvalidRecord { .. })));
    assert!(outcomes[2].is_ok());
    assert_eq!(count_rows(&pool).await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_upsert_twice_is_idempotent(pool: sqlx::PgPool) {
    let repo = PgUpdateRepository::new(pool.clone());
    let batch = vec![
        record("gpt4o", EntityKind::Model, "a", 0.9),
        record("gpt4o", EntityKind::Model, "b", 0.7),
    ];

    repo.bulk_upsert(batch.clone()).await;
    let outcomes = repo.bulk_upsert(batch).await;

    assert!(outcomes.iter().all(aiwatch_db::UpsertOutcome::is_ok));
    assert_eq!(count_rows(&pool).await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn find_orders_by_recency_and_filters_by_kind(pool: sqlx::PgPool) {
    let repo = PgUpdateRepository::new(pool);

    let mut older = record("cursor", EntityKind::Tool, "old", 0.8);
    older.published_at -= Duration::days(3);
    repo.upsert(&older).await.unwrap();
    repo.upsert(&record("cursor", EntityKind::Tool, "new", 0.8))
        .await
        .unwrap();

    let found = repo.find_by_tool_id("cursor", None).await.unwrap();
    let items: Vec<&str> = found.iter().map(|s| s.record.feed_item_id.as_str()).collect();
    assert_eq!(items, vec!["new", "old"]);

    assert_eq!(repo.find_by_entity_id("cursor", Some(1)).await.unwrap().len(), 1);
    assert!(repo.find_by_model_id("cursor", None).await.unwrap().is_empty());
    assert!(repo.find_by_entity_id("nobody", None).await.unwrap().is_empty());
}
