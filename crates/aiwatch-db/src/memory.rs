use std::collections::HashMap;

use aiwatch_core::{EntityKind, UpdateRecord};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::repository::{validate_record, StoredRecord, UpdateRepository};
use crate::DbError;

#[derive(Debug, Default)]
struct Store {
    rows: HashMap<String, Row>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct Row {
    stored: StoredRecord,
    /// Monotonic write counter; breaks `updated_at` ties on read-back.
    seq: u64,
}

impl Store {
    fn write(&mut self, record: &UpdateRecord) -> StoredRecord {
        let now = Utc::now();
        self.next_seq += 1;
        let seq = self.next_seq;

        let stored = match self.rows.get(&record.upsert_key) {
            Some(existing) => StoredRecord {
                record: record.clone(),
                version: existing.stored.version + 1,
                created_at: existing.stored.created_at,
                updated_at: now,
            },
            None => StoredRecord {
                record: record.clone(),
                version: 1,
                created_at: now,
                updated_at: now,
            },
        };

        self.rows.insert(
            record.upsert_key.clone(),
            Row {
                stored: stored.clone(),
                seq,
            },
        );
        stored
    }
}

/// Map-backed repository. Every write holds the lock for the whole
/// read-modify-write, so upserts of one key are serialized.
#[derive(Debug, Default)]
pub struct InMemoryUpdateRepository {
    store: RwLock<Store>,
}

impl InMemoryUpdateRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every stored record, ordered by upsert key.
    pub async fn snapshot(&self) -> Vec<StoredRecord> {
        let store = self.store.read().await;
        let mut all: Vec<StoredRecord> = store.rows.values().map(|r| r.stored.clone()).collect();
        all.sort_by(|a, b| a.record.upsert_key.cmp(&b.record.upsert_key));
        all
    }
}

#[async_trait]
impl UpdateRepository for InMemoryUpdateRepository {
    async fn create(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError> {
        validate_record(record)?;
        let mut store = self.store.write().await;
        if store.rows.contains_key(&record.upsert_key) {
            return Err(DbError::Duplicate {
                upsert_key: record.upsert_key.clone(),
            });
        }
        Ok(store.write(record))
    }

    async fn update(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError> {
        validate_record(record)?;
        let mut store = self.store.write().await;
        if !store.rows.contains_key(&record.upsert_key) {
            return Err(DbError::NotFound {
                upsert_key: record.upsert_key.clone(),
            });
        }
        Ok(store.write(record))
    }

    async fn upsert(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError> {
        validate_record(record)?;
        Ok(self.store.write().await.write(record))
    }

    async fn find_by_entity(
        &self,
        entity_id: &str,
        kind: Option<EntityKind>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>, DbError> {
        let store = self.store.read().await;
        let mut rows: Vec<&Row> = store
            .rows
            .values()
            .filter(|row| row.stored.record.entity_id == entity_id)
            .filter(|row| kind.is_none_or(|k| row.stored.record.entity_kind == k))
            .collect();

        rows.sort_by(|a, b| {
            b.stored
                .record
                .published_at
                .cmp(&a.stored.record.published_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        Ok(rows
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| row.stored.clone())
            .collect())
    }
}
