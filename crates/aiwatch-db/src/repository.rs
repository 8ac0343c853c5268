use aiwatch_core::{upsert_key, EntityKind, UpdateRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::DbError;

/// An [`UpdateRecord`] as it exists in the store.
///
/// `version` starts at 1 and increases by one on every overwrite of the same
/// `upsert_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: UpdateRecord,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-record result of [`UpdateRepository::bulk_upsert`].
#[derive(Debug)]
pub struct UpsertOutcome {
    pub record: UpdateRecord,
    pub result: Result<StoredRecord, DbError>,
}

impl UpsertOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Storage contract for update records.
///
/// Implementations must make `upsert` atomic per `upsert_key`: concurrent
/// writers of the same key converge on the last committed write and never
/// produce a second row.
#[async_trait]
pub trait UpdateRepository: Send + Sync {
    /// Insert a record whose key must not exist yet.
    ///
    /// # Errors
    ///
    /// [`DbError::Duplicate`] if the key is already stored.
    async fn create(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError>;

    /// Replace the record stored under the same key.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] if the key is not stored.
    async fn update(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError>;

    /// Insert, or replace entirely when the key exists. Returns the stored record.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidRecord`] for records that fail [`validate_record`],
    /// or a storage error.
    async fn upsert(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError>;

    /// Apply `upsert` to every record. One failure never prevents the others
    /// from being written; each record gets its own outcome, in input order.
    async fn bulk_upsert(&self, records: Vec<UpdateRecord>) -> Vec<UpsertOutcome> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let result = self.upsert(&record).await;
            outcomes.push(UpsertOutcome { record, result });
        }
        outcomes
    }

    /// Records for `entity_id`, optionally restricted to one entity kind,
    /// newest `published_at` first, then most recently written first.
    ///
    /// # Errors
    ///
    /// Returns a storage error; an unknown entity yields an empty `Vec`.
    async fn find_by_entity(
        &self,
        entity_id: &str,
        kind: Option<EntityKind>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>, DbError>;

    /// # Errors
    ///
    /// See [`find_by_entity`](Self::find_by_entity).
    async fn find_by_entity_id(
        &self,
        entity_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>, DbError> {
        self.find_by_entity(entity_id, None, limit).await
    }

    /// # Errors
    ///
    /// See [`find_by_entity`](Self::find_by_entity).
    async fn find_by_model_id(
        &self,
        model_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>, DbError> {
        self.find_by_entity(model_id, Some(EntityKind::Model), limit)
            .await
    }

    /// # Errors
    ///
    /// See [`find_by_entity`](Self::find_by_entity).
    async fn find_by_tool_id(
        &self,
        tool_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>, DbError> {
        self.find_by_entity(tool_id, Some(EntityKind::Tool), limit)
            .await
    }
}

/// Reject records the store must never hold.
///
/// # Errors
///
/// [`DbError::InvalidRecord`] when the key does not match the
/// `(entity_id, feed_item_id)` pair or the score is outside `[0, 1]`.
pub fn validate_record(record: &UpdateRecord) -> Result<(), DbError> {
    let invalid = |reason: String| DbError::InvalidRecord {
        upsert_key: record.upsert_key.clone(),
        reason,
    };

    if record.entity_id.trim().is_empty() || record.feed_item_id.trim().is_empty() {
        return Err(invalid("entity_id and feed_item_id must be non-empty".to_string()));
    }
    if record.upsert_key != upsert_key(&record.entity_id, &record.feed_item_id) {
        return Err(invalid(
            "upsert_key does not match (entity_id, feed_item_id)".to_string(),
        ));
    }
    if !record.score.is_finite() || !(0.0..=1.0).contains(&record.score) {
        return Err(invalid(format!("score {} is outside [0, 1]", record.score)));
    }
    Ok(())
}
