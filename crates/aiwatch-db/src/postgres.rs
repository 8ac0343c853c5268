use aiwatch_core::{EntityKind, UpdateRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{Acquire, PgExecutor, PgPool, Postgres};

use crate::repository::{validate_record, StoredRecord, UpdateRepository, UpsertOutcome};
use crate::DbError;

const RETURNING_COLUMNS: &str = "upsert_key, entity_id, entity_kind, feed_item_id, source_id, \
     score, strategy, confidence, title, url, published_at, version, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpdateRecordRow {
    pub upsert_key: String,
    pub entity_id: String,
    pub entity_kind: String,
    pub feed_item_id: String,
    pub source_id: String,
    pub score: f64,
    pub strategy: String,
    pub confidence: String,
    pub title: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UpdateRecordRow> for StoredRecord {
    type Error = DbError;

    fn try_from(row: UpdateRecordRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| DbError::InvalidRow {
            upsert_key: row.upsert_key.clone(),
            reason,
        };
        let entity_kind = row.entity_kind.parse().map_err(invalid)?;
        let strategy = row.strategy.parse().map_err(invalid)?;
        let confidence = row.confidence.parse().map_err(invalid)?;

        Ok(StoredRecord {
            record: UpdateRecord {
                upsert_key: row.upsert_key,
                entity_id: row.entity_id,
                entity_kind,
                feed_item_id: row.feed_item_id,
                source_id: row.source_id,
                score: row.score,
                strategy,
                confidence,
                title: row.title,
                url: row.url,
                published_at: row.published_at,
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed repository.
///
/// `upsert` is a single `INSERT ... ON CONFLICT (upsert_key) DO UPDATE`
/// statement, so concurrent writers of one key serialize on the unique index.
#[derive(Debug, Clone)]
pub struct PgUpdateRepository {
    pool: PgPool,
}

impl PgUpdateRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn upsert_with<'e, E>(executor: E, record: &UpdateRecord) -> Result<StoredRecord, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO update_records \
           (upsert_key, entity_id, entity_kind, feed_item_id, source_id, score, strategy, \
            confidence, title, url, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (upsert_key) DO UPDATE SET \
           entity_id = EXCLUDED.entity_id, \
           entity_kind = EXCLUDED.entity_kind, \
           feed_item_id = EXCLUDED.feed_item_id, \
           source_id = EXCLUDED.source_id, \
           score = EXCLUDED.score, \
           strategy = EXCLUDED.strategy, \
           confidence = EXCLUDED.confidence, \
           title = EXCLUDED.title, \
           url = EXCLUDED.url, \
           published_at = EXCLUDED.published_at, \
           version = update_records.version + 1, \
           updated_at = NOW() \
         RETURNING {RETURNING_COLUMNS}"
    );

    let row = bind_record(sqlx::query_as::<_, UpdateRecordRow>(&sql), record)
        .fetch_one(executor)
        .await?;
    StoredRecord::try_from(row)
}

type RowQuery<'q> = QueryAs<'q, Postgres, UpdateRecordRow, PgArguments>;

fn bind_record<'q>(query: RowQuery<'q>, record: &'q UpdateRecord) -> RowQuery<'q> {
    query
        .bind(&record.upsert_key)
        .bind(&record.entity_id)
        .bind(record.entity_kind.as_str())
        .bind(&record.feed_item_id)
        .bind(&record.source_id)
        .bind(record.score)
        .bind(record.strategy.as_str())
        .bind(record.confidence.as_str())
        .bind(&record.title)
        .bind(record.url.as_deref())
        .bind(record.published_at)
}

#[async_trait]
impl UpdateRepository for PgUpdateRepository {
    async fn create(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError> {
        validate_record(record)?;
        let sql = format!(
            "INSERT INTO update_records \
               (upsert_key, entity_id, entity_kind, feed_item_id, source_id, score, strategy, \
                confidence, title, url, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (upsert_key) DO NOTHING \
             RETURNING {RETURNING_COLUMNS}"
        );

        let row = bind_record(sqlx::query_as::<_, UpdateRecordRow>(&sql), record)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => StoredRecord::try_from(row),
            None => Err(DbError::Duplicate {
                upsert_key: record.upsert_key.clone(),
            }),
        }
    }

    async fn update(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError> {
        validate_record(record)?;
        let sql = format!(
            "UPDATE update_records SET \
               entity_id = $2, entity_kind = $3, feed_item_id = $4, source_id = $5, \
               score = $6, strategy = $7, confidence = $8, title = $9, url = $10, \
               published_at = $11, version = version + 1, updated_at = NOW() \
             WHERE upsert_key = $1 \
             RETURNING {RETURNING_COLUMNS}"
        );

        let row = bind_record(sqlx::query_as::<_, UpdateRecordRow>(&sql), record)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => StoredRecord::try_from(row),
            None => Err(DbError::NotFound {
                upsert_key: record.upsert_key.clone(),
            }),
        }
    }

    async fn upsert(&self, record: &UpdateRecord) -> Result<StoredRecord, DbError> {
        validate_record(record)?;
        upsert_with(&self.pool, record).await
    }

    /// One transaction per batch; each record runs inside its own savepoint so
    /// a failing row is rolled back alone.
    async fn bulk_upsert(&self, records: Vec<UpdateRecord>) -> Vec<UpsertOutcome> {
        if records.is_empty() {
            return Vec::new();
        }

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return fail_all(records, &e),
        };

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let result = upsert_in_savepoint(&mut tx, &record).await;
            if let Err(e) = &result {
                tracing::error!(
                    upsert_key = %record.upsert_key,
                    entity = %record.entity_id,
                    error = %e,
                    "failed to upsert update record"
                );
            }
            outcomes.push(UpsertOutcome { record, result });
        }

        if let Err(e) = tx.commit().await {
            let reason = e.to_string();
            return outcomes
                .into_iter()
                .map(|outcome| UpsertOutcome {
                    result: Err(DbError::Batch(reason.clone())),
                    record: outcome.record,
                })
                .collect();
        }
        outcomes
    }

    async fn find_by_entity(
        &self,
        entity_id: &str,
        kind: Option<EntityKind>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>, DbError> {
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let sql = format!(
            "SELECT {RETURNING_COLUMNS} FROM update_records \
             WHERE entity_id = $1 AND ($2::text IS NULL OR entity_kind = $2) \
             ORDER BY published_at DESC, updated_at DESC, id DESC \
             LIMIT $3"
        );

        let rows = sqlx::query_as::<_, UpdateRecordRow>(&sql)
            .bind(entity_id)
            .bind(kind.map(EntityKind::as_str))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredRecord::try_from).collect()
    }
}

async fn upsert_in_savepoint(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    record: &UpdateRecord,
) -> Result<StoredRecord, DbError> {
    validate_record(record)?;
    let mut savepoint = tx.begin().await?;
    match upsert_with(&mut *savepoint, record).await {
        Ok(stored) => {
            savepoint.commit().await?;
            Ok(stored)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}

fn fail_all(records: Vec<UpdateRecord>, error: &sqlx::Error) -> Vec<UpsertOutcome> {
    tracing::error!(error = %error, count = records.len(), "could not start batch transaction");
    let reason = error.to_string();
    records
        .into_iter()
        .map(|record| UpsertOutcome {
            record,
            result: Err(DbError::Batch(reason.clone())),
        })
        .collect()
}
