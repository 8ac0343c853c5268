use std::sync::Arc;
use std::time::Duration;

use aiwatch_core::{AppConfig, FeedItem, FeedSource, UpdateRecord};
use aiwatch_db::UpdateRepository;
use aiwatch_feeds::{transform_all_until, FeedError, ParserFactory, TransformOutput};
use aiwatch_matcher::EntityMatcher;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::cancel::CancelSignal;
use crate::error::PipelineError;
use crate::summary::{RunSummary, SourceOutcome, SourceReport, Stage};

const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 4;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Sources processed at the same time. Values below 1 are treated as 1.
    pub max_concurrent_sources: usize,
    /// Deadline for fetching and transforming one source, shared by both stages.
    pub source_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sources: DEFAULT_MAX_CONCURRENT_SOURCES,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
        }
    }
}

impl AggregatorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_sources: config.max_concurrent_sources.max(1),
            source_timeout: Duration::from_secs(config.source_timeout_secs),
        }
    }
}

/// Matches and persisted records for one source, before the write.
struct MatchedBatch {
    records: Vec<UpdateRecord>,
    confirmed: usize,
    tentative: usize,
}

/// Runs every configured source through fetch, transform, match, and persist.
///
/// Each source is processed independently: a failure at any stage is recorded
/// against that source and the run moves on. The entity matcher is shared
/// read-only; the repository's per-record upsert is the only shared write.
pub struct Aggregator {
    factory: Arc<ParserFactory>,
    matcher: Arc<EntityMatcher>,
    repository: Arc<dyn UpdateRepository>,
    config: AggregatorConfig,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("factory", &self.factory)
            .field("entities", &self.matcher.entity_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    #[must_use]
    pub fn new(
        factory: Arc<ParserFactory>,
        matcher: Arc<EntityMatcher>,
        repository: Arc<dyn UpdateRepository>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            factory,
            matcher,
            repository,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> AggregatorConfig {
        self.config
    }

    /// Process `sources` with bounded concurrency and summarize the outcome.
    ///
    /// Once `cancel` is raised no further source is started; sources already
    /// in flight run to completion and the rest are reported as skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoSources`] for an empty source list and
    /// [`PipelineError::EmptyRegistry`] when the matcher has no entities.
    /// Per-source failures never surface here; they are itemized in the
    /// returned [`RunSummary`].
    pub async fn run(
        &self,
        sources: &[FeedSource],
        cancel: &CancelSignal,
    ) -> Result<RunSummary, PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::NoSources);
        }
        if self.matcher.entity_count() == 0 {
            return Err(PipelineError::EmptyRegistry);
        }

        let max_concurrent = self.config.max_concurrent_sources.max(1);
        tracing::info!(
            sources = sources.len(),
            entities = self.matcher.entity_count(),
            max_concurrent,
            "starting aggregation run"
        );

        let mut outcomes: Vec<(usize, SourceOutcome)> = stream::iter(sources.iter().enumerate())
            .map(|(index, source)| async move { (index, self.process_source(source, cancel).await) })
            .buffer_unordered(max_concurrent)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let outcomes: Vec<SourceOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();
        let summary = RunSummary::from_outcomes(&outcomes);

        tracing::info!(
            attempted = summary.sources_attempted,
            succeeded = summary.sources_succeeded,
            skipped = summary.sources_skipped,
            items = summary.items_ingested,
            written = summary.records_written,
            failed = summary.records_failed,
            "aggregation run finished"
        );
        Ok(summary)
    }

    async fn process_source(&self, source: &FeedSource, cancel: &CancelSignal) -> SourceOutcome {
        if cancel.is_cancelled() {
            tracing::info!(source = %source.id, "cancelled before start; skipping source");
            return SourceOutcome::Skipped {
                source_id: source.id.clone(),
            };
        }

        let failed = |stage: Stage, message: String| {
            tracing::warn!(source = %source.id, stage = %stage, error = %message, "source failed");
            SourceOutcome::Failed {
                source_id: source.id.clone(),
                stage,
                message,
            }
        };

        let parser = match self.factory.create_parser(&source.source_type) {
            Ok(parser) => parser,
            Err(e) => return failed(Stage::Idle, e.to_string()),
        };

        let deadline = Instant::now() + self.config.source_timeout;

        enter(source, Stage::Fetching);
        let entries = match tokio::time::timeout_at(deadline, parser.fetch(&source.endpoint)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => return failed(Stage::Fetching, e.to_string()),
            Err(_) => {
                let e = FeedError::Timeout {
                    endpoint: source.endpoint.clone(),
                    after_secs: self.config.source_timeout.as_secs(),
                };
                return failed(Stage::Fetching, e.to_string());
            }
        };

        // Entry iterators decode lazily and may block; drain them on the
        // blocking pool so other sources keep moving.
        enter(source, Stage::Transforming);
        let ingested_at = Utc::now();
        let source_id = source.id.clone();
        let drain = tokio::task::spawn_blocking(move || {
            transform_all_until(entries, &source_id, ingested_at, deadline.into_std())
        });
        let output = match tokio::time::timeout_at(deadline, drain).await {
            Ok(Ok(Ok(output))) => output,
            Ok(Ok(Err(e))) => return failed(Stage::Transforming, e.to_string()),
            Ok(Err(e)) => return failed(Stage::Transforming, format!("transform task failed: {e}")),
            Err(_) => {
                let e = FeedError::DeadlineExceeded {
                    source_id: source.id.clone(),
                };
                return failed(Stage::Transforming, e.to_string());
            }
        };

        enter(source, Stage::Matching);
        let TransformOutput {
            items,
            duplicates,
            warnings,
        } = output;
        let item_count = items.len();
        let matcher = Arc::clone(&self.matcher);
        let batch = match tokio::task::spawn_blocking(move || match_items(&matcher, &items)).await {
            Ok(batch) => batch,
            Err(e) => return failed(Stage::Matching, format!("matching task failed: {e}")),
        };

        enter(source, Stage::Persisting);
        let (records_written, record_failures) = self.persist(source, batch.records).await;

        enter(source, Stage::Idle);
        tracing::info!(
            source = %source.id,
            items = item_count,
            duplicates,
            warnings,
            confirmed = batch.confirmed,
            tentative = batch.tentative,
            written = records_written,
            failed = record_failures.len(),
            "source processed"
        );

        SourceOutcome::Completed(SourceReport {
            source_id: source.id.clone(),
            items: item_count,
            duplicates,
            transform_warnings: warnings,
            confirmed_matches: batch.confirmed,
            tentative_matches: batch.tentative,
            records_written,
            record_failures,
        })
    }

    /// One `bulk_upsert` per source. Returns the written count and the
    /// `(upsert_key, message)` of every rejected record.
    async fn persist(
        &self,
        source: &FeedSource,
        records: Vec<UpdateRecord>,
    ) -> (usize, Vec<(String, String)>) {
        if records.is_empty() {
            tracing::debug!(source = %source.id, "no matches; nothing to persist");
            return (0, Vec::new());
        }

        let outcomes = self.repository.bulk_upsert(records).await;
        let mut written = 0;
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(_) => written += 1,
                Err(e) => {
                    tracing::error!(
                        source = %source.id,
                        entity = %outcome.record.entity_id,
                        upsert_key = %outcome.record.upsert_key,
                        error = %e,
                        "update record not written"
                    );
                    failures.push((outcome.record.upsert_key, e.to_string()));
                }
            }
        }
        (written, failures)
    }
}

fn enter(source: &FeedSource, stage: Stage) {
    tracing::debug!(source = %source.id, stage = %stage, "stage transition");
}

fn match_items(matcher: &EntityMatcher, items: &[FeedItem]) -> MatchedBatch {
    let mut batch = MatchedBatch {
        records: Vec::new(),
        confirmed: 0,
        tentative: 0,
    };
    for item in items {
        for m in matcher.match_entities(item) {
            if m.is_confirmed() {
                batch.confirmed += 1;
            } else {
                batch.tentative += 1;
            }
            batch.records.push(UpdateRecord::from_match(&m, item));
        }
    }
    batch
}
