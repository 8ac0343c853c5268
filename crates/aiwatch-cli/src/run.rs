//! The `run` command: wire configuration, parsers, matcher, and store into
//! one aggregation run.

use std::path::PathBuf;
use std::sync::Arc;

use aiwatch_core::{load_registry, load_sources, AppConfig};
use aiwatch_db::{InMemoryUpdateRepository, PgUpdateRepository, UpdateRepository};
use aiwatch_feeds::{HttpConfig, ParserFactory};
use aiwatch_matcher::EntityMatcher;
use aiwatch_pipeline::{cancel_pair, Aggregator, AggregatorConfig, RunSummary};

#[derive(Debug, Default)]
pub(crate) struct RunOptions {
    pub sources: Option<PathBuf>,
    pub entities: Option<PathBuf>,
    pub dry_run: bool,
    pub max_concurrent: Option<usize>,
}

/// Apply command-line overrides on top of the environment configuration.
pub(crate) fn aggregator_config(config: &AppConfig, options: &RunOptions) -> AggregatorConfig {
    let mut aggregator_config = AggregatorConfig::from_app_config(config);
    if let Some(max) = options.max_concurrent {
        aggregator_config.max_concurrent_sources = max.max(1);
    }
    aggregator_config
}

/// Run the pipeline once over every configured source and print the summary.
///
/// Ctrl-C stops new sources from starting; sources already in flight finish.
///
/// # Errors
///
/// Returns an error if the source list or registry cannot be loaded, the
/// HTTP client or database cannot be set up, or the run's preconditions fail.
/// Per-source failures are reported in the returned summary instead.
pub(crate) async fn run_pipeline(
    config: &AppConfig,
    options: RunOptions,
) -> anyhow::Result<RunSummary> {
    let sources_path = options
        .sources
        .clone()
        .unwrap_or_else(|| config.sources_path.clone());
    let entities_path = options
        .entities
        .clone()
        .unwrap_or_else(|| config.entities_path.clone());

    let sources = load_sources(&sources_path)?.sources;
    let registry = load_registry(&entities_path)?;
    tracing::info!(
        sources = sources.len(),
        entities = registry.len(),
        dry_run = options.dry_run,
        "loaded run inputs"
    );

    let factory = ParserFactory::with_defaults(&HttpConfig {
        timeout_secs: config.fetch_timeout_secs,
        user_agent: config.user_agent.clone(),
    })?;
    let matcher = EntityMatcher::new(&registry, config.thresholds);

    let in_memory = Arc::new(InMemoryUpdateRepository::new());
    let repository: Arc<dyn UpdateRepository> = if options.dry_run {
        in_memory.clone()
    } else {
        let pool = aiwatch_db::connect_pool_from_config(config).await?;
        aiwatch_db::run_migrations(&pool).await?;
        Arc::new(PgUpdateRepository::new(pool))
    };

    let aggregator = Aggregator::new(
        Arc::new(factory),
        Arc::new(matcher),
        repository,
        aggregator_config(config, &options),
    );

    let (handle, signal) = cancel_pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received ctrl-c; finishing in-flight sources");
            handle.cancel();
        }
    });
    let result = aggregator.run(&sources, &signal).await;
    ctrl_c.abort();

    let summary = result?;
    println!("{summary}");
    if options.dry_run {
        println!(
            "dry-run: {} record(s) held in memory, nothing written",
            in_memory.len().await
        );
    }
    Ok(summary)
}
