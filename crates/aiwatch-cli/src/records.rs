use aiwatch_core::{AppConfig, EntityKind};
use aiwatch_db::{PgUpdateRepository, UpdateRepository};

const TITLE_WIDTH: usize = 50;

/// Print the stored update records for `entity_id`, newest first.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the query fails.
pub(crate) async fn run_records(
    config: &AppConfig,
    entity_id: &str,
    kind: Option<EntityKind>,
    limit: usize,
) -> anyhow::Result<()> {
    let pool = aiwatch_db::connect_pool_from_config(config).await?;
    let repository = PgUpdateRepository::new(pool);
    let records = repository
        .find_by_entity(entity_id, kind, Some(limit))
        .await?;

    if records.is_empty() {
        println!(
            "no update records for '{entity_id}'{}; run `aiwatch-cli run` first",
            kind.map(|k| format!(" ({k})")).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{:<12}{:<7}{:<10}{:<12}{:<7}TITLE",
        "PUBLISHED", "KIND", "STRATEGY", "CONFIDENCE", "SCORE"
    );
    for stored in &records {
        let record = &stored.record;
        println!(
            "{:<12}{:<7}{:<10}{:<12}{:<7.2}{}",
            record.published_at.format("%Y-%m-%d").to_string(),
            record.entity_kind.as_str(),
            record.strategy.as_str(),
            record.confidence.as_str(),
            record.score,
            truncate(&record.title, TITLE_WIDTH)
        );
    }

    Ok(())
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
