mod records;
mod run;

use std::path::PathBuf;

use aiwatch_core::EntityKind;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aiwatch-cli")]
#[command(about = "Ingest AI news feeds and track updates per model and tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every configured source, match items to entities, and store the results.
    Run {
        /// Feed-source list; defaults to `AIWATCH_SOURCES_PATH`.
        #[arg(long)]
        sources: Option<PathBuf>,
        /// Entity registry; defaults to `AIWATCH_ENTITIES_PATH`.
        #[arg(long)]
        entities: Option<PathBuf>,
        /// Keep records in memory instead of writing to the database.
        #[arg(long)]
        dry_run: bool,
        /// Override `AIWATCH_MAX_CONCURRENT_SOURCES`.
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
    /// List stored update records for one entity, newest first.
    Records {
        #[arg(long)]
        entity: String,
        /// Restrict to `model` or `tool` records.
        #[arg(long)]
        kind: Option<EntityKind>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = aiwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Run {
            sources,
            entities,
            dry_run,
            max_concurrent,
        }) => {
            let options = run::RunOptions {
                sources,
                entities,
                dry_run,
                max_concurrent,
            };
            let summary = run::run_pipeline(&config, options).await?;
            if !summary.is_success() {
                anyhow::bail!(
                    "run finished with {} error(s) and {} skipped source(s)",
                    summary.errors.len(),
                    summary.sources_skipped
                );
            }
        }
        Some(Commands::Records {
            entity,
            kind,
            limit,
        }) => records::run_records(&config, &entity, kind, limit).await?,
        Some(Commands::Migrate) => {
            let pool = aiwatch_db::connect_pool_from_config(&config).await?;
            let applied = aiwatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        None => println!("no command given; see `aiwatch-cli --help`"),
    }

    Ok(())
}
