use crate::app_config::{AppConfig, Environment, MatchThresholds};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        parse_as(var, &or_default(var, default))
    };
    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        parse_as(var, &or_default(var, default))
    };
    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        parse_as(var, &or_default(var, default))
    };
    let parse_f64 = |var: &str, default: f64| -> Result<f64, ConfigError> {
        match lookup(var) {
            Ok(raw) => parse_as(var, &raw),
            Err(_) => Ok(default),
        }
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
    let env = parse_environment(&or_default("AIWATCH_ENV", "development"))?;
    let log_level = or_default("AIWATCH_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("AIWATCH_SOURCES_PATH", "./config/sources.yaml"));
    let entities_path =
        PathBuf::from(or_default("AIWATCH_ENTITIES_PATH", "./config/entities.yaml"));

    let db_max_connections = parse_u32("AIWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("AIWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("AIWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let fetch_timeout_secs = parse_u64("AIWATCH_FETCH_TIMEOUT_SECS", "30")?;
    let source_timeout_secs = parse_u64("AIWATCH_SOURCE_TIMEOUT_SECS", "60")?;
    let user_agent = or_default("AIWATCH_USER_AGENT", "aiwatch/0.1 (feed-ingest)");
    let max_concurrent_sources = parse_usize("AIWATCH_MAX_CONCURRENT_SOURCES", "4")?.max(1);

    let thresholds = MatchThresholds {
        candidate: parse_f64(
            "AIWATCH_CANDIDATE_THRESHOLD",
            MatchThresholds::DEFAULT_CANDIDATE,
        )?,
        confirmed: parse_f64(
            "AIWATCH_CONFIRMED_THRESHOLD",
            MatchThresholds::DEFAULT_CONFIRMED,
        )?,
        token_weight: parse_f64("AIWATCH_TOKEN_WEIGHT", MatchThresholds::DEFAULT_TOKEN_WEIGHT)?,
    };
    thresholds.validate()?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        sources_path,
        entities_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        fetch_timeout_secs,
        source_timeout_secs,
        user_agent,
        max_concurrent_sources,
        thresholds,
    })
}

fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for values other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "AIWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}
