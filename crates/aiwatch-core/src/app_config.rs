use std::path::PathBuf;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Score cut-offs used by the entity matcher, plus the token/edit weighting
/// used by [`crate::text::similarity_weighted`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// Candidates scoring below this are discarded.
    pub candidate: f64,
    /// Candidates at or above this are confirmed; the rest are tentative.
    pub confirmed: f64,
    /// Weight of keyword Jaccard overlap in `similarity`; the edit-distance
    /// ratio receives `1.0 - token_weight`.
    pub token_weight: f64,
}

impl MatchThresholds {
    pub const DEFAULT_CANDIDATE: f64 = 0.6;
    pub const DEFAULT_CONFIRMED: f64 = 0.85;
    pub const DEFAULT_TOKEN_WEIGHT: f64 = 0.6;

    /// Check that every value lies in `[0, 1]` and that the candidate
    /// threshold does not exceed the confirmed threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("candidate threshold", self.candidate),
            ("confirmed threshold", self.confirmed),
            ("token weight", self.token_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.candidate > self.confirmed {
            return Err(ConfigError::Validation(format!(
                "candidate threshold {} exceeds confirmed threshold {}",
                self.candidate, self.confirmed
            )));
        }

        Ok(())
    }
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            candidate: Self::DEFAULT_CANDIDATE,
            confirmed: Self::DEFAULT_CONFIRMED,
            token_weight: Self::DEFAULT_TOKEN_WEIGHT,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub sources_path: PathBuf,
    pub entities_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub source_timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrent_sources: usize,
    pub thresholds: MatchThresholds,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("entities_path", &self.entities_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}
