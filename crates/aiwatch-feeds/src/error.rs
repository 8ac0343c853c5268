use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown feed source type '{source_type}'")]
    Configuration { source_type: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint not found: {endpoint}")]
    NotFound { endpoint: String },

    #[error("unexpected HTTP status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    #[error("unsupported endpoint scheme: {endpoint}")]
    UnsupportedEndpoint { endpoint: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {after_secs}s fetching {endpoint}")]
    Timeout { endpoint: String, after_secs: u64 },

    #[error("deadline passed while decoding entries for {source_id}")]
    DeadlineExceeded { source_id: String },

    #[error("malformed feed document from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FeedError {
    /// Whether the failure came from reaching the endpoint, as opposed to
    /// configuration or document shape.
    #[must_use]
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            FeedError::Http(_)
                | FeedError::NotFound { .. }
                | FeedError::UnexpectedStatus { .. }
                | FeedError::Io { .. }
                | FeedError::Timeout { .. }
        )
    }
}
