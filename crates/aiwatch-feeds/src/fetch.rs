use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::error::FeedError;

/// HTTP settings shared by every parser built by
/// [`ParserFactory::with_defaults`](crate::ParserFactory::with_defaults).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "aiwatch/0.1 (feed-ingest)".to_string(),
        }
    }
}

/// Reads a feed document from an endpoint.
///
/// `http://` and `https://` endpoints are requested once with `reqwest`.
/// `file://` URLs and bare paths are read from disk. A 404 (or a missing
/// file) is [`FeedError::NotFound`]; any other non-2xx status is
/// [`FeedError::UnexpectedStatus`]. Nothing is retried.
#[derive(Debug, Clone)]
pub struct EndpointFetcher {
    client: Client,
    timeout_secs: u64,
}

enum Endpoint {
    Http,
    File(PathBuf),
}

impl EndpointFetcher {
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &HttpConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Fetch the raw bytes behind `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`FeedError::NotFound`] on HTTP 404 or a missing file.
    /// - [`FeedError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`FeedError::Timeout`] when the request exceeds the configured timeout.
    /// - [`FeedError::Http`] on other network or TLS failures.
    /// - [`FeedError::Io`] on other filesystem failures.
    /// - [`FeedError::UnsupportedEndpoint`] for schemes other than http, https, or file.
    pub async fn fetch_bytes(&self, endpoint: &str) -> Result<Vec<u8>, FeedError> {
        match classify(endpoint)? {
            Endpoint::Http => self.fetch_http(endpoint).await,
            Endpoint::File(path) => read_file(endpoint, path).await,
        }
    }

    async fn fetch_http(&self, endpoint: &str) -> Result<Vec<u8>, FeedError> {
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| self.map_reqwest(endpoint, e))?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound {
                endpoint: endpoint.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest(endpoint, e))?;
        tracing::debug!(endpoint, bytes = bytes.len(), "fetched feed document");
        Ok(bytes.to_vec())
    }

    fn map_reqwest(&self, endpoint: &str, error: reqwest::Error) -> FeedError {
        if error.is_timeout() {
            FeedError::Timeout {
                endpoint: endpoint.to_string(),
                after_secs: self.timeout_secs,
            }
        } else {
            FeedError::Http(error)
        }
    }
}

fn classify(endpoint: &str) -> Result<Endpoint, FeedError> {
    let trimmed = endpoint.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(Endpoint::Http);
    }
    if let Some(path) = trimmed
        .strip_prefix("file://")
        .or_else(|| trimmed.strip_prefix("FILE://"))
    {
        return Ok(Endpoint::File(PathBuf::from(path)));
    }
    if trimmed.contains("://") {
        return Err(FeedError::UnsupportedEndpoint {
            endpoint: endpoint.to_string(),
        });
    }
    Ok(Endpoint::File(PathBuf::from(trimmed)))
}

async fn read_file(endpoint: &str, path: PathBuf) -> Result<Vec<u8>, FeedError> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FeedError::NotFound {
            endpoint: endpoint.to_string(),
        }),
        Err(e) => Err(FeedError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}
