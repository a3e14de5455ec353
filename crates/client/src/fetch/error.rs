use std::time::Duration;

/// Why an outbound fetch produced no response.
///
/// Callers treat every variant the same way ("this source failed"); the
/// distinction only matters for logs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Network(format!("transport timeout: {err}")) } else { FetchError::Network(err.to_string()) }
    }
}
