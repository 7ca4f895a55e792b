use thiserror::Error;

/// Failure classes for upstream stats fetches.
///
/// `Transient` covers timeouts and dropped connections and is eligible for
/// retry; `Upstream` covers everything the retry loop must not repeat
/// (HTTP error statuses, malformed payloads, missing result sets).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient fetch failure: {0}")]
    Transient(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            FetchError::Transient(err.to_string())
        } else {
            FetchError::Upstream(err.to_string())
        }
    }
}
