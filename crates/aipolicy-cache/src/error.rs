use thiserror::Error;

/// Failure of a cached fetch once retries and stale fallback are exhausted.
///
/// `Clone` because one outcome is shared by every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("fetch for '{key}' failed after {attempts} attempt(s): {message}")]
    Fetch {
        key: String,
        attempts: u32,
        message: String,
    },

    #[error("fetch for '{key}' timed out after {attempts} attempt(s) of {timeout_ms} ms")]
    Timeout {
        key: String,
        attempts: u32,
        timeout_ms: u64,
    },

    #[error("fetch for '{key}' was cancelled")]
    Cancelled { key: String },
}

impl CacheError {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            CacheError::Fetch { key, .. }
            | CacheError::Timeout { key, .. }
            | CacheError::Cancelled { key } => key,
        }
    }
}

/// Failure reading or writing a durable snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization error for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid snapshot key '{0}'")]
    InvalidKey(String),
}
