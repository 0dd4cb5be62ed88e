//! Unified error handling for the client.

use reqwest::StatusCode;

/// Client error type.
///
/// Storage and network failures are kept apart so that callers can degrade:
/// an unavailable store means "always go to the network", a network failure
/// on a write means "queue it locally".
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Local store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Engine error: {0}")]
    Engine(#[from] tablesync_engine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl SyncError {
    /// Whether the backend could not be reached or refused the request.
    pub fn is_network_failure(&self) -> bool {
        match self {
            SyncError::Network(e) => !e.is_decode(),
            SyncError::Status { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_a_network_failure() {
        let err = SyncError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            url: "http://localhost:1337/reviews/".into(),
        };
        assert!(err.is_network_failure());
        assert_eq!(
            err.to_string(),
            "Backend returned 500 Internal Server Error for http://localhost:1337/reviews/"
        );
    }

    #[test]
    fn parse_and_storage_are_not_network_failures() {
        assert!(!SyncError::Parse("bad".into()).is_network_failure());
        assert!(!SyncError::StorageUnavailable("quota".into()).is_network_failure());
    }

    #[test]
    fn json_errors_become_parse_failures() {
        let err: SyncError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, SyncError::Parse(_)));
    }
}
