//! Error types for the grants API client

use thiserror::Error;

/// Grants API client error
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection refused, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request exceeded the configured transport timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered 409 Conflict
    ///
    /// `retryable` mirrors the `{ "retryable": true }` flag the server sets
    /// while a backing table is temporarily unavailable.
    #[error("Conflict (retryable: {retryable}): {message}")]
    Conflict { retryable: bool, message: String },

    /// Server returned any other non-success status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body did not match the documented contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed from its configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// True for the 409 + `retryable: true` signal and nothing else
    pub fn is_transient_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { retryable: true, .. })
    }

    /// Wrap a reqwest error, splitting out timeouts
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else {
            ApiError::Http(err)
        }
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_retryable_conflict_is_transient() {
        let transient = ApiError::Conflict {
            retryable: true,
            message: "table busy".into(),
        };
        let permanent = ApiError::Conflict {
            retryable: false,
            message: "duplicate".into(),
        };
        let server = ApiError::Server {
            status: 503,
            message: "unavailable".into(),
        };

        assert!(transient.is_transient_conflict());
        assert!(!permanent.is_transient_conflict());
        assert!(!server.is_transient_conflict());
        assert!(!ApiError::Timeout("30s".into()).is_transient_conflict());
    }
}
