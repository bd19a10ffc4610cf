//! Error types for the grant SDK

use grant_api_client::ApiError;
use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
#[derive(Error, Debug)]
pub enum SdkError {
    /// Filter state rejected before any request was built
    #[error("Validation error: {0}")]
    Validation(String),

    /// A mutation was attempted without a user identity
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Network error (timeout, connection failure, non-success status)
    #[error("Network error: {0}")]
    Network(#[from] ApiError),

    /// Server answered with data that breaks the paging contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SdkError {
    /// True when the underlying failure was a 409 retryable conflict
    pub fn is_transient_conflict(&self) -> bool {
        matches!(self, SdkError::Network(e) if e.is_transient_conflict())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::InvalidResponse(err.to_string())
    }
}
