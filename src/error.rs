// Error handling module
// Defines the token lifecycle taxonomy and platform call errors

use thiserror::Error;

/// Errors raised while loading, validating or refreshing credentials
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    /// Credential storage missing, unreadable, unwritable or malformed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// OAuth client-credentials exchange failed
    #[error("Token refresh failed: {0}")]
    RefreshError(String),

    /// Remote service keeps rejecting the token after a refresh
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Token could not be confirmed (network failure or non-auth status)
    #[error("Transient error: {0}")]
    TransientError(String),
}

impl TokenError {
    /// Only transient failures are worth retrying by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenError::TransientError(_))
    }
}

/// Errors that can occur while calling the platform API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Could not obtain a usable access token
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Error status returned by the platform
    #[error("Platform API error: {status} - {message}")]
    PlatformApiError { status: u16, message: String },

    /// Anything else (request building, decoding, exhausted retries)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for token lifecycle operations
pub type Result<T> = std::result::Result<T, TokenError>;
