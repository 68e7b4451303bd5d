//! Error types for the feedcast system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for feedcast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the feedcast system
#[derive(Error, Debug)]
pub enum Error {
    /// Feed backend errors (source resolution, page fetch)
    #[error("Feed backend error: {0}")]
    FeedBackend(String),

    /// Message sink errors (destination resolution, delivery)
    #[error("Message sink error: {0}")]
    MessageSink(String),

    /// Source registry errors (listing, persistence)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from backend or sink APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Source, channel or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A poll cycle was requested while another one is still running
    #[error("A poll cycle is already in progress")]
    CycleInProgress,

    /// Plugin-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Plugin name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a feed backend error
    pub fn feed_backend(msg: impl Into<String>) -> Self {
        Self::FeedBackend(msg.into())
    }

    /// Create a message sink error
    pub fn message_sink(msg: impl Into<String>) -> Self {
        Self::MessageSink(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a plugin-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is expected to clear up on a later cycle
    ///
    /// Transient errors abort only the source or destination they occurred
    /// on; the next scheduler tick simply tries again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Http(_)
                | Self::RateLimited(_)
                | Self::Timeout(_)
                | Self::FeedBackend(_)
                | Self::MessageSink(_)
                | Self::Provider { .. }
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::timeout("send to 42").is_transient());
        assert!(Error::rate_limited("slow down").is_transient());
        assert!(!Error::config("bad").is_transient());
        assert!(!Error::registry("disk full").is_transient());
        assert!(!Error::CycleInProgress.is_transient());
    }

    #[test]
    fn test_provider_error_display() {
        let err = Error::provider("reddit", "HTTP 503");
        assert_eq!(err.to_string(), "Provider error (reddit): HTTP 503");
    }
}
