//! Error types for the upstream source adapters.

use thiserror::Error;

/// Failure of a single upstream lookup.
///
/// The `Display` output is what ends up in the `error` field of tool results, so messages are
/// written for end users rather than for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Client configuration errors (invalid base URL, HTTP client build failure).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream had no matching records.
    #[error("{0}")]
    NotFound(String),

    /// The upstream answered 429.
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Non-2xx response other than 404/429.
    #[error("API error: {status} {message}")]
    Http { status: u16, message: String },

    /// Connection, TLS or timeout failures.
    #[error("API request failed: {0}")]
    Transport(String),

    /// The body was not the JSON shape we expected.
    #[error("Failed to decode JSON response: {0}")]
    Decode(String),

    /// The body exceeded the configured size cap.
    #[error("Response too large: {0}")]
    ResponseTooLarge(String),
}

impl SourceError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Result type alias for source adapter operations.
pub type Result<T> = std::result::Result<T, SourceError>;
