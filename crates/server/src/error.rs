//! Error types for the MedInfo MCP server.

use medinfo_sources::SourceError;
use thiserror::Error;

/// Startup and serving errors. Tool-level failures never surface here; they are reported inside
/// the MCP result envelope.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (invalid YAML, bad URLs, conflicting options)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (bind failure, logging already initialized)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Upstream client construction errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
