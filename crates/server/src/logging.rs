//! Tracing subscriber setup. Output always goes to stderr; stdout belongs to the stdio transport.

use crate::config::LogFormat;
use crate::error::{Result, ServerError};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if `directive` is not a valid filter or a global subscriber is already set.
pub fn init_tracing(directive: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| ServerError::Config(format!("invalid log filter '{directive}': {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    };
    installed.map_err(|e| ServerError::Startup(format!("failed to initialize logging: {e}")))
}
