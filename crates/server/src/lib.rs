//! MedInfo MCP server.
//!
//! Exposes openFDA and RxNav medication data as MCP tools. One [`dispatcher::Dispatcher`] owns
//! the tool table; the stdio and HTTP transports are thin bindings around
//! [`protocol::McpHandler`].

pub mod analysis;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod profile;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod testing;

use crate::config::{ServerConfig, TransportMode};
use crate::dispatcher::Dispatcher;
use crate::protocol::McpHandler;
use medinfo_sources::LiveSources;
use std::sync::Arc;

pub use error::{Result, ServerError};

/// Build the live upstream clients and serve on the configured transport.
///
/// # Errors
///
/// Returns an error if the upstream clients cannot be built or the transport fails.
pub async fn run(config: ServerConfig) -> Result<()> {
    let sources = LiveSources::from_settings(config.openfda, config.rxnav)?;
    let handler = McpHandler::new(Dispatcher::new(Arc::new(sources)));

    tracing::info!(
        transport = ?config.transport,
        version = env!("CARGO_PKG_VERSION"),
        "starting medinfo-mcp"
    );
    match config.transport {
        TransportMode::Stdio => transport::serve_stdio(handler).await,
        TransportMode::Http => transport::serve_http(handler, config.bind).await,
    }
}
