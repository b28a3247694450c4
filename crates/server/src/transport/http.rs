//! HTTP front-ends: one JSON-RPC message (or batch) per `POST /mcp`, and newline-delimited
//! messages streamed back as NDJSON on `POST /mcp/stream`.

use crate::error::{Result, ServerError};
use crate::protocol::{McpHandler, Outgoing};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse as _, Response},
    routing::{get, post},
};
use futures::{StreamExt as _, stream};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

const NDJSON: &str = "application/x-ndjson";

pub fn router(handler: McpHandler) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(mcp_post))
        .route("/mcp/stream", post(mcp_stream))
        .with_state(handler)
}

/// Bind `addr` and serve until Ctrl-C / SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve_http(handler: McpHandler, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Startup(format!("failed to bind {addr}: {e}")))?;
    serve_on(listener, handler, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_on<F>(listener: TcpListener, handler: McpHandler, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "serving MCP over HTTP");
    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn mcp_post(State(handler): State<McpHandler>, body: String) -> Response {
    match handler.handle_text(&body).await {
        Some(resp) => Json(resp).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn mcp_stream(State(handler): State<McpHandler>, body: String) -> Response {
    let lines: Vec<String> = body
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_owned)
        .collect();
    tracing::debug!(messages = lines.len(), "streaming request");

    let responses = stream::iter(lines)
        .then(move |line| {
            let handler = handler.clone();
            async move { handler.handle_text(&line).await }
        })
        .filter_map(|resp| async move { resp.and_then(|v| ndjson_line(&v)) })
        .map(Ok::<_, Infallible>);

    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(responses)).into_response()
}

fn ndjson_line(resp: &Outgoing) -> Option<String> {
    match serde_json::to_string(resp) {
        Ok(mut line) => {
            line.push('\n');
            Some(line)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode response");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
