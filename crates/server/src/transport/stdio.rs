//! Line-delimited JSON-RPC over stdin/stdout.

use crate::error::Result;
use crate::protocol::{self, McpHandler, Outgoing};
use tokio::io::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, BufReader};

/// Serve on the process's stdin/stdout until stdin closes.
///
/// # Errors
///
/// Returns an error if reading stdin or writing stdout fails.
pub async fn serve_stdio(handler: McpHandler) -> Result<()> {
    tracing::info!("serving MCP over stdio");
    serve_io(handler, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Read one JSON-RPC message per line from `input` and write one response per line to `output`.
///
/// A line that is not valid UTF-8 gets a parse error and the loop keeps going.
///
/// # Errors
///
/// Returns an error on I/O failure.
pub async fn serve_io<R, W>(handler: McpHandler, input: R, mut output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let resp = match std::str::from_utf8(&buf) {
            Ok(line) => handler.handle_text(line).await,
            Err(e) => {
                tracing::debug!(error = %e, "non-UTF-8 input line");
                Some(protocol::parse_error(format!("Parse error: invalid UTF-8: {e}")))
            }
        };
        if let Some(resp) = resp {
            write_line(&mut output, &resp).await?;
        }
    }
    tracing::info!("stdin closed; shutting down");
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, resp: &Outgoing) -> Result<()> {
    let mut out = serde_json::to_vec(resp)?;
    out.push(b'\n');
    output.write_all(&out).await?;
    output.flush().await?;
    Ok(())
}
