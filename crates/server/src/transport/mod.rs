//! I/O bindings around [`McpHandler`](crate::protocol::McpHandler).

pub mod http;
pub mod stdio;

pub use http::{router, serve_http};
pub use stdio::{serve_io, serve_stdio};
