//! Shared HTTP plumbing for the upstream APIs.
//!
//! [`UpstreamClient`] owns one `reqwest::Client`, the upstream base URL, an optional API key and
//! the host's [`RateLimiter`]. Every adapter goes through [`UpstreamClient::get_json`], which maps
//! transport failures and non-2xx statuses into [`SourceError`].

use crate::error::{Result, SourceError};
use crate::rate_limit::RateLimiter;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default public openFDA base URL.
pub const OPENFDA_BASE_URL: &str = "https://api.fda.gov";
/// Default public RxNav REST base URL.
pub const RXNAV_BASE_URL: &str = "https://rxnav.nlm.nih.gov/REST";

/// Static settings for one upstream host.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    /// Sent as the `api_key` query parameter when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// `None` = unlimited.
    pub max_response_bytes: Option<usize>,
}

impl UpstreamSettings {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(15),
            max_response_bytes: Some(8 * 1024 * 1024),
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<UpstreamClientInner>,
}

struct UpstreamClientInner {
    name: &'static str,
    settings: UpstreamSettings,
    http: Client,
    limiter: Arc<RateLimiter>,
}

impl UpstreamClient {
    /// Build a client for one upstream host.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(
        name: &'static str,
        settings: UpstreamSettings,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        Url::parse(&settings.base_url).map_err(|e| {
            SourceError::Config(format!(
                "Invalid base URL '{}' for {name}: {e}",
                settings.base_url
            ))
        })?;

        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("medinfo-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(UpstreamClientInner {
                name,
                settings,
                http,
                limiter,
            }),
        })
    }

    /// Issue a GET against `path` (relative to the base URL) and decode the JSON body.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotFound`] on 404 (openFDA's "No matches found!")
    /// - [`SourceError::RateLimited`] on 429
    /// - [`SourceError::Http`] on any other non-2xx status
    /// - [`SourceError::Transport`] / [`SourceError::Decode`] for I/O and body failures
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let inner = &self.inner;
        let url = self.build_url(path, query)?;

        inner.limiter.acquire().await;
        tracing::debug!(upstream = inner.name, url = %redact_url(&url), "upstream GET");

        let response = inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(sanitize_reqwest_error(&e)))?;
        let status = response.status();
        let bytes =
            read_response_body_limited_bytes(response, inner.settings.max_response_bytes).await?;

        if status.is_success() {
            return serde_json::from_slice(&bytes).map_err(SourceError::from);
        }

        let message = upstream_error_message(&bytes, status);
        tracing::debug!(upstream = inner.name, status = status.as_u16(), %message, "upstream error");
        match status {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(message)),
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited),
            _ => Err(SourceError::Http {
                status: status.as_u16(),
                message,
            }),
        }
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let base = self.inner.settings.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))
            .map_err(|e| SourceError::Config(format!("Invalid URL: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            if let Some(key) = self.inner.settings.api_key.as_deref() {
                pairs.append_pair("api_key", key);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }
}

/// Client for the openFDA drug endpoints (label, shortages, enforcement, event).
#[derive(Clone)]
pub struct OpenFdaClient {
    pub(crate) upstream: UpstreamClient,
}

impl OpenFdaClient {
    #[must_use]
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

/// Client for the NLM RxNav REST API.
#[derive(Clone)]
pub struct RxNavClient {
    pub(crate) upstream: UpstreamClient,
}

impl RxNavClient {
    #[must_use]
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

async fn read_response_body_limited_bytes(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>> {
    let Some(max) = max_bytes else {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(sanitize_reqwest_error(&e)))?;
        return Ok(bytes.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(SourceError::ResponseTooLarge(format!(
            "{len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| SourceError::Transport(sanitize_reqwest_error(&e)))?
    {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(SourceError::ResponseTooLarge(format!(
                "exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }

    Ok(out)
}

/// openFDA errors look like `{"error": {"code": "NOT_FOUND", "message": "No matches found!"}}`.
fn upstream_error_message(bytes: &[u8], status: StatusCode) -> String {
    let from_body = serde_json::from_slice::<Value>(bytes).ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    from_body.unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string())
}

/// Drop credentials and the query string (which may carry `api_key`).
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
