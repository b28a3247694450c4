//! openFDA drug shortage adapter.

use crate::client::OpenFdaClient;
use crate::error::{Result, SourceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SHORTAGE_PATH: &str = "/drug/shortages.json";

/// One shortage record. Every field is optional upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShortageEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proprietary_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "shortage_reason")]
    pub reason: Option<String>,
    #[serde(default, alias = "estimated_shortage_duration")]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub information_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_posting_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_date: Option<String>,
}

impl ShortageEntry {
    /// Whether openFDA reports this shortage as ongoing.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("current"))
    }
}

/// Successful shortage lookup. `shortages` is always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShortageReport {
    pub shortages: Vec<ShortageEntry>,
}

impl ShortageReport {
    #[must_use]
    pub fn has_shortages(&self) -> bool {
        !self.shortages.is_empty()
    }

    /// Parse an openFDA `{ "results": [...] }` body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Decode`] if a record has an unexpected shape.
    pub fn from_body(body: &Value) -> Result<Self> {
        let Some(results) = body.get("results").and_then(Value::as_array) else {
            return Ok(Self::default());
        };
        let shortages = results
            .iter()
            .map(ShortageEntry::deserialize)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { shortages })
    }
}

impl OpenFdaClient {
    /// Search shortage records by generic or proprietary name.
    ///
    /// openFDA answers 404 when nothing matches; that is reported as an empty list, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns any transport, status or decode error from the upstream call.
    pub async fn fetch_shortages(&self, search_term: &str, limit: u32) -> Result<ShortageReport> {
        tracing::debug!(search_term, limit, "fetching drug shortages");
        let query = [
            (
                "search",
                format!("generic_name:\"{search_term}\" OR proprietary_name:\"{search_term}\""),
            ),
            ("limit", limit.to_string()),
        ];

        match self.upstream.get_json(SHORTAGE_PATH, &query).await {
            Ok(body) => ShortageReport::from_body(&body),
            Err(SourceError::NotFound(_)) => Ok(ShortageReport::default()),
            Err(e) => Err(e),
        }
    }
}
