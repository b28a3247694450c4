//! openFDA drug enforcement (recall) adapter.

use crate::client::OpenFdaClient;
use crate::error::{Result, SourceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RECALL_PATH: &str = "/drug/enforcement.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecallEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recall_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_recall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recalling_firm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recall_initiation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecallReport {
    pub recalls: Vec<RecallEntry>,
}

impl RecallReport {
    #[must_use]
    pub fn has_recalls(&self) -> bool {
        !self.recalls.is_empty()
    }
}

impl OpenFdaClient {
    /// Search enforcement reports whose product description or generic name matches.
    ///
    /// # Errors
    ///
    /// Returns any transport, status or decode error from the upstream call. A 404 (no
    /// matches) is an empty report.
    pub async fn fetch_recalls(&self, search_term: &str, limit: u32) -> Result<RecallReport> {
        tracing::debug!(search_term, limit, "fetching drug recalls");
        let query = [
            (
                "search",
                format!(
                    "product_description:\"{search_term}\" OR openfda.generic_name:\"{search_term}\""
                ),
            ),
            ("limit", limit.to_string()),
        ];

        let body = match self.upstream.get_json(RECALL_PATH, &query).await {
            Ok(v) => v,
            Err(SourceError::NotFound(_)) => return Ok(RecallReport::default()),
            Err(e) => return Err(e),
        };

        let recalls = body
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .map(RecallEntry::deserialize)
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        Ok(RecallReport { recalls })
    }
}
