//! openFDA drug label adapter and label normalization.

use crate::client::OpenFdaClient;
use crate::error::{Result, SourceError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const LABEL_PATH: &str = "/drug/label.json";
pub const DEFAULT_IDENTIFIER_TYPE: &str = "openfda.generic_name";
pub const NOT_AVAILABLE: &str = "Not available";

/// The `openfda` harmonization block of a label document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OpenFdaBlock {
    #[serde(default, deserialize_with = "string_list")]
    pub brand_name: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub generic_name: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub manufacturer_name: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub route: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub dosage_form: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub strength: Vec<String>,
}

/// Typed view of the label fields we read. Unknown fields are ignored, and a known field with an
/// unexpected shape is treated as absent rather than failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabelDocument {
    #[serde(default, deserialize_with = "openfda_block")]
    pub openfda: Option<OpenFdaBlock>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub indications_and_usage: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub adverse_reactions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub warnings_and_cautions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub dosage_and_administration: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub patient_counseling_information: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub contraindications: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_list")]
    pub drug_interactions: Option<Vec<String>>,
}

/// A list of strings, a bare string (one element), or `None` for anything else.
/// Non-string list elements are dropped.
fn lenient_strings(value: Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s]),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn optional_string_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_strings(Value::deserialize(deserializer)?))
}

fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_strings(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn openfda_block<'de, D>(deserializer: D) -> std::result::Result<Option<OpenFdaBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        block @ Value::Object(_) => Ok(OpenFdaBlock::deserialize(block).ok()),
        _ => Ok(None),
    }
}

/// A successfully fetched label: the raw document (for passthrough) and its typed parse.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub raw: Value,
    pub document: LabelDocument,
}

impl LabelRecord {
    /// Parse a raw label document.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Decode`] if the document is not a JSON object.
    pub fn from_raw(raw: Value) -> Result<Self> {
        let document = LabelDocument::deserialize(&raw)?;
        Ok(Self { raw, document })
    }

    #[must_use]
    pub fn generic_names(&self) -> &[String] {
        self.document
            .openfda
            .as_ref()
            .map_or(&[], |o| o.generic_name.as_slice())
    }
}

/// Normalized label information as exposed in medication profiles.
///
/// Identification lists default to empty; clinical text fields default to `["Not available"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelInfo {
    pub brand_name: Vec<String>,
    pub generic_name: Vec<String>,
    pub manufacturer_name: Vec<String>,
    pub route: Vec<String>,
    pub dosage_form: Vec<String>,
    pub strength: Vec<String>,
    pub indications_and_usage: Vec<String>,
    pub adverse_reactions: Vec<String>,
    pub warnings_and_cautions: Vec<String>,
    pub dosage_and_administration: Vec<String>,
    pub patient_counseling_information: Vec<String>,
    pub contraindications: Vec<String>,
    pub drug_interactions: Vec<String>,
}

impl LabelInfo {
    /// The single normalize step for a label document. Pure.
    #[must_use]
    pub fn from_document(doc: &LabelDocument) -> Self {
        let openfda = doc.openfda.clone().unwrap_or_default();
        Self {
            brand_name: openfda.brand_name,
            generic_name: openfda.generic_name,
            manufacturer_name: openfda.manufacturer_name,
            route: openfda.route,
            dosage_form: openfda.dosage_form,
            strength: openfda.strength,
            indications_and_usage: clinical_or_default(doc.indications_and_usage.as_ref()),
            adverse_reactions: clinical_or_default(doc.adverse_reactions.as_ref()),
            warnings_and_cautions: clinical_or_default(doc.warnings_and_cautions.as_ref()),
            dosage_and_administration: clinical_or_default(doc.dosage_and_administration.as_ref()),
            patient_counseling_information: clinical_or_default(
                doc.patient_counseling_information.as_ref(),
            ),
            contraindications: clinical_or_default(doc.contraindications.as_ref()),
            drug_interactions: clinical_or_default(doc.drug_interactions.as_ref()),
        }
    }

    /// A label is "minimal" when it carries no identification data at all.
    #[must_use]
    pub fn is_minimal(&self) -> bool {
        [
            &self.brand_name,
            &self.generic_name,
            &self.manufacturer_name,
            &self.route,
            &self.dosage_form,
            &self.strength,
        ]
        .iter()
        .all(|v| v.is_empty())
    }
}

fn clinical_or_default(field: Option<&Vec<String>>) -> Vec<String> {
    match field {
        Some(v) if !v.is_empty() => v.clone(),
        _ => vec![NOT_AVAILABLE.to_string()],
    }
}

impl OpenFdaClient {
    /// Fetch the most relevant label for `drug_identifier`, searching by `identifier_type`
    /// (e.g. `openfda.generic_name`, `openfda.brand_name`, `openfda.product_ndc`).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] when openFDA has no matching label, or any transport /
    /// decode error from the upstream call.
    pub async fn fetch_label(
        &self,
        drug_identifier: &str,
        identifier_type: &str,
    ) -> Result<LabelRecord> {
        tracing::debug!(drug_identifier, identifier_type, "fetching drug label");
        let query = [
            ("search", format!("{identifier_type}:\"{drug_identifier}\"")),
            ("limit", "1".to_string()),
        ];

        let body = match self.upstream.get_json(LABEL_PATH, &query).await {
            Ok(v) => v,
            Err(SourceError::NotFound(_)) => return Err(no_label_found()),
            Err(e) => return Err(e),
        };

        let first = body
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .cloned()
            .ok_or_else(no_label_found)?;

        LabelRecord::from_raw(first)
    }
}

fn no_label_found() -> SourceError {
    SourceError::NotFound("No label information found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medinfo_test_support::MockUpstream;
    use crate::client::{UpstreamClient, UpstreamSettings};
    use crate::rate_limit::RateLimiter;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::{Json, Router, routing::get};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn openfda(base_url: &str) -> OpenFdaClient {
        OpenFdaClient::new(
            UpstreamClient::new(
                "openFDA",
                UpstreamSettings::new(base_url),
                Arc::new(RateLimiter::unlimited()),
            )
            .expect("client"),
        )
    }

    #[test]
    fn missing_clinical_fields_default_to_not_available() {
        let record = LabelRecord::from_raw(json!({
            "openfda": { "generic_name": ["LISINOPRIL"] }
        }))
        .expect("parse");

        let first = LabelInfo::from_document(&record.document);
        let second = LabelInfo::from_document(&record.document);
        assert_eq!(first, second);

        for field in [
            &first.indications_and_usage,
            &first.adverse_reactions,
            &first.warnings_and_cautions,
            &first.dosage_and_administration,
            &first.patient_counseling_information,
            &first.contraindications,
            &first.drug_interactions,
        ] {
            assert_eq!(field, &vec![NOT_AVAILABLE.to_string()]);
        }
        assert_eq!(first.generic_name, vec!["LISINOPRIL".to_string()]);
        assert!(first.brand_name.is_empty());
    }

    #[test]
    fn present_clinical_fields_are_kept_in_order() {
        let record = LabelRecord::from_raw(json!({
            "indications_and_usage": ["first", "second"],
        }))
        .expect("parse");
        let info = LabelInfo::from_document(&record.document);
        assert_eq!(info.indications_and_usage, vec!["first", "second"]);
    }

    #[test]
    fn minimal_predicate() {
        let none = LabelRecord::from_raw(json!({ "indications_and_usage": ["x"] })).expect("parse");
        assert!(LabelInfo::from_document(&none.document).is_minimal());

        let empty_block = LabelRecord::from_raw(json!({ "openfda": {} })).expect("parse");
        assert!(LabelInfo::from_document(&empty_block.document).is_minimal());

        let with_brand =
            LabelRecord::from_raw(json!({ "openfda": { "brand_name": ["Zestril"] } }))
                .expect("parse");
        assert!(!LabelInfo::from_document(&with_brand.document).is_minimal());
    }

    #[test]
    fn wrong_field_types_are_tolerated() {
        let record = LabelRecord::from_raw(json!({
            "openfda": {
                "generic_name": ["LISINOPRIL"],
                "brand_name": "Zestril",
                "route": 42
            },
            "indications_and_usage": "Hypertension",
            "adverse_reactions": { "unexpected": true },
            "warnings_and_cautions": ["Angioedema", 7]
        }))
        .expect("label with odd field types still parses");

        assert_eq!(record.generic_names(), ["LISINOPRIL".to_string()]);
        let info = LabelInfo::from_document(&record.document);
        assert_eq!(info.brand_name, vec!["Zestril"]);
        assert!(info.route.is_empty());
        assert_eq!(info.indications_and_usage, vec!["Hypertension"]);
        assert_eq!(info.adverse_reactions, vec![NOT_AVAILABLE]);
        assert_eq!(info.warnings_and_cautions, vec!["Angioedema"]);
        assert!(!info.is_minimal());

        let odd_block = LabelRecord::from_raw(json!({ "openfda": "n/a" })).expect("parse");
        assert!(odd_block.generic_names().is_empty());
    }

    #[test]
    fn non_object_document_is_decode_error() {
        let err = LabelRecord::from_raw(json!("not a label")).expect_err("string document");
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn fetch_label_builds_search_and_returns_first_result() {
        let app = Router::new().route(
            LABEL_PATH,
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({
                    "results": [
                        { "openfda": { "generic_name": ["LISINOPRIL"] }, "search": q.get("search"), "limit": q.get("limit") },
                        { "openfda": { "generic_name": ["IGNORED"] } }
                    ]
                }))
            }),
        );
        let upstream = MockUpstream::start(app)
            .await
            .expect("mock upstream");

        let record = openfda(&upstream.base_url)
            .fetch_label("Zestril", "openfda.brand_name")
            .await
            .expect("label");

        assert_eq!(record.generic_names(), ["LISINOPRIL".to_string()]);
        assert_eq!(record.raw["search"], "openfda.brand_name:\"Zestril\"");
        assert_eq!(record.raw["limit"], "1");
    }

    #[tokio::test]
    async fn fetch_label_not_found_and_empty_results() {
        let app = Router::new()
            .route(
                LABEL_PATH,
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"error": {"code": "NOT_FOUND", "message": "No matches found!"}})),
                    )
                }),
            );
        let upstream = MockUpstream::start(app)
            .await
            .expect("mock upstream");
        let err = openfda(&upstream.base_url)
            .fetch_label("nothing", DEFAULT_IDENTIFIER_TYPE)
            .await
            .expect_err("not found");
        assert_eq!(err.to_string(), "No label information found");

        let app = Router::new().route(LABEL_PATH, get(|| async { Json(json!({"results": []})) }));
        let upstream = MockUpstream::start(app)
            .await
            .expect("mock upstream");
        let err = openfda(&upstream.base_url)
            .fetch_label("nothing", DEFAULT_IDENTIFIER_TYPE)
            .await
            .expect_err("empty");
        assert!(err.is_not_found());
    }
}
