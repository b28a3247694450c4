//! Generic/brand name conversion backed by openFDA label harmonization data.

use crate::client::OpenFdaClient;
use crate::error::{Result, SourceError};
use crate::label::{LABEL_PATH, LabelDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;

const NAME_SEARCH_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NameConversion {
    Generic,
    Brand,
    #[default]
    Both,
}

impl NameConversion {
    fn wants_generic(self) -> bool {
        matches!(self, Self::Generic | Self::Both)
    }

    fn wants_brand(self) -> bool {
        matches!(self, Self::Brand | Self::Both)
    }
}

impl FromStr for NameConversion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "brand" => Ok(Self::Brand),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "invalid conversion_type '{other}' (expected 'generic', 'brand' or 'both')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameConversionReport {
    pub original_drug: String,
    pub conversion_type: NameConversion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_names: Option<Vec<String>>,
    pub data_source: &'static str,
}

impl NameConversionReport {
    fn from_documents(drug_name: &str, kind: NameConversion, docs: &[LabelDocument]) -> Self {
        let mut generic = BTreeSet::new();
        let mut brand = BTreeSet::new();
        for openfda in docs.iter().filter_map(|d| d.openfda.as_ref()) {
            generic.extend(openfda.generic_name.iter().cloned());
            brand.extend(openfda.brand_name.iter().cloned());
        }

        Self {
            original_drug: drug_name.to_string(),
            conversion_type: kind,
            generic_names: kind.wants_generic().then(|| generic.into_iter().collect()),
            brand_names: kind.wants_brand().then(|| brand.into_iter().collect()),
            data_source: "OpenFDA Drug Labels",
        }
    }
}

impl OpenFdaClient {
    /// Look `drug_name` up as a generic name, then as a brand name, and report the sorted,
    /// deduplicated names found on the first matching set of labels.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] when neither search yields labels. Upstream failures of
    /// one strategy fall through to the next.
    pub async fn convert_names(
        &self,
        drug_name: &str,
        kind: NameConversion,
    ) -> Result<NameConversionReport> {
        for field in ["openfda.generic_name", "openfda.brand_name"] {
            let query = [
                ("search", format!("{field}:\"{drug_name}\"")),
                ("limit", NAME_SEARCH_LIMIT.to_string()),
            ];

            let body = match self.upstream.get_json(LABEL_PATH, &query).await {
                Ok(body) => body,
                Err(e) => {
                    if !e.is_not_found() {
                        tracing::debug!(drug_name, field, error = %e, "name search failed");
                    }
                    continue;
                }
            };

            let docs: Vec<LabelDocument> = body
                .get("results")
                .and_then(Value::as_array)
                .map(|rs| {
                    rs.iter()
                        .filter_map(|r| LabelDocument::deserialize(r).ok())
                        .collect()
                })
                .unwrap_or_default();
            if !docs.is_empty() {
                return Ok(NameConversionReport::from_documents(drug_name, kind, &docs));
            }
        }

        Err(SourceError::NotFound(format!(
            "No name conversion data found for '{drug_name}'"
        )))
    }
}
