//! NLM RxNav adapters: RxCUI lookup, ingredient normalization and ingredient-based interaction
//! screening.

use crate::client::RxNavClient;
use crate::error::{Result, SourceError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Ingredients that trigger a bleeding-risk warning.
const ANTICOAGULANT_INGREDIENTS: &[&str] = &["warfarin", "aspirin", "clopidogrel"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrugIngredients {
    pub drug: String,
    pub rxcui: String,
    pub ingredients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PotentialInteraction {
    pub drug_a: String,
    pub drug_b: String,
    pub interaction_type: &'static str,
    pub common_ingredients: Vec<String>,
    pub severity: &'static str,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionReport {
    pub drugs_analyzed: Vec<String>,
    pub drug_details: Vec<DrugIngredients>,
    pub potential_interactions: Vec<PotentialInteraction>,
    pub safety_warnings: Vec<String>,
    pub summary: String,
    pub limitations: &'static str,
    pub data_source: &'static str,
    pub methodology: &'static str,
}

impl InteractionReport {
    /// Compare ingredient sets pairwise and flag anticoagulant/antiplatelet agents. Pure.
    #[must_use]
    pub fn analyze(drugs: Vec<String>, details: Vec<DrugIngredients>) -> Self {
        let mut potential_interactions = Vec::new();
        for (i, a) in details.iter().enumerate() {
            for b in &details[i + 1..] {
                if a.ingredients.is_empty() || b.ingredients.is_empty() {
                    continue;
                }
                let set_a: BTreeSet<&String> = a.ingredients.iter().collect();
                let common: Vec<String> = b
                    .ingredients
                    .iter()
                    .filter(|ing| set_a.contains(ing))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .cloned()
                    .collect();
                if !common.is_empty() {
                    potential_interactions.push(PotentialInteraction {
                        drug_a: a.drug.clone(),
                        drug_b: b.drug.clone(),
                        interaction_type: "Ingredient duplication",
                        common_ingredients: common,
                        severity: "Monitor for additive effects",
                        recommendation: "Consult pharmacist about potential duplication",
                    });
                }
            }
        }

        let safety_warnings = details
            .iter()
            .filter(|d| {
                d.ingredients.iter().any(|ing| {
                    ANTICOAGULANT_INGREDIENTS.contains(&ing.to_ascii_lowercase().as_str())
                })
            })
            .map(|d| {
                format!(
                    "{} contains anticoagulant/antiplatelet agents - monitor for bleeding risk",
                    d.drug
                )
            })
            .collect();

        let summary = format!(
            "Analyzed {} drugs, found {} potential interactions",
            drugs.len(),
            potential_interactions.len()
        );

        Self {
            drugs_analyzed: drugs,
            drug_details: details,
            potential_interactions,
            safety_warnings,
            summary,
            limitations: "Based on ingredient comparison only. For comprehensive interaction checking, consult pharmacist or clinical decision support system.",
            data_source: "RxNorm API (getRelatedByType method)",
            methodology: "Compares active ingredients to identify potential duplications and common interaction risks",
        }
    }
}

impl RxNavClient {
    /// Resolve a drug name to its first RxCUI using RxNorm's normalized search.
    ///
    /// # Errors
    ///
    /// Returns any transport, status or decode error from the upstream call.
    pub async fn find_rxcui(&self, drug_name: &str) -> Result<Option<String>> {
        let query = [("name", drug_name.to_string()), ("search", "2".to_string())];
        let body = self.upstream.get_json("/rxcui.json", &query).await?;
        Ok(body
            .pointer("/idGroup/rxnormId/0")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Ingredient (`TTY=IN`) names related to an RxCUI.
    ///
    /// # Errors
    ///
    /// Returns any transport, status or decode error from the upstream call.
    pub async fn related_ingredients(&self, rxcui: &str) -> Result<Vec<String>> {
        let query = [("tty", "IN".to_string())];
        let body = self
            .upstream
            .get_json(&format!("/rxcui/{rxcui}/related.json"), &query)
            .await?;

        let groups = body
            .pointer("/relatedGroup/conceptGroup")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(groups
            .iter()
            .filter(|g| g.get("tty").and_then(Value::as_str) == Some("IN"))
            .filter_map(|g| g.get("conceptProperties").and_then(Value::as_array))
            .flatten()
            .map(|c| {
                c.get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string()
            })
            .collect())
    }

    /// Screen a list of drugs for ingredient duplication.
    ///
    /// Ingredient lookups that fail are recorded as a note on that drug; a drug whose RxCUI
    /// cannot be resolved fails the whole check.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] naming the first unresolvable drug.
    pub async fn check_interactions(&self, drugs: &[String]) -> Result<InteractionReport> {
        let mut details = Vec::with_capacity(drugs.len());

        for drug in drugs {
            let rxcui = match self.find_rxcui(drug).await {
                Ok(Some(id)) => id,
                Ok(None) => return Err(rxcui_not_found(drug)),
                Err(e) => {
                    tracing::debug!(drug = %drug, error = %e, "rxcui lookup failed");
                    return Err(rxcui_not_found(drug));
                }
            };

            let entry = match self.related_ingredients(&rxcui).await {
                Ok(ingredients) => DrugIngredients {
                    drug: drug.clone(),
                    rxcui,
                    ingredients,
                    note: None,
                },
                Err(e) => DrugIngredients {
                    drug: drug.clone(),
                    rxcui,
                    ingredients: Vec::new(),
                    note: Some(format!("Could not retrieve ingredients: {e}")),
                },
            };
            details.push(entry);
        }

        Ok(InteractionReport::analyze(drugs.to_vec(), details))
    }
}

fn rxcui_not_found(drug: &str) -> SourceError {
    SourceError::NotFound(format!("Could not find RxCUI for drug: {drug}"))
}
