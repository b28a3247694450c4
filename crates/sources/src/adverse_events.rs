//! FDA Adverse Event Reporting System (FAERS) adapter.

use crate::client::OpenFdaClient;
use crate::error::{Result, SourceError};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

pub const EVENT_PATH: &str = "/drug/event.json";
/// Number of reports requested per search strategy.
const EVENT_FETCH_LIMIT: u32 = 100;
/// Number of events included in a report.
const EVENT_REPORT_CAP: usize = 20;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityFilter {
    #[default]
    All,
    Serious,
}

impl FromStr for SeverityFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "serious" => Ok(Self::Serious),
            other => Err(format!(
                "invalid severity_filter '{other}' (expected 'all' or 'serious')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdverseEventQuery {
    pub drug_name: String,
    /// Echoed back in the report; FAERS has no direct period filter here.
    pub time_period: String,
    pub severity: SeverityFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reaction {
    pub term: String,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdverseEvent {
    pub report_id: String,
    pub serious: String,
    pub outcome: String,
    pub reactions: Vec<Reaction>,
}

impl AdverseEvent {
    fn from_result(v: &Value) -> Self {
        let patient = v.get("patient");
        let reactions = patient
            .and_then(|p| p.get("reaction"))
            .and_then(Value::as_array)
            .map(|rs| {
                rs.iter()
                    .map(|r| Reaction {
                        term: string_or_unknown(r.get("reactionmeddrapt")),
                        outcome: string_or_unknown(r.get("reactionoutcome")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            report_id: string_or_unknown(v.get("safetyreportid")),
            serious: string_or_unknown(v.get("serious")),
            outcome: string_or_unknown(patient.and_then(|p| p.get("patientdeath"))),
            reactions,
        }
    }

    #[must_use]
    pub fn is_serious(&self) -> bool {
        self.serious == "1"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdverseEventReport {
    pub drug_name: String,
    pub time_period: String,
    pub total_reports: usize,
    pub serious_reports: usize,
    pub adverse_events: Vec<AdverseEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub data_source: &'static str,
}

impl AdverseEventReport {
    fn build(query: &AdverseEventQuery, results: &[Value]) -> Self {
        let mut events: Vec<AdverseEvent> = results.iter().map(AdverseEvent::from_result).collect();
        let serious_reports = events.iter().filter(|e| e.is_serious()).count();
        if query.severity == SeverityFilter::Serious {
            events.retain(AdverseEvent::is_serious);
        }
        let total_reports = events.len();
        events.truncate(EVENT_REPORT_CAP);

        Self {
            drug_name: query.drug_name.clone(),
            time_period: query.time_period.clone(),
            total_reports,
            serious_reports,
            adverse_events: events,
            status: None,
            data_source: "FDA FAERS Database",
        }
    }

    fn none_found(query: &AdverseEventQuery) -> Self {
        Self {
            drug_name: query.drug_name.clone(),
            time_period: query.time_period.clone(),
            total_reports: 0,
            serious_reports: 0,
            adverse_events: Vec::new(),
            status: Some(format!(
                "No adverse event reports found for '{}'",
                query.drug_name
            )),
            data_source: "FDA FAERS Database",
        }
    }
}

fn string_or_unknown(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "Unknown".to_string(),
    }
}

impl OpenFdaClient {
    /// Fetch FAERS reports mentioning `drug_name`, first as a medicinal product and then as an
    /// indication.
    ///
    /// A 429 is retried once after a one second pause.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::RateLimited`] if the retry is also throttled, or an HTTP error for
    /// statuses other than 404. Transport and decode failures move on to the next strategy.
    pub async fn fetch_adverse_events(
        &self,
        query: &AdverseEventQuery,
    ) -> Result<AdverseEventReport> {
        let strategies = [
            format!("patient.drug.medicinalproduct:\"{}\"", query.drug_name),
            format!("patient.drug.drugindication:\"{}\"", query.drug_name),
        ];

        for search in strategies {
            let params = [("search", search), ("limit", EVENT_FETCH_LIMIT.to_string())];

            let mut outcome = self.upstream.get_json(EVENT_PATH, &params).await;
            if matches!(outcome, Err(SourceError::RateLimited)) {
                tracing::debug!(drug = %query.drug_name, "FAERS rate limited; retrying once");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                outcome = self.upstream.get_json(EVENT_PATH, &params).await;
            }

            match outcome {
                Ok(body) => {
                    let results = body
                        .get("results")
                        .and_then(Value::as_array)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    if !results.is_empty() {
                        return Ok(AdverseEventReport::build(query, results));
                    }
                }
                Err(SourceError::NotFound(_)) => {}
                Err(e @ (SourceError::RateLimited | SourceError::Http { .. })) => return Err(e),
                Err(e) => {
                    tracing::debug!(drug = %query.drug_name, error = %e, "FAERS strategy failed");
                }
            }
        }

        Ok(AdverseEventReport::none_found(query))
    }
}
