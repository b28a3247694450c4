//! Tool registry and dispatch.
//!
//! One table ([`ToolKind`]) drives both `tools/list` and `tools/call`; every transport shares the
//! same [`Dispatcher`].

use crate::analysis::{self, MAX_BATCH_SIZE};
use crate::profile::{self, LABEL_DATA_SOURCE, SHORTAGE_DATA_SOURCE};
use chrono::Utc;
use medinfo_sources::DrugDataSource;
use medinfo_sources::adverse_events::{AdverseEventQuery, SeverityFilter};
use medinfo_sources::label::DEFAULT_IDENTIFIER_TYPE;
use medinfo_sources::names::NameConversion;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const DEFAULT_MONTHS_BACK: i64 = 12;
const MAX_MONTHS_BACK: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    MedicationProfile,
    LabelOnly,
    SearchShortages,
    ShortageGuidance,
    SearchRecalls,
    CheckInteractions,
    ConvertNames,
    AdverseEvents,
    MarketTrends,
    BatchAnalysis,
}

impl ToolKind {
    pub const ALL: [Self; 10] = [
        Self::MedicationProfile,
        Self::LabelOnly,
        Self::SearchShortages,
        Self::ShortageGuidance,
        Self::SearchRecalls,
        Self::CheckInteractions,
        Self::ConvertNames,
        Self::AdverseEvents,
        Self::MarketTrends,
        Self::BatchAnalysis,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MedicationProfile => "get_medication_profile",
            Self::LabelOnly => "get_drug_label_only",
            Self::SearchShortages => "search_drug_shortages",
            Self::ShortageGuidance => "get_shortage_search_guidance",
            Self::SearchRecalls => "search_drug_recalls",
            Self::CheckInteractions => "check_drug_interactions",
            Self::ConvertNames => "convert_drug_names",
            Self::AdverseEvents => "get_adverse_events",
            Self::MarketTrends => "analyze_drug_market_trends",
            Self::BatchAnalysis => "batch_drug_analysis",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::MedicationProfile => {
                "Retrieve FDA label information and current shortage status for a medication. \
                 The shortage lookup uses the label's generic name when one is found."
            }
            Self::LabelOnly => "Retrieve only the FDA-approved drug label for a medication.",
            Self::SearchShortages => "Search openFDA drug shortage records by generic or brand name.",
            Self::ShortageGuidance => {
                "openFDA shortage results plus search strategies and authoritative sources for \
                 current shortage information."
            }
            Self::SearchRecalls => "Search openFDA drug enforcement (recall) reports.",
            Self::CheckInteractions => {
                "Check two or more medications for ingredient duplication and bleeding-risk \
                 agents using RxNorm ingredient data."
            }
            Self::ConvertNames => "Convert between generic and brand drug names using FDA label data.",
            Self::AdverseEvents => "Summarize FDA FAERS adverse event reports for a medication.",
            Self::MarketTrends => {
                "Analyze a drug's shortage history over recent months and assess supply risk."
            }
            Self::BatchAnalysis => {
                "Screen up to 25 drugs for shortages, recalls and supply risk, with formulary \
                 recommendations."
            }
        }
    }

    fn input_schema(self) -> Value {
        let identifier = json!({
            "drug_identifier": {
                "type": "string",
                "description": "Drug name (generic or brand), NDC, or other identifier"
            },
            "identifier_type": {
                "type": "string",
                "description": "openFDA label field to search (e.g. openfda.generic_name, openfda.brand_name, openfda.product_ndc)",
                "default": DEFAULT_IDENTIFIER_TYPE
            }
        });
        let search = json!({
            "search_term": { "type": "string", "description": "Drug name to search for" },
            "limit": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_LIMIT,
                "default": DEFAULT_LIMIT
            }
        });
        let drug_name = json!({ "type": "string", "description": "Drug name" });

        match self {
            Self::MedicationProfile | Self::LabelOnly => object_schema(identifier, &["drug_identifier"]),
            Self::SearchShortages | Self::SearchRecalls => object_schema(search, &["search_term"]),
            Self::ShortageGuidance => {
                object_schema(json!({ "drug_name": drug_name }), &["drug_name"])
            }
            Self::CheckInteractions => object_schema(
                json!({
                    "drug1": { "type": "string", "description": "First medication" },
                    "drug2": { "type": "string", "description": "Second medication" },
                    "additional_drugs": {
                        "type": "array",
                        "items": { "type": "string" },
                        "default": []
                    }
                }),
                &["drug1", "drug2"],
            ),
            Self::ConvertNames => object_schema(
                json!({
                    "drug_name": drug_name,
                    "conversion_type": {
                        "type": "string",
                        "enum": ["generic", "brand", "both"],
                        "default": "both"
                    }
                }),
                &["drug_name"],
            ),
            Self::AdverseEvents => object_schema(
                json!({
                    "drug_name": drug_name,
                    "time_period": { "type": "string", "default": "1year" },
                    "severity_filter": {
                        "type": "string",
                        "enum": ["all", "serious"],
                        "default": "all"
                    }
                }),
                &["drug_name"],
            ),
            Self::MarketTrends => object_schema(
                json!({
                    "drug_name": drug_name,
                    "months_back": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_MONTHS_BACK,
                        "default": DEFAULT_MONTHS_BACK
                    }
                }),
                &["drug_name"],
            ),
            Self::BatchAnalysis => object_schema(
                json!({
                    "drug_list": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "maxItems": MAX_BATCH_SIZE
                    },
                    "include_trends": { "type": "boolean", "default": false }
                }),
                &["drug_list"],
            ),
        }
    }

    fn to_tool(self) -> Tool {
        let schema = match self.input_schema() {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        let mut tool = Tool::new(self.name(), self.description(), Arc::new(schema));
        // Every tool is a read-only GET against a public API.
        tool.annotations = Some(ToolAnnotations {
            title: None,
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint: Some(true),
        });
        tool
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("Unknown tool: {s}"))
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

#[derive(Debug, Deserialize)]
struct IdentifierArgs {
    drug_identifier: String,
    #[serde(default)]
    identifier_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    search_term: String,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DrugNameArgs {
    drug_name: String,
}

#[derive(Debug, Deserialize)]
struct InteractionArgs {
    drug1: String,
    drug2: String,
    #[serde(default)]
    additional_drugs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConvertArgs {
    drug_name: String,
    #[serde(default)]
    conversion_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdverseEventArgs {
    drug_name: String,
    #[serde(default)]
    time_period: Option<String>,
    #[serde(default)]
    severity_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendArgs {
    drug_name: String,
    #[serde(default)]
    months_back: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BatchArgs {
    drug_list: Vec<String>,
    #[serde(default)]
    include_trends: bool,
}

/// Reason a call was rejected before reaching any upstream.
#[derive(Debug)]
struct Invalid(Value);

impl Invalid {
    fn message(msg: impl Into<String>) -> Self {
        Self(json!({ "error": msg.into() }))
    }
}

type Handled = Result<Value, Invalid>;

fn parse_args<T: DeserializeOwned>(tool: ToolKind, args: Value) -> Result<T, Invalid> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| {
        Invalid::message(format!("Invalid arguments for tool '{}': {e}", tool.name()))
    })
}

fn require(field: &str, value: String) -> Result<String, Invalid> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Invalid::message(format!("'{field}' must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn clamp_u32(value: Option<i64>, default: i64, max: i64) -> u32 {
    u32::try_from(value.unwrap_or(default).clamp(1, max)).unwrap_or(1)
}

#[derive(Clone)]
pub struct Dispatcher {
    sources: Arc<dyn DrugDataSource>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(sources: Arc<dyn DrugDataSource>) -> Self {
        Self { sources }
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        ToolKind::ALL.into_iter().map(ToolKind::to_tool).collect()
    }

    /// Execute `tool_name` with JSON `arguments`.
    ///
    /// Invocation problems (unknown tool, missing/blank/invalid arguments, oversized batch)
    /// produce `isError: true`. Upstream failures are part of the tool's normal output.
    pub async fn handle(&self, tool_name: &str, arguments: Value) -> CallToolResult {
        let kind = match tool_name.parse::<ToolKind>() {
            Ok(k) => k,
            Err(msg) => {
                tracing::warn!(tool = tool_name, "unknown tool");
                return error_result(&json!({ "error": msg }));
            }
        };

        tracing::info!(tool = kind.name(), "tools/call");
        match self.dispatch(kind, arguments).await {
            Ok(body) => {
                let text = serde_json::to_string(&body).unwrap_or_else(|_| body.to_string());
                CallToolResult::success(vec![Content::text(text)])
            }
            Err(Invalid(body)) => {
                tracing::info!(tool = kind.name(), error = %body, "tool call rejected");
                error_result(&body)
            }
        }
    }

    async fn dispatch(&self, kind: ToolKind, args: Value) -> Handled {
        let sources = self.sources.as_ref();
        match kind {
            ToolKind::MedicationProfile => {
                let a: IdentifierArgs = parse_args(kind, args)?;
                let id = require("drug_identifier", a.drug_identifier)?;
                let id_type = optional_or(a.identifier_type, DEFAULT_IDENTIFIER_TYPE);
                let outcome = profile::build_medication_profile(sources, &id, &id_type).await;
                to_value(&outcome)
            }
            ToolKind::LabelOnly => {
                let a: IdentifierArgs = parse_args(kind, args)?;
                let id = require("drug_identifier", a.drug_identifier)?;
                let id_type = optional_or(a.identifier_type, DEFAULT_IDENTIFIER_TYPE);
                let label_data = match sources.label(&id, &id_type).await {
                    Ok(record) => record.raw,
                    Err(e) => json!({ "error": e.to_string() }),
                };
                Ok(json!({
                    "drug_identifier": id,
                    "identifier_type": id_type,
                    "label_data": label_data,
                    "data_source": LABEL_DATA_SOURCE,
                }))
            }
            ToolKind::SearchShortages => {
                let a: SearchArgs = parse_args(kind, args)?;
                let term = require("search_term", a.search_term)?;
                let limit = clamp_u32(a.limit, DEFAULT_LIMIT, MAX_LIMIT);
                let shortage_data = result_value(sources.shortages(&term, limit).await)?;
                Ok(json!({
                    "search_term": term,
                    "shortage_data": shortage_data,
                    "data_source": SHORTAGE_DATA_SOURCE,
                }))
            }
            ToolKind::ShortageGuidance => {
                let a: DrugNameArgs = parse_args(kind, args)?;
                let name = require("drug_name", a.drug_name)?;
                let limit = clamp_u32(None, DEFAULT_LIMIT, MAX_LIMIT);
                let openfda_results = result_value(sources.shortages(&name, limit).await)?;
                Ok(shortage_guidance(&name, openfda_results))
            }
            ToolKind::SearchRecalls => {
                let a: SearchArgs = parse_args(kind, args)?;
                let term = require("search_term", a.search_term)?;
                let limit = clamp_u32(a.limit, DEFAULT_LIMIT, MAX_LIMIT);
                let recall_data = result_value(sources.recalls(&term, limit).await)?;
                Ok(json!({
                    "search_term": term,
                    "recall_data": recall_data,
                    "data_source": "openFDA Drug Enforcement API",
                }))
            }
            ToolKind::CheckInteractions => {
                let a: InteractionArgs = parse_args(kind, args)?;
                let mut drugs = vec![require("drug1", a.drug1)?, require("drug2", a.drug2)?];
                drugs.extend(
                    a.additional_drugs
                        .into_iter()
                        .map(|d| d.trim().to_string())
                        .filter(|d| !d.is_empty()),
                );
                let interaction_analysis = result_value(sources.interactions(&drugs).await)?;
                Ok(json!({
                    "interaction_analysis": interaction_analysis,
                    "data_source": "RxNorm API (ingredient analysis)",
                    "analysis_type": "Basic Drug Safety Check",
                    "note": "Limited to ingredient comparison - consult pharmacist for comprehensive interaction checking",
                }))
            }
            ToolKind::ConvertNames => {
                let a: ConvertArgs = parse_args(kind, args)?;
                let name = require("drug_name", a.drug_name)?;
                let conversion = match a.conversion_type.as_deref().map(str::trim) {
                    None | Some("") => NameConversion::default(),
                    Some(raw) => raw.parse::<NameConversion>().map_err(Invalid::message)?,
                };
                let name_conversion = result_value(sources.convert_names(&name, conversion).await)?;
                Ok(json!({
                    "name_conversion": name_conversion,
                    "data_source": "openFDA Drug Label API",
                    "analysis_type": "Drug Name Conversion",
                    "note": "Uses existing FDA labeling data for name mapping",
                }))
            }
            ToolKind::AdverseEvents => {
                let a: AdverseEventArgs = parse_args(kind, args)?;
                let severity = match a.severity_filter.as_deref().map(str::trim) {
                    None | Some("") => SeverityFilter::default(),
                    Some(raw) => raw.parse::<SeverityFilter>().map_err(Invalid::message)?,
                };
                let query = AdverseEventQuery {
                    drug_name: require("drug_name", a.drug_name)?,
                    time_period: optional_or(a.time_period, "1year"),
                    severity,
                };
                let adverse_event_analysis = result_value(sources.adverse_events(&query).await)?;
                Ok(json!({
                    "adverse_event_analysis": adverse_event_analysis,
                    "data_source": "FDA FAERS (Adverse Event Reporting System)",
                    "analysis_type": "Post-Market Safety Surveillance",
                    "note": "Real-world adverse event data from healthcare providers and patients",
                }))
            }
            ToolKind::MarketTrends => {
                let a: TrendArgs = parse_args(kind, args)?;
                let name = require("drug_name", a.drug_name)?;
                let months = clamp_u32(a.months_back, DEFAULT_MONTHS_BACK, MAX_MONTHS_BACK);
                let today = Utc::now().date_naive();
                let trend = analysis::analyze_market_trends(sources, &name, months, today).await;
                Ok(json!({
                    "drug_name": name,
                    "trend_data": to_value(&trend)?,
                    "data_source": SHORTAGE_DATA_SOURCE,
                }))
            }
            ToolKind::BatchAnalysis => {
                let a: BatchArgs = parse_args(kind, args)?;
                if let Err(msg) = analysis::validate_batch(&a.drug_list) {
                    return Err(Invalid(json!({
                        "error": msg,
                        "max_batch_size": MAX_BATCH_SIZE,
                        "received": a.drug_list.len(),
                    })));
                }
                let drugs = a
                    .drug_list
                    .into_iter()
                    .map(|d| require("drug_list[]", d))
                    .collect::<Result<Vec<_>, _>>()?;
                let today = Utc::now().date_naive();
                let report =
                    analysis::batch_drug_analysis(sources, &drugs, a.include_trends, today).await;
                Ok(json!({
                    "batch_analysis": to_value(&report)?,
                    "data_source": "openFDA Drug Shortages and Enforcement APIs",
                }))
            }
        }
    }
}

fn shortage_guidance(drug_name: &str, openfda_results: Value) -> Value {
    json!({
        "drug_name": drug_name,
        "openfda_results": openfda_results,
        "additional_search_strategies": {
            "recommended_queries": [
                format!("{drug_name} shortage"),
                format!("{drug_name} drug shortage current"),
                format!("{drug_name} supply shortage FDA"),
                format!("ASHP {drug_name} shortage"),
            ],
            "authoritative_sources": {
                "ashp_database": {
                    "url": "https://www.ashp.org/drug-shortages/current-shortages",
                    "description": "American Society of Health-System Pharmacists shortage database",
                    "search_method": "Use site search or browse by drug name"
                },
                "fda_database": {
                    "url": "https://www.accessdata.fda.gov/scripts/drugshortages/",
                    "description": "Official FDA Drug Shortage Database",
                    "search_method": "Search by active ingredient or brand name"
                }
            }
        },
        "data_source": "Combined openFDA API + additional source guidance"
    })
}

fn to_value<T: serde::Serialize>(v: &T) -> Handled {
    serde_json::to_value(v)
        .map_err(|e| Invalid::message(format!("failed to serialize tool output: {e}")))
}

/// Upstream `Ok` payloads serialize as-is; `Err` becomes `{ "error": ... }`.
fn result_value<T: serde::Serialize>(r: medinfo_sources::Result<T>) -> Handled {
    match r {
        Ok(v) => to_value(&v),
        Err(e) => Ok(json!({ "error": e.to_string() })),
    }
}

fn error_result(body: &Value) -> CallToolResult {
    let text = serde_json::to_string(body).unwrap_or_else(|_| body.to_string());
    CallToolResult::error(vec![Content::text(text)])
}
