//! Shortage trend analysis and batch formulary risk screening.

use chrono::{Months, NaiveDate};
use medinfo_sources::DrugDataSource;
use medinfo_sources::recall::RecallReport;
use medinfo_sources::shortage::{ShortageEntry, ShortageReport};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const MAX_BATCH_SIZE: usize = 25;
const BATCH_LOOKUP_LIMIT: u32 = 10;
const TREND_LOOKUP_LIMIT: u32 = 100;
const BATCH_TREND_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShortageFrequency {
    None,
    Low,
    Moderate,
    High,
}

impl ShortageFrequency {
    #[must_use]
    pub fn from_events(events: usize) -> Self {
        match events {
            0 => Self::None,
            1 => Self::Low,
            2..=4 => Self::Moderate,
            _ => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Minimal,
    Unknown,
}

impl RiskLevel {
    /// Supply risk from a drug's recent shortage history.
    #[must_use]
    pub fn from_trend(events: usize, current: usize) -> Self {
        if events >= 5 || current >= 2 {
            Self::High
        } else if events >= 2 || current >= 1 {
            Self::Medium
        } else if events == 1 {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Self::High => {
                "High shortage risk: identify therapeutic alternatives and secondary suppliers now"
            }
            Self::Medium => "Moderate shortage risk: monitor supply status and review inventory levels",
            Self::Low => "Low shortage risk: continue routine supply monitoring",
            Self::Minimal | Self::Unknown => "No recent shortage activity: standard monitoring",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketInsights {
    pub risk_level: RiskLevel,
    pub shortage_frequency: ShortageFrequency,
    pub companies_affected: usize,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendSummary {
    pub analysis_period: String,
    pub total_shortage_events: usize,
    pub status_breakdown: BTreeMap<String, usize>,
    pub market_insights: MarketInsights,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TrendSection {
    Summary(TrendSummary),
    Error { error: String },
}

/// openFDA shortage dates come as `MM/DD/YYYY` or `YYYYMMDD`.
#[must_use]
pub fn parse_shortage_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

fn entry_date(entry: &ShortageEntry) -> Option<NaiveDate> {
    entry
        .initial_posting_date
        .as_deref()
        .and_then(parse_shortage_date)
        .or_else(|| entry.update_date.as_deref().and_then(parse_shortage_date))
}

/// Summarize shortage records dated within `months_back` months of `today`. Pure.
///
/// Records without a parseable date are not counted.
#[must_use]
pub fn summarize_trend(entries: &[ShortageEntry], today: NaiveDate, months_back: u32) -> TrendSummary {
    let cutoff = today
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(NaiveDate::MIN);

    let recent: Vec<&ShortageEntry> = entries
        .iter()
        .filter(|e| entry_date(e).is_some_and(|d| d >= cutoff))
        .collect();

    let mut status_breakdown = BTreeMap::new();
    for entry in &recent {
        let status = entry
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown");
        *status_breakdown.entry(status.to_string()).or_insert(0) += 1;
    }

    let companies: BTreeSet<&str> = recent
        .iter()
        .filter_map(|e| e.company_name.as_deref())
        .collect();
    let current = recent.iter().filter(|e| e.is_current()).count();
    let risk_level = RiskLevel::from_trend(recent.len(), current);

    TrendSummary {
        analysis_period: format!("{months_back} months"),
        total_shortage_events: recent.len(),
        status_breakdown,
        market_insights: MarketInsights {
            risk_level,
            shortage_frequency: ShortageFrequency::from_events(recent.len()),
            companies_affected: companies.len(),
            recommendation: risk_level.recommendation(),
        },
    }
}

/// Fetch shortage history for `drug_name` and summarize it.
pub async fn analyze_market_trends(
    sources: &dyn DrugDataSource,
    drug_name: &str,
    months_back: u32,
    today: NaiveDate,
) -> TrendSection {
    match sources.shortages(drug_name, TREND_LOOKUP_LIMIT).await {
        Ok(report) => TrendSection::Summary(summarize_trend(&report.shortages, today, months_back)),
        Err(e) => {
            tracing::warn!(drug_name, error = %e, "trend lookup failed");
            TrendSection::Error {
                error: e.to_string(),
            }
        }
    }
}

/// Reject batches that are empty or larger than [`MAX_BATCH_SIZE`].
///
/// # Errors
///
/// Returns a user-facing message describing the violated bound.
pub fn validate_batch(drugs: &[String]) -> Result<(), String> {
    if drugs.is_empty() {
        return Err("drug_list must contain at least one drug".to_string());
    }
    if drugs.len() > MAX_BATCH_SIZE {
        return Err(format!(
            "Batch size limited to {MAX_BATCH_SIZE} drugs (received {})",
            drugs.len()
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortageSummary {
    pub total_records: usize,
    pub current_shortages: usize,
    pub companies_affected: Vec<String>,
}

impl ShortageSummary {
    fn from_report(report: &ShortageReport) -> Self {
        let companies: BTreeSet<&str> = report
            .shortages
            .iter()
            .filter_map(|e| e.company_name.as_deref())
            .collect();
        Self {
            total_records: report.shortages.len(),
            current_shortages: report.shortages.iter().filter(|e| e.is_current()).count(),
            companies_affected: companies.into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecallSummary {
    pub total_recalls: usize,
    pub classifications: Vec<String>,
}

impl RecallSummary {
    fn from_report(report: &RecallReport) -> Self {
        let classes: BTreeSet<&str> = report
            .recalls
            .iter()
            .filter_map(|r| r.classification.as_deref())
            .collect();
        Self {
            total_recalls: report.recalls.len(),
            classifications: classes.into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortage_summary: Option<ShortageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortage_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_summary: Option<RecallSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_trends: Option<TrendSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub drug_name: String,
    pub shortage_status: &'static str,
    pub recall_status: &'static str,
    pub risk_level: RiskLevel,
    pub details: BatchDetails,
}

impl BatchItem {
    fn has_shortages(&self) -> bool {
        self.details
            .shortage_summary
            .as_ref()
            .is_some_and(|s| s.total_records > 0)
    }

    fn has_recalls(&self) -> bool {
        self.details
            .recall_summary
            .as_ref()
            .is_some_and(|r| r.total_recalls > 0)
    }
}

/// Risk of one formulary item from its shortage and recall lookups.
#[must_use]
pub fn batch_risk(shortages: Option<&ShortageSummary>, recalls: Option<&RecallSummary>) -> RiskLevel {
    if shortages.is_none() && recalls.is_none() {
        return RiskLevel::Unknown;
    }
    let current = shortages.map_or(0, |s| s.current_shortages);
    let records = shortages.map_or(0, |s| s.total_records);
    let recall_count = recalls.map_or(0, |r| r.total_recalls);

    if (current > 0 && recall_count > 0) || current >= 2 {
        RiskLevel::High
    } else if records > 0 || recall_count > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_drugs_analyzed: usize,
    pub drugs_with_shortages: usize,
    pub drugs_with_recalls: usize,
    pub high_risk_drugs: usize,
    pub total_shortage_events: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub high_risk: Vec<String>,
    pub medium_risk: Vec<String>,
    pub low_risk: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_summary: BatchSummary,
    pub individual_analyses: Vec<BatchItem>,
    pub risk_assessment: RiskAssessment,
    pub formulary_recommendations: Vec<String>,
}

impl BatchReport {
    /// Reduce per-item results (in input order) into the batch report. Pure.
    #[must_use]
    pub fn from_items(items: Vec<BatchItem>) -> Self {
        let mut summary = BatchSummary {
            total_drugs_analyzed: items.len(),
            ..BatchSummary::default()
        };
        let mut risk = RiskAssessment::default();
        let mut unknown = Vec::new();

        for item in &items {
            if item.has_shortages() {
                summary.drugs_with_shortages += 1;
            }
            if item.has_recalls() {
                summary.drugs_with_recalls += 1;
            }
            summary.total_shortage_events += item
                .details
                .shortage_summary
                .as_ref()
                .map_or(0, |s| s.total_records);

            let name = item.drug_name.clone();
            match item.risk_level {
                RiskLevel::High => {
                    summary.high_risk_drugs += 1;
                    risk.high_risk.push(name);
                }
                RiskLevel::Medium => risk.medium_risk.push(name),
                RiskLevel::Low | RiskLevel::Minimal => risk.low_risk.push(name),
                RiskLevel::Unknown => unknown.push(name),
            }
        }

        let formulary_recommendations = recommendations(&summary, &risk, &unknown);
        Self {
            batch_summary: summary,
            individual_analyses: items,
            risk_assessment: risk,
            formulary_recommendations,
        }
    }
}

fn recommendations(summary: &BatchSummary, risk: &RiskAssessment, unknown: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    if !risk.high_risk.is_empty() {
        out.push(format!(
            "Identify therapeutic alternatives for high-risk drugs: {}",
            risk.high_risk.join(", ")
        ));
    }
    if !risk.medium_risk.is_empty() {
        out.push(format!(
            "Monitor supply and inventory levels for: {}",
            risk.medium_risk.join(", ")
        ));
    }
    if summary.drugs_with_recalls > 0 {
        out.push(format!(
            "Review recall notices for {} drug(s) and check affected lots",
            summary.drugs_with_recalls
        ));
    }
    if !unknown.is_empty() {
        out.push(format!(
            "Data unavailable for: {}; re-run analysis or check sources manually",
            unknown.join(", ")
        ));
    }
    if out.is_empty() {
        out.push("No immediate formulary action required; continue routine monitoring".to_string());
    }
    out
}

/// Screen each drug in order for shortages and recalls (and optionally trends).
///
/// Callers validate the batch size first; see [`validate_batch`].
pub async fn batch_drug_analysis(
    sources: &dyn DrugDataSource,
    drugs: &[String],
    include_trends: bool,
    today: NaiveDate,
) -> BatchReport {
    let mut items = Vec::with_capacity(drugs.len());

    for drug in drugs {
        let shortage = sources.shortages(drug, BATCH_LOOKUP_LIMIT).await;
        let recall = sources.recalls(drug, BATCH_LOOKUP_LIMIT).await;

        let (shortage_summary, shortage_error) = match &shortage {
            Ok(report) => (Some(ShortageSummary::from_report(report)), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let (recall_summary, recall_error) = match &recall {
            Ok(report) => (Some(RecallSummary::from_report(report)), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let shortage_status = match &shortage_summary {
            Some(s) if s.current_shortages > 0 => "Current shortage",
            Some(s) if s.total_records > 0 => "Shortage history",
            Some(_) => "No shortages found",
            None => "Lookup failed",
        };
        let recall_status = match &recall_summary {
            Some(r) if r.total_recalls > 0 => "Recalls found",
            Some(_) => "No recalls found",
            None => "Lookup failed",
        };

        let market_trends = if include_trends {
            Some(analyze_market_trends(sources, drug, BATCH_TREND_MONTHS, today).await)
        } else {
            None
        };

        let risk_level = batch_risk(shortage_summary.as_ref(), recall_summary.as_ref());
        tracing::debug!(drug = %drug, ?risk_level, "batch item analyzed");

        items.push(BatchItem {
            drug_name: drug.clone(),
            shortage_status,
            recall_status,
            risk_level,
            details: BatchDetails {
                shortage_summary,
                shortage_error,
                recall_summary,
                recall_error,
                market_trends,
            },
        });
    }

    BatchReport::from_items(items)
}
