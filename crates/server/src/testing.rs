//! In-memory [`DrugDataSource`] for unit tests.

use async_trait::async_trait;
use medinfo_sources::adverse_events::{AdverseEventQuery, AdverseEventReport};
use medinfo_sources::label::LabelRecord;
use medinfo_sources::names::{NameConversion, NameConversionReport};
use medinfo_sources::recall::{RecallEntry, RecallReport};
use medinfo_sources::rxnorm::InteractionReport;
use medinfo_sources::shortage::{ShortageEntry, ShortageReport};
use medinfo_sources::{DrugDataSource, Result, SourceError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Canned outcome of one mocked call.
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Err(SourceError),
    Panic(&'static str),
}

impl<T: Clone> Reply<T> {
    fn resolve(&self) -> Result<T> {
        match self {
            Self::Ok(v) => Ok(v.clone()),
            Self::Err(e) => Err(e.clone()),
            Self::Panic(msg) => panic!("{msg}"),
        }
    }
}

struct Replies<T> {
    default: Reply<T>,
    by_term: HashMap<String, Reply<T>>,
}

impl<T: Clone> Replies<T> {
    fn new(default: Reply<T>) -> Self {
        Self {
            default,
            by_term: HashMap::new(),
        }
    }

    fn resolve(&self, term: &str) -> Result<T> {
        self.by_term.get(term).unwrap_or(&self.default).resolve()
    }
}

pub(crate) struct MockSources {
    label: Replies<LabelRecord>,
    shortages: Replies<ShortageReport>,
    recalls: Replies<RecallReport>,
    adverse_events: Replies<AdverseEventReport>,
    interactions: Reply<InteractionReport>,
    names: Replies<NameConversionReport>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl MockSources {
    pub(crate) fn new() -> Self {
        Self {
            label: Replies::new(Reply::Err(SourceError::NotFound(
                "No label information found".to_string(),
            ))),
            shortages: Replies::new(Reply::Ok(ShortageReport::default())),
            recalls: Replies::new(Reply::Ok(RecallReport::default())),
            adverse_events: Replies::new(Reply::Err(SourceError::NotFound(
                "no adverse events configured".to_string(),
            ))),
            interactions: Reply::Err(SourceError::NotFound(
                "no interactions configured".to_string(),
            )),
            names: Replies::new(Reply::Err(SourceError::NotFound(
                "no names configured".to_string(),
            ))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_label(mut self, reply: Reply<LabelRecord>) -> Self {
        self.label.default = reply;
        self
    }

    pub(crate) fn with_shortages(mut self, reply: Reply<ShortageReport>) -> Self {
        self.shortages.default = reply;
        self
    }

    pub(crate) fn with_shortages_for(mut self, term: &str, reply: Reply<ShortageReport>) -> Self {
        self.shortages.by_term.insert(term.to_string(), reply);
        self
    }

    pub(crate) fn with_recalls_for(mut self, term: &str, reply: Reply<RecallReport>) -> Self {
        self.recalls.by_term.insert(term.to_string(), reply);
        self
    }

    pub(crate) fn with_adverse_events(mut self, reply: Reply<AdverseEventReport>) -> Self {
        self.adverse_events.default = reply;
        self
    }

    pub(crate) fn with_interactions(mut self, reply: Reply<InteractionReport>) -> Self {
        self.interactions = reply;
        self
    }

    pub(crate) fn with_names(mut self, reply: Reply<NameConversionReport>) -> Self {
        self.names.default = reply;
        self
    }

    /// Search terms passed to `method`, in call order.
    pub(crate) fn calls(&self, method: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, term)| term.clone())
            .collect()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, method: &'static str, term: &str) {
        self.calls.lock().push((method, term.to_string()));
    }
}

#[async_trait]
impl DrugDataSource for MockSources {
    async fn label(&self, drug_identifier: &str, _identifier_type: &str) -> Result<LabelRecord> {
        self.record("label", drug_identifier);
        self.label.resolve(drug_identifier)
    }

    async fn shortages(&self, search_term: &str, _limit: u32) -> Result<ShortageReport> {
        self.record("shortages", search_term);
        self.shortages.resolve(search_term)
    }

    async fn recalls(&self, search_term: &str, _limit: u32) -> Result<RecallReport> {
        self.record("recalls", search_term);
        self.recalls.resolve(search_term)
    }

    async fn adverse_events(&self, query: &AdverseEventQuery) -> Result<AdverseEventReport> {
        self.record("adverse_events", &query.drug_name);
        self.adverse_events.resolve(&query.drug_name)
    }

    async fn interactions(&self, drugs: &[String]) -> Result<InteractionReport> {
        self.record("interactions", &drugs.join(","));
        self.interactions.resolve()
    }

    async fn convert_names(
        &self,
        drug_name: &str,
        _kind: NameConversion,
    ) -> Result<NameConversionReport> {
        self.record("convert_names", drug_name);
        self.names.resolve(drug_name)
    }
}

pub(crate) fn label(raw: Value) -> LabelRecord {
    LabelRecord::from_raw(raw).expect("label fixture")
}

pub(crate) fn shortage(status: &str, company: &str, posted: &str) -> ShortageEntry {
    ShortageEntry {
        status: Some(status.to_string()),
        company_name: Some(company.to_string()),
        initial_posting_date: Some(posted.to_string()),
        ..ShortageEntry::default()
    }
}

pub(crate) fn shortages(entries: Vec<ShortageEntry>) -> Reply<ShortageReport> {
    Reply::Ok(ShortageReport { shortages: entries })
}

pub(crate) fn recalls(count: usize) -> Reply<RecallReport> {
    Reply::Ok(RecallReport {
        recalls: (0..count)
            .map(|i| RecallEntry {
                recall_number: Some(format!("D-{i:04}-2025")),
                ..RecallEntry::default()
            })
            .collect(),
    })
}
