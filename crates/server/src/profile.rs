//! Medication profile aggregation: label lookup, shortage lookup keyed on the label's generic
//! name, and a closed status classification over both outcomes.

use futures::FutureExt as _;
use medinfo_sources::label::{LabelInfo, LabelRecord};
use medinfo_sources::shortage::ShortageReport;
use medinfo_sources::{DrugDataSource, SourceError};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::panic::AssertUnwindSafe;

pub const LABEL_DATA_SOURCE: &str = "openFDA Drug Label API";
pub const SHORTAGE_DATA_SOURCE: &str =
    "openFDA Drug Shortages API (https://api.fda.gov/drug/shortages.json)";
const PROFILE_SHORTAGE_LIMIT: u32 = 10;
const UNKNOWN_LABEL_ERROR: &str = "Unknown label API error";

/// Outcome of the label half of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelState {
    Failed,
    Minimal,
    Full,
}

/// Outcome of the shortage half of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortageState {
    Failed,
    Empty,
    Found,
}

/// `overall_status` of a profile. Serialized as its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatus {
    BothFailed,
    ShortageWithoutLabel,
    NoShortageWithoutLabel,
    LabelWithShortageError,
    ShortageWithMinimalLabel,
    NoShortageWithMinimalLabel,
    CompleteWithShortage,
    CompleteNoShortage,
}

impl ProfileStatus {
    #[must_use]
    pub fn classify(label: LabelState, shortage: ShortageState) -> Self {
        match (label, shortage) {
            (LabelState::Failed, ShortageState::Failed) => Self::BothFailed,
            (LabelState::Failed, ShortageState::Found) => Self::ShortageWithoutLabel,
            (LabelState::Failed, ShortageState::Empty) => Self::NoShortageWithoutLabel,
            (_, ShortageState::Failed) => Self::LabelWithShortageError,
            (LabelState::Minimal, ShortageState::Found) => Self::ShortageWithMinimalLabel,
            (LabelState::Minimal, ShortageState::Empty) => Self::NoShortageWithMinimalLabel,
            (LabelState::Full, ShortageState::Found) => Self::CompleteWithShortage,
            (LabelState::Full, ShortageState::Empty) => Self::CompleteNoShortage,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::BothFailed => "Failed to retrieve label and shortage information",
            Self::ShortageWithoutLabel => {
                "Retrieved shortage data but failed to get label information"
            }
            Self::NoShortageWithoutLabel => "No shortage found and failed to get label information",
            Self::LabelWithShortageError => {
                "Retrieved label information but shortage API error occurred"
            }
            Self::ShortageWithMinimalLabel => {
                "Found shortage information but label data was minimal"
            }
            Self::NoShortageWithMinimalLabel => "No shortage found and label data was minimal",
            Self::CompleteWithShortage => {
                "SUCCESS: Retrieved complete drug profile with current shortage information"
            }
            Self::CompleteNoShortage => {
                "SUCCESS: Retrieved complete drug profile - no current shortages found"
            }
        }
    }
}

impl Serialize for ProfileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LabelSection {
    Info(LabelInfo),
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ShortageSection {
    Report(ShortageReport),
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSources {
    pub label_data: &'static str,
    pub shortage_data: &'static str,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            label_data: LABEL_DATA_SOURCE,
            shortage_data: SHORTAGE_DATA_SOURCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicationProfile {
    pub drug_identifier_requested: String,
    pub identifier_type_used: String,
    pub shortage_search_term: String,
    pub label_information: LabelSection,
    pub shortage_information: ShortageSection,
    pub data_sources: DataSources,
    pub overall_status: ProfileStatus,
}

/// Returned instead of a profile when assembly itself failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileFailure {
    pub error: String,
    pub drug_identifier_requested: String,
    pub identifier_type_used: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProfileOutcome {
    Profile(Box<MedicationProfile>),
    Failed(ProfileFailure),
}

/// The term sent to the shortage API: the label's first generic name when there is one,
/// otherwise the requested identifier.
#[must_use]
pub fn shortage_search_term(drug_identifier: &str, label: Option<&LabelRecord>) -> String {
    label
        .and_then(|l| l.generic_names().first())
        .filter(|name| !name.trim().is_empty())
        .map_or_else(|| drug_identifier.to_string(), Clone::clone)
}

/// Build a medication profile for `drug_identifier`.
///
/// Upstream failures are folded into the profile and its status. A panic in either lookup is
/// caught here and reported as [`ProfileOutcome::Failed`].
pub async fn build_medication_profile(
    sources: &dyn DrugDataSource,
    drug_identifier: &str,
    identifier_type: &str,
) -> ProfileOutcome {
    let assembled = AssertUnwindSafe(assemble(sources, drug_identifier, identifier_type))
        .catch_unwind()
        .await;

    match assembled {
        Ok(profile) => ProfileOutcome::Profile(Box::new(profile)),
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            tracing::error!(drug_identifier, identifier_type, %reason, "medication profile assembly panicked");
            ProfileOutcome::Failed(ProfileFailure {
                error: format!("Unexpected error while building medication profile: {reason}"),
                drug_identifier_requested: drug_identifier.to_string(),
                identifier_type_used: identifier_type.to_string(),
            })
        }
    }
}

async fn assemble(
    sources: &dyn DrugDataSource,
    drug_identifier: &str,
    identifier_type: &str,
) -> MedicationProfile {
    tracing::debug!(drug_identifier, identifier_type, "building medication profile");
    let label = sources.label(drug_identifier, identifier_type).await;

    let search_term = shortage_search_term(drug_identifier, label.as_ref().ok());
    if search_term != drug_identifier {
        tracing::debug!(drug_identifier, %search_term, "using label generic name for shortage lookup");
    }

    let shortage = sources.shortages(&search_term, PROFILE_SHORTAGE_LIMIT).await;

    let (label_information, label_state) = match label {
        Ok(record) => {
            let info = LabelInfo::from_document(&record.document);
            let state = if info.is_minimal() {
                LabelState::Minimal
            } else {
                LabelState::Full
            };
            (LabelSection::Info(info), state)
        }
        Err(e) => (
            LabelSection::Error {
                error: label_error_message(&e),
            },
            LabelState::Failed,
        ),
    };

    let (shortage_information, shortage_state) = match shortage {
        Ok(report) if report.has_shortages() => (ShortageSection::Report(report), ShortageState::Found),
        Ok(report) => (ShortageSection::Report(report), ShortageState::Empty),
        Err(e) => (
            ShortageSection::Error {
                error: e.to_string(),
            },
            ShortageState::Failed,
        ),
    };

    MedicationProfile {
        drug_identifier_requested: drug_identifier.to_string(),
        identifier_type_used: identifier_type.to_string(),
        shortage_search_term: search_term,
        label_information,
        shortage_information,
        data_sources: DataSources::default(),
        overall_status: ProfileStatus::classify(label_state, shortage_state),
    }
}

fn label_error_message(e: &SourceError) -> String {
    let msg = e.to_string();
    if msg.trim().is_empty() {
        UNKNOWN_LABEL_ERROR.to_string()
    } else {
        msg
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
