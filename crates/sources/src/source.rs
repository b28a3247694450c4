//! The seam between the MCP layer and the upstream adapters.

use crate::adverse_events::{AdverseEventQuery, AdverseEventReport};
use crate::client::{OpenFdaClient, RxNavClient, UpstreamClient, UpstreamSettings};
use crate::error::Result;
use crate::label::LabelRecord;
use crate::names::{NameConversion, NameConversionReport};
use crate::rate_limit::RateLimiter;
use crate::recall::RecallReport;
use crate::rxnorm::InteractionReport;
use crate::shortage::ShortageReport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Every upstream lookup a tool can perform.
///
/// Implementations must not panic on upstream failures; they return `Err` instead. Callers that
/// need stronger guarantees (the profile aggregator) still contain panics themselves.
#[async_trait]
pub trait DrugDataSource: Send + Sync {
    async fn label(&self, drug_identifier: &str, identifier_type: &str) -> Result<LabelRecord>;

    async fn shortages(&self, search_term: &str, limit: u32) -> Result<ShortageReport>;

    async fn recalls(&self, search_term: &str, limit: u32) -> Result<RecallReport>;

    async fn adverse_events(&self, query: &AdverseEventQuery) -> Result<AdverseEventReport>;

    async fn interactions(&self, drugs: &[String]) -> Result<InteractionReport>;

    async fn convert_names(
        &self,
        drug_name: &str,
        kind: NameConversion,
    ) -> Result<NameConversionReport>;
}

/// Settings for one upstream host plus its request spacing.
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub upstream: UpstreamSettings,
    pub min_interval: Duration,
}

/// [`DrugDataSource`] backed by the public openFDA and RxNav APIs.
#[derive(Clone)]
pub struct LiveSources {
    openfda: OpenFdaClient,
    rxnav: RxNavClient,
}

impl LiveSources {
    #[must_use]
    pub fn new(openfda: OpenFdaClient, rxnav: RxNavClient) -> Self {
        Self { openfda, rxnav }
    }

    /// Build both clients, each with its own rate limiter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either base URL is invalid.
    pub fn from_settings(openfda: HostSettings, rxnav: HostSettings) -> Result<Self> {
        let openfda = OpenFdaClient::new(UpstreamClient::new(
            "openFDA",
            openfda.upstream,
            Arc::new(RateLimiter::new(openfda.min_interval)),
        )?);
        let rxnav = RxNavClient::new(UpstreamClient::new(
            "RxNav",
            rxnav.upstream,
            Arc::new(RateLimiter::new(rxnav.min_interval)),
        )?);
        Ok(Self::new(openfda, rxnav))
    }
}

#[async_trait]
impl DrugDataSource for LiveSources {
    async fn label(&self, drug_identifier: &str, identifier_type: &str) -> Result<LabelRecord> {
        self.openfda.fetch_label(drug_identifier, identifier_type).await
    }

    async fn shortages(&self, search_term: &str, limit: u32) -> Result<ShortageReport> {
        self.openfda.fetch_shortages(search_term, limit).await
    }

    async fn recalls(&self, search_term: &str, limit: u32) -> Result<RecallReport> {
        self.openfda.fetch_recalls(search_term, limit).await
    }

    async fn adverse_events(&self, query: &AdverseEventQuery) -> Result<AdverseEventReport> {
        self.openfda.fetch_adverse_events(query).await
    }

    async fn interactions(&self, drugs: &[String]) -> Result<InteractionReport> {
        self.rxnav.check_interactions(drugs).await
    }

    async fn convert_names(
        &self,
        drug_name: &str,
        kind: NameConversion,
    ) -> Result<NameConversionReport> {
        self.openfda.convert_names(drug_name, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medinfo_test_support::MockUpstream;
    use crate::error::SourceError;
    use crate::label::LABEL_PATH;
    use crate::shortage::SHORTAGE_PATH;
    use axum::http::StatusCode;
    use axum::{Json, Router, routing::get};
    use serde_json::json;

    fn host(base_url: &str) -> HostSettings {
        HostSettings {
            upstream: UpstreamSettings::new(base_url),
            min_interval: Duration::ZERO,
        }
    }

    #[test]
    fn from_settings_rejects_bad_urls() {
        let err = LiveSources::from_settings(host("::"), host("https://rxnav.example"))
            .err()
            .expect("invalid url");
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[tokio::test]
    async fn live_sources_route_to_openfda() {
        let app = Router::new()
            .route(
                LABEL_PATH,
                get(|| async { Json(json!({ "results": [{ "openfda": { "generic_name": ["X"] } }] })) }),
            )
            .route(SHORTAGE_PATH, get(|| async { StatusCode::NOT_FOUND }));
        let upstream = MockUpstream::start(app)
            .await
            .expect("mock upstream");
        let sources =
            LiveSources::from_settings(host(&upstream.base_url), host(&upstream.base_url))
                .expect("sources");
        let dyn_sources: &dyn DrugDataSource = &sources;

        let label = dyn_sources
            .label("x", "openfda.generic_name")
            .await
            .expect("label");
        assert_eq!(label.generic_names(), ["X".to_string()]);
        assert!(!dyn_sources.shortages("X", 10).await.expect("empty").has_shortages());
    }
}
