//! Upstream source adapters for the MedInfo MCP server.
//!
//! Every adapter issues plain HTTP GETs against a public medical-data API (openFDA, NLM RxNav)
//! and returns a typed `Result`. Adapters never panic on upstream failures: transport errors,
//! non-2xx statuses and undecodable bodies all surface as [`SourceError`].
//!
//! The crate contains no MCP or transport logic; `medinfo-mcp` consumes it through the
//! [`DrugDataSource`] trait.

pub mod adverse_events;
pub mod client;
pub mod error;
pub mod label;
pub mod names;
pub mod rate_limit;
pub mod recall;
pub mod rxnorm;
pub mod shortage;
pub mod source;

pub use error::{Result, SourceError};
pub use source::{DrugDataSource, HostSettings, LiveSources};
