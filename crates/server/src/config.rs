//! Command line, YAML file and environment configuration.
//!
//! Precedence is CLI flag > environment variable > config file > built-in default.

use crate::error::{Result, ServerError};
use clap::{Parser, ValueEnum};
use medinfo_sources::HostSettings;
use medinfo_sources::client::{OPENFDA_BASE_URL, RXNAV_BASE_URL, UpstreamSettings};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_OPENFDA_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_RXNAV_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// Line-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// `POST /mcp` (JSON) and `POST /mcp/stream` (NDJSON).
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "medinfo-mcp", version, about = "openFDA / RxNav medication tools over MCP")]
pub struct Cli {
    /// Optional YAML config file.
    #[arg(long, env = "MEDINFO_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, env = "MEDINFO_TRANSPORT", default_value_t = TransportMode::Stdio)]
    pub transport: TransportMode,

    /// Listen address for the HTTP transport.
    #[arg(long, env = "MEDINFO_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Log filter directive (e.g. `info`, `medinfo_mcp=debug`).
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, env = "MEDINFO_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, env = "OPENFDA_API_KEY", hide_env_values = true)]
    pub openfda_api_key: Option<String>,

    #[arg(long, env = "OPENFDA_BASE_URL")]
    pub openfda_base_url: Option<String>,

    #[arg(long, env = "RXNAV_BASE_URL")]
    pub rxnav_base_url: Option<String>,
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub openfda: UpstreamFileConfig,
    #[serde(default)]
    pub rxnav: UpstreamFileConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpstreamFileConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Minimum spacing between outbound requests to this host.
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
    #[serde(default)]
    pub max_response_bytes: Option<usize>,
}

impl UpstreamFileConfig {
    fn into_host_settings(
        self,
        default_base_url: &str,
        default_interval: Duration,
        base_url_override: Option<String>,
        api_key_override: Option<String>,
    ) -> Result<HostSettings> {
        let base_url = base_url_override
            .or(self.base_url)
            .unwrap_or_else(|| default_base_url.to_string());
        if base_url.trim().is_empty() {
            return Err(ServerError::Config("base URL must not be empty".to_string()));
        }

        let mut upstream = UpstreamSettings::new(base_url);
        upstream.api_key = api_key_override
            .or(self.api_key)
            .filter(|k| !k.trim().is_empty());
        if let Some(secs) = self.timeout_secs {
            if secs == 0 {
                return Err(ServerError::Config(
                    "timeoutSecs must be greater than zero".to_string(),
                ));
            }
            upstream.timeout = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_response_bytes {
            upstream.max_response_bytes = Some(max);
        }

        Ok(HostSettings {
            upstream,
            min_interval: self
                .min_interval_ms
                .map_or(default_interval, Duration::from_millis),
        })
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportMode,
    pub bind: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
    pub openfda: HostSettings,
    pub rxnav: HostSettings,
}

impl ServerConfig {
    /// Merge CLI/env values over the optional config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if a resolved value is
    /// invalid.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let file = match cli.config.as_deref() {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// # Errors
    ///
    /// Returns an error if a resolved upstream setting is invalid.
    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self> {
        let openfda = file.openfda.into_host_settings(
            OPENFDA_BASE_URL,
            DEFAULT_OPENFDA_INTERVAL,
            cli.openfda_base_url,
            cli.openfda_api_key,
        )?;
        // RxNav takes no API key.
        let rxnav = file.rxnav.into_host_settings(
            RXNAV_BASE_URL,
            DEFAULT_RXNAV_INTERVAL,
            cli.rxnav_base_url,
            None,
        )?;

        Ok(Self {
            transport: cli.transport,
            bind: cli.bind,
            log_level: cli.log_level,
            log_format: cli.log_format,
            openfda,
            rxnav,
        })
    }
}

/// Read and parse a YAML config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid config YAML.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ServerError::Config(format!("failed to read config {}: {e}", path.display()))
    })?;
    if text.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    let cfg: FileConfig = serde_yaml::from_str(&text)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["medinfo-mcp"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse cli")
    }

    #[test]
    fn defaults_point_at_public_apis() {
        let cfg = ServerConfig::resolve(cli(&[]), FileConfig::default()).expect("resolve");
        assert_eq!(cfg.openfda.upstream.base_url, OPENFDA_BASE_URL);
        assert_eq!(cfg.rxnav.upstream.base_url, RXNAV_BASE_URL);
        assert_eq!(cfg.openfda.min_interval, DEFAULT_OPENFDA_INTERVAL);
        assert_eq!(cfg.rxnav.min_interval, DEFAULT_RXNAV_INTERVAL);
    }

    #[test]
    fn file_values_apply_and_cli_overrides_them() {
        let file: FileConfig = serde_yaml::from_str(
            r"
openfda:
  baseUrl: http://file.example
  apiKey: from-file
  timeoutSecs: 3
  minIntervalMs: 0
rxnav:
  baseUrl: http://rxnav.example
",
        )
        .expect("yaml");

        let cfg = ServerConfig::resolve(cli(&["--openfda-api-key", "from-cli"]), file.clone())
            .expect("resolve");
        assert_eq!(cfg.openfda.upstream.base_url, "http://file.example");
        assert_eq!(cfg.openfda.upstream.api_key.as_deref(), Some("from-cli"));
        assert_eq!(cfg.openfda.upstream.timeout, Duration::from_secs(3));
        assert_eq!(cfg.openfda.min_interval, Duration::ZERO);
        assert_eq!(cfg.rxnav.upstream.base_url, "http://rxnav.example");

        let cfg = ServerConfig::resolve(
            cli(&["--openfda-base-url", "http://cli.example"]),
            file,
        )
        .expect("resolve");
        assert_eq!(cfg.openfda.upstream.base_url, "http://cli.example");
        assert_eq!(cfg.openfda.upstream.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn rejects_unknown_keys_and_zero_timeout() {
        assert!(serde_yaml::from_str::<FileConfig>("openfda:\n  baseURL: x\n").is_err());

        let file: FileConfig =
            serde_yaml::from_str("openfda:\n  timeoutSecs: 0\n").expect("yaml");
        let err = ServerConfig::resolve(cli(&[]), file).expect_err("zero timeout");
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_file_config_reads_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("medinfo.yaml");
        std::fs::write(&path, "rxnav:\n  minIntervalMs: 5\n").expect("write");
        let cfg = load_file_config(&path).expect("load");
        assert_eq!(cfg.rxnav.min_interval_ms, Some(5));

        let missing = load_file_config(&dir.path().join("nope.yaml")).expect_err("missing");
        assert!(matches!(missing, ServerError::Config(_)));
    }

    #[test]
    fn transport_flag_parses() {
        let parsed = cli(&["--transport", "http", "--bind", "127.0.0.1:9999"]);
        assert_eq!(parsed.transport, TransportMode::Http);
        assert_eq!(parsed.bind.port(), 9999);
    }
}
