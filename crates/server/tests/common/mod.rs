#![allow(dead_code)]

use anyhow::Context as _;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse as _, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

pub use medinfo_test_support::{KillOnDrop, MockUpstream, pick_unused_port, wait_http_ok};

/// Env vars that would otherwise override the test config file.
const OVERRIDING_ENV: &[&str] = &[
    "MEDINFO_CONFIG",
    "MEDINFO_TRANSPORT",
    "MEDINFO_BIND",
    "OPENFDA_API_KEY",
    "OPENFDA_BASE_URL",
    "RXNAV_BASE_URL",
];

/// Mock openFDA that knows exactly one drug: lisinopril, with one current shortage.
pub async fn start_mock_openfda() -> anyhow::Result<MockUpstream> {
    let app = Router::new()
        .route("/drug/label.json", get(label))
        .route("/drug/shortages.json", get(shortages))
        .route("/drug/enforcement.json", get(|| async { not_found() }));
    MockUpstream::start(app).await
}

async fn label(Query(q): Query<HashMap<String, String>>) -> Response {
    let search = q.get("search").map(|s| s.to_ascii_lowercase()).unwrap_or_default();
    if !search.contains("lisinopril") {
        return not_found();
    }
    Json(json!({
        "meta": { "results": { "total": 1 } },
        "results": [{
            "openfda": {
                "brand_name": ["Zestril"],
                "generic_name": ["LISINOPRIL"],
                "manufacturer_name": ["Almatica Pharma LLC"],
                "route": ["ORAL"]
            },
            "indications_and_usage": ["Hypertension."]
        }]
    }))
    .into_response()
}

async fn shortages(Query(q): Query<HashMap<String, String>>) -> Response {
    let search = q.get("search").cloned().unwrap_or_default();
    if !search.contains("LISINOPRIL") {
        return not_found();
    }
    Json(json!({
        "results": [{
            "generic_name": "Lisinopril Tablets",
            "company_name": "Example Pharma",
            "status": "Current",
            "shortage_reason": "Demand increase",
            "initial_posting_date": "01/15/2025"
        }]
    }))
    .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "code": "NOT_FOUND", "message": "No matches found!" } })),
    )
        .into_response()
}

/// Write a config file pointing both upstreams at `base_url` with rate limiting disabled.
pub fn write_config(dir: &Path, base_url: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("medinfo.yaml");
    let yaml = format!(
        "openfda:\n  baseUrl: {base_url}\n  minIntervalMs: 0\n  timeoutSecs: 5\n\
         rxnav:\n  baseUrl: {base_url}/REST\n  minIntervalMs: 0\n  timeoutSecs: 5\n"
    );
    std::fs::write(&path, yaml).context("write config")?;
    Ok(path)
}

fn server_command(config_path: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_medinfo-mcp"));
    for var in OVERRIDING_ENV {
        cmd.env_remove(var);
    }
    cmd.arg("--config")
        .arg(config_path)
        .arg("--log-level")
        .arg("info");
    cmd
}

pub fn spawn_stdio(config_path: &Path) -> anyhow::Result<Child> {
    server_command(config_path)
        .arg("--transport")
        .arg("stdio")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn medinfo-mcp (stdio)")
}

pub fn spawn_http(config_path: &Path, port: u16) -> anyhow::Result<Child> {
    server_command(config_path)
        .arg("--transport")
        .arg("http")
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .stderr(Stdio::null())
        .spawn()
        .context("spawn medinfo-mcp (http)")
}

/// Parse `result.content[0].text` of a `tools/call` response.
pub fn tool_body(resp: &Value) -> anyhow::Result<Value> {
    let text = resp
        .pointer("/result/content/0/text")
        .and_then(Value::as_str)
        .context("tools/call missing result.content[0].text")?;
    serde_json::from_str(text).context("tool text is not JSON")
}

pub fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}
