mod common;

use anyhow::Context as _;
use serde_json::{Value, json};
use std::io::{BufRead as _, BufReader, Write as _};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stdio_session_builds_profile_from_mock_openfda() -> anyhow::Result<()> {
    let mock = common::start_mock_openfda().await?;
    let dir = tempfile::tempdir()?;
    let config = common::write_config(dir.path(), &mock.base_url)?;

    let mut server = common::KillOnDrop(common::spawn_stdio(&config)?);
    let mut stdin = server.0.stdin.take().context("child stdin")?;
    let stdout = server.0.stdout.take().context("child stdout")?;

    let messages = [
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {} }
        }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        common::tool_call(3, "get_medication_profile", json!({ "drug_identifier": "lisinopril" })),
    ];
    for msg in &messages {
        writeln!(stdin, "{msg}")?;
    }
    drop(stdin);

    let read = tokio::task::spawn_blocking(move || {
        BufReader::new(stdout)
            .lines()
            .map(|l| -> anyhow::Result<Value> { Ok(serde_json::from_str(&l?)?) })
            .collect::<anyhow::Result<Vec<Value>>>()
    });
    let responses = tokio::time::timeout(Duration::from_secs(30), read)
        .await
        .context("timed out reading stdio responses")???;

    assert_eq!(responses.len(), 3, "one response per request: {responses:?}");
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(
        responses[1]["result"]["tools"].as_array().map(Vec::len),
        Some(10)
    );

    let profile = common::tool_body(&responses[2])?;
    assert_eq!(profile["shortage_search_term"], "LISINOPRIL");
    assert_eq!(
        profile["overall_status"],
        "SUCCESS: Retrieved complete drug profile with current shortage information"
    );
    assert_eq!(profile["label_information"]["brand_name"], json!(["Zestril"]));
    assert_eq!(
        profile["label_information"]["adverse_reactions"],
        json!(["Not available"])
    );
    assert_eq!(
        profile["shortage_information"]["shortages"][0]["company_name"],
        "Example Pharma"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stdio_survives_non_utf8_line() -> anyhow::Result<()> {
    let mock = common::start_mock_openfda().await?;
    let dir = tempfile::tempdir()?;
    let config = common::write_config(dir.path(), &mock.base_url)?;

    let mut server = common::KillOnDrop(common::spawn_stdio(&config)?);
    let mut stdin = server.0.stdin.take().context("child stdin")?;
    let stdout = server.0.stdout.take().context("child stdout")?;

    writeln!(stdin, "{}", json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }))?;
    stdin.write_all(b"\xff\xfe garbage\n")?;
    writeln!(stdin, "{}", json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }))?;
    drop(stdin);

    let read = tokio::task::spawn_blocking(move || {
        BufReader::new(stdout)
            .lines()
            .map(|l| -> anyhow::Result<Value> { Ok(serde_json::from_str(&l?)?) })
            .collect::<anyhow::Result<Vec<Value>>>()
    });
    let responses = tokio::time::timeout(Duration::from_secs(30), read)
        .await
        .context("timed out reading stdio responses")???;

    assert_eq!(responses.len(), 3, "{responses:?}");
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["error"]["code"], -32700);
    assert_eq!(responses[1]["id"], Value::Null);
    assert_eq!(responses[2]["id"], 2);
    assert_eq!(responses[2]["result"], json!({}));
    Ok(())
}
