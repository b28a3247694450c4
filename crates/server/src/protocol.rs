//! Transport-independent JSON-RPC 2.0 handling for the MCP surface.
//!
//! Every transport hands raw messages to [`McpHandler`] and writes back whatever it returns.
//! `None` means "nothing to send" (notifications).

use crate::dispatcher::Dispatcher;
use rmcp::model::{
    CallToolRequestParams, ClientJsonRpcMessage, ClientRequest, CustomRequest, ErrorCode,
    ErrorData, Implementation, InitializeResult, JsonRpcError, JsonRpcResponse, JsonRpcVersion2_0,
    ListToolsResult, ProtocolVersion, RequestId, ServerCapabilities, ServerJsonRpcMessage,
    ServerResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V_2024_11_05;
pub const SERVER_NAME: &str = "medinfo-mcp";

/// What a transport writes back for one inbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Message(ServerJsonRpcMessage),
    /// An error for a message whose id could not be recovered; serialized with `"id": null`.
    Unaddressed(UnaddressedError),
    Batch(Vec<Outgoing>),
}

#[derive(Debug, Clone, Serialize)]
pub struct UnaddressedError {
    jsonrpc: JsonRpcVersion2_0,
    id: Option<RequestId>,
    error: ErrorData,
}

/// Parse error for input that never reached the handler (e.g. a line that is not UTF-8).
#[must_use]
pub fn parse_error(message: impl Into<String>) -> Outgoing {
    error_for(None, ErrorCode::PARSE_ERROR, message.into())
}

fn error_for(id: Option<RequestId>, code: ErrorCode, message: String) -> Outgoing {
    let error = ErrorData::new(code, message, None);
    match id {
        Some(id) => Outgoing::Message(ServerJsonRpcMessage::Error(JsonRpcError {
            jsonrpc: JsonRpcVersion2_0,
            id,
            error,
        })),
        None => Outgoing::Unaddressed(UnaddressedError {
            jsonrpc: JsonRpcVersion2_0,
            id: None,
            error,
        }),
    }
}

fn respond(id: RequestId, result: ServerResult) -> Outgoing {
    Outgoing::Message(ServerJsonRpcMessage::Response(JsonRpcResponse {
        jsonrpc: JsonRpcVersion2_0,
        id,
        result,
    }))
}

/// `initialize` params from clients that omit `capabilities` / `clientInfo`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialInitialize {
    protocol_version: Option<ProtocolVersion>,
}

#[derive(Clone)]
pub struct McpHandler {
    dispatcher: Arc<Dispatcher>,
}

impl McpHandler {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Handle one raw message (a single request or a batch array).
    pub async fn handle_text(&self, text: &str) -> Option<Outgoing> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(msg) => self.handle_value(msg).await,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable JSON-RPC message");
                Some(parse_error(format!("Parse error: {e}")))
            }
        }
    }

    pub async fn handle_value(&self, msg: Value) -> Option<Outgoing> {
        let Value::Array(items) = msg else {
            return self.handle_message(msg).await;
        };
        if items.is_empty() {
            return Some(error_for(
                None,
                ErrorCode::INVALID_REQUEST,
                "Invalid Request: empty batch".to_string(),
            ));
        }

        let mut responses = Vec::with_capacity(items.len());
        for item in items {
            if let Some(resp) = self.handle_message(item).await {
                responses.push(resp);
            }
        }
        (!responses.is_empty()).then_some(Outgoing::Batch(responses))
    }

    async fn handle_message(&self, msg: Value) -> Option<Outgoing> {
        let id = msg.get("id").and_then(|id| RequestId::deserialize(id).ok());
        let parsed = match ClientJsonRpcMessage::deserialize(msg) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "malformed JSON-RPC envelope");
                return Some(error_for(
                    id,
                    ErrorCode::INVALID_REQUEST,
                    "Invalid Request".to_string(),
                ));
            }
        };

        let request = match parsed {
            ClientJsonRpcMessage::Request(request) => request,
            ClientJsonRpcMessage::Notification(_) => {
                tracing::debug!("notification");
                return None;
            }
            ClientJsonRpcMessage::Response(_) | ClientJsonRpcMessage::Error(_) => {
                tracing::debug!("ignoring client response");
                return None;
            }
        };

        let id = request.id;
        let resp = match request.request {
            ClientRequest::InitializeRequest(req) => {
                respond(id, initialize_result(req.params.protocol_version))
            }
            ClientRequest::PingRequest(_) => respond(id, ServerResult::empty(())),
            ClientRequest::ListToolsRequest(_) => {
                let tools = self.dispatcher.list_tools();
                respond(
                    id,
                    ServerResult::ListToolsResult(ListToolsResult::with_all_items(tools)),
                )
            }
            ClientRequest::CallToolRequest(req) => {
                respond(id, self.tools_call(req.params).await)
            }
            ClientRequest::CustomRequest(custom) => loose_request(id, &custom),
            other => {
                let method = other.method().to_string();
                tracing::debug!(%method, "unknown method");
                error_for(
                    Some(id),
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                )
            }
        };
        Some(resp)
    }

    async fn tools_call(&self, params: CallToolRequestParams) -> ServerResult {
        let arguments = Value::Object(params.arguments.unwrap_or_default());
        let result = self.dispatcher.handle(&params.name, arguments).await;
        ServerResult::CallToolResult(result)
    }
}

/// Requests whose params did not fit the typed shape for their method.
fn loose_request(id: RequestId, custom: &CustomRequest) -> Outgoing {
    match custom.method.as_str() {
        "initialize" => {
            let version = custom
                .params_as::<PartialInitialize>()
                .ok()
                .flatten()
                .and_then(|p| p.protocol_version)
                .unwrap_or(DEFAULT_PROTOCOL_VERSION);
            respond(id, initialize_result(version))
        }
        "tools/call" => error_for(
            Some(id),
            ErrorCode::INVALID_PARAMS,
            "Invalid params: tools/call requires a string 'name' and object 'arguments'"
                .to_string(),
        ),
        method @ ("ping" | "tools/list") => error_for(
            Some(id),
            ErrorCode::INVALID_PARAMS,
            format!("Invalid params for {method}"),
        ),
        method => {
            tracing::debug!(method, "unknown method");
            error_for(
                Some(id),
                ErrorCode::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            )
        }
    }
}

fn initialize_result(protocol_version: ProtocolVersion) -> ServerResult {
    ServerResult::InitializeResult(InitializeResult {
        protocol_version,
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
        ..Default::default()
    })
}
