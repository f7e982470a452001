//! JSON-RPC 2.0 over newline-delimited stdio, the Model Context Protocol
//! framing used by tool-calling clients.

pub mod catalog;

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, ServerError};
use catalog::ToolCatalog;

pub const PROTOCOL_VERSION: &str = "2025-06-18";

pub const INSTRUCTIONS: &str = "\
Tools for looking up financial instruments and computing technical indicators \
from their price history. Stocks, indices and crypto pairs are supported.

- Every tool returns a structured value: either the requested data or an \
object with a single `message` field explaining what went wrong.
- Periods and intervals are closed sets; see each tool's input schema.
- Indicators need enough candles for their window. When history is too \
short, widen the period, shorten the interval or reduce the window.";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: "2.0",
            id,
            result,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct Server {
    name: String,
    catalog: ToolCatalog,
}

impl Server {
    pub fn new(name: String, catalog: ToolCatalog) -> Self {
        Self { name, catalog }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    /// Serve requests from stdin until EOF or ctrl+c.
    pub async fn serve_stdio(&self) -> Result<(), Report<ServerError>> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(server = %self.name, version = env!("CARGO_PKG_VERSION"), "serving on stdio");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("ctrl+c received, shutting down");
                    break;
                }
                line = lines.next_line() => {
                    let Some(line) = line.change_context(ServerError::Read)? else {
                        info!("stdin closed, shutting down");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Some(response) = self.handle_line(&line).await {
                        let mut payload =
                            serde_json::to_vec(&response).change_context(ServerError::Encode)?;
                        payload.push(b'\n');
                        stdout.write_all(&payload).await.change_context(ServerError::Write)?;
                        stdout.flush().await.change_context(ServerError::Write)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Decode one line and dispatch it. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return Some(RpcResponse::new(
                    Value::Null,
                    Err(RpcError::new(PARSE_ERROR, format!("parse error: {e}"))),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(RpcResponse::new(
                id,
                Err(RpcError::new(INVALID_REQUEST, format!("invalid request: {e}"))),
            )),
        }
    }

    pub async fn handle(&self, request: RpcRequest) -> Option<RpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "notification received");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.catalog.descriptors() })),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        };

        Some(RpcResponse::new(id, outcome))
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": self.name, "version": env!("CARGO_PKG_VERSION") },
            "instructions": INSTRUCTIONS,
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: CallParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))?;

        match self.catalog.call(&params.name, params.arguments).await {
            Ok(response) => Ok(response.into_call_result()),
            Err(report) => Err(rpc_error(&report)),
        }
    }
}

fn rpc_error(report: &Report<CatalogError>) -> RpcError {
    let context = report.current_context();
    let code = match context {
        CatalogError::UnknownTool { .. } | CatalogError::InvalidArguments { .. } => INVALID_PARAMS,
        CatalogError::Encode { .. } => INTERNAL_ERROR,
    };
    let message = match report.downcast_ref::<serde_json::Error>() {
        Some(cause) => format!("{context}: {cause}"),
        None => context.to_string(),
    };
    RpcError::new(code, message)
}
