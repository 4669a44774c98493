//! Stdio JSON-RPC Server
//!
//! Exposes the agent surface over JSON-RPC 2.0 on stdio (line-based), the
//! same transport contract as the CLI: stdout carries only protocol
//! payload, logs go to stderr.
//!
//! # Methods
//!
//! - `ask`: `{"question": "..."}` → `{"answer": "..."}`. The answer is
//!   either plain text or a JSON-encoded envelope (table/chart/confirm);
//!   callers attempt a structured parse before display.
//! - `execute_write`: `{"sql": "..."}` → `{"success": ..., "message": ...}`
//!   for a previously surfaced, user-confirmed statement.
//! - `context_summary`: no params → turn count, database kind, capability
//!   names.
//! - `clear_context`: no params → `{"cleared": true}`.
//!
//! The agent is constructed by the caller and passed in; the server holds
//! no global state.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

use crate::engine::{QueryExecutor, SchemaProvider};
use crate::model::LanguageModel;
use crate::pipeline::Agent;

// ============================================================================
// JSON-RPC 2.0 Structures
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn failure(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

// ============================================================================
// Server Loop
// ============================================================================

/// Run the stdio server until stdin closes
///
/// Each request is a single line of JSON; each response is a single line
/// of JSON. Requests are handled strictly in order; the agent processes
/// one question at a time.
#[allow(clippy::future_not_send)]
pub async fn serve<M, Q>(agent: &mut Agent<M, Q>) -> Result<()>
where
    M: LanguageModel,
    Q: SchemaProvider + QueryExecutor,
{
    let stdin = io::stdin();
    let reader = stdin.lock();
    let mut stdout = io::stdout();

    for line in reader.lines() {
        let line = line?;

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle_request(agent, request).await,
            Err(e) => JsonRpcResponse::failure(None, -32700, format!("Parse error: {e}")),
        };

        let response_json = serde_json::to_string(&response)?;
        writeln!(stdout, "{response_json}")?;
        stdout.flush()?;
    }

    Ok(())
}

/// Route a request to the matching agent operation
async fn handle_request<M, Q>(agent: &mut Agent<M, Q>, request: JsonRpcRequest) -> JsonRpcResponse
where
    M: LanguageModel,
    Q: SchemaProvider + QueryExecutor,
{
    let result = match request.method.as_str() {
        "ask" => handle_ask(agent, request.params).await,
        "execute_write" => handle_execute_write(agent, request.params).await,
        "context_summary" => serde_json::to_value(agent.context_summary()).map_err(Into::into),
        "clear_context" => {
            agent.clear_context();
            Ok(serde_json::json!({"cleared": true}))
        }
        other => {
            return JsonRpcResponse::failure(
                request.id,
                -32601,
                format!("Unknown method: {other}"),
            );
        }
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(e) => JsonRpcResponse::failure(request.id, -32603, e.to_string()),
    }
}

async fn handle_ask<M, Q>(agent: &mut Agent<M, Q>, params: Option<Value>) -> Result<Value>
where
    M: LanguageModel,
    Q: SchemaProvider + QueryExecutor,
{
    let question = string_param(params, "question")?;
    let envelope = agent.ask(&question).await;
    let answer = envelope.answer_text()?;

    Ok(serde_json::json!({ "answer": answer }))
}

async fn handle_execute_write<M, Q>(
    agent: &mut Agent<M, Q>,
    params: Option<Value>,
) -> Result<Value>
where
    M: LanguageModel,
    Q: SchemaProvider + QueryExecutor,
{
    let sql = string_param(params, "sql")?;
    let ack = agent.execute_write(&sql).await;

    Ok(serde_json::to_value(ack)?)
}

/// Extract a required string parameter
fn string_param(params: Option<Value>, key: &str) -> Result<String> {
    params
        .as_ref()
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("missing required parameter '{key}'"))
}
