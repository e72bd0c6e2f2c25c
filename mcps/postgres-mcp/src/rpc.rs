//! JSON-RPC style request dispatch
//!
//! Turns an untyped request envelope into a response envelope plus the HTTP
//! status it should travel with. Every path, including malformed input and
//! panics inside the executor, ends in a well-formed envelope.

use std::panic::AssertUnwindSafe;

use axum::http::StatusCode;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::executor::QueryExecutor;
use crate::types::{QueryError, QueryResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Method name routed to the query executor
pub const EXECUTE_QUERY: &str = "executeQuery";

/// Error codes carried in `error.code`
pub mod error_codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const QUERY_EXECUTION_ERROR: i32 = -32000;
}

// ============================================================================
// Request Envelope
// ============================================================================

/// Presence of the `params` member
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Absent,
    Object(Map<String, Value>),
    /// Present, but a string, number, array, or bool
    NotAnObject,
}

/// Recognized members of an inbound request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// `None` when missing, null, or blank
    pub id: Option<String>,
    /// `None` when missing, null, or blank
    pub method: Option<String>,
    pub params: Params,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("request must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl RequestEnvelope {
    pub fn parse(raw: &Value) -> Result<Self, EnvelopeError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| EnvelopeError::NotAnObject(json_kind(raw)))?;

        let params = match obj.get("params") {
            None | Some(Value::Null) => Params::Absent,
            Some(Value::Object(map)) => Params::Object(map.clone()),
            Some(_) => Params::NotAnObject,
        };

        Ok(Self {
            id: scalar_member(obj, "id"),
            method: scalar_member(obj, "method"),
            params,
        })
    }
}

/// Strings are taken as-is, other scalars in their JSON text form
fn scalar_member(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match obj.get(key)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

fn string_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Copy of the envelope that is safe to log: connection strings carry
/// passwords
fn redacted(raw: &Value) -> Value {
    let mut copy = raw.clone();
    if let Some(cs) = copy
        .get_mut("params")
        .and_then(|p| p.get_mut("connectionString"))
    {
        *cs = Value::String("***".to_string());
    }
    copy
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Exactly one of `result` or `error`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcOutcome {
    Result(QueryResult),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub id: String,
    pub jsonrpc: &'static str,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    pub fn result(id: impl Into<String>, result: QueryResult) -> Self {
        Self {
            id: id.into(),
            jsonrpc: JSONRPC_VERSION,
            outcome: RpcOutcome::Result(result),
        }
    }

    pub fn error(id: impl Into<String>, error: RpcError) -> Self {
        Self {
            id: id.into(),
            jsonrpc: JSONRPC_VERSION,
            outcome: RpcOutcome::Error(error),
        }
    }
}

pub type Reply = (StatusCode, RpcResponse);

fn client_error(id: String, code: i32, message: impl Into<String>) -> Reply {
    (
        StatusCode::BAD_REQUEST,
        RpcResponse::error(id, RpcError::new(code, message)),
    )
}

fn server_error(id: String, error: RpcError) -> Reply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        RpcResponse::error(id, error),
    )
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes request envelopes to the query executor
#[derive(Clone)]
pub struct Dispatcher {
    executor: QueryExecutor,
}

impl Dispatcher {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Handle a raw request body
    pub async fn handle_body(&self, body: &[u8]) -> Reply {
        match serde_json::from_slice::<Value>(body) {
            Ok(raw) => self.handle(raw).await,
            Err(e) => {
                tracing::error!(error = %e, "Error processing MCP request");
                internal_error(String::new(), "Internal error processing request", e.to_string())
            }
        }
    }

    /// Handle a parsed request envelope
    pub async fn handle(&self, raw: Value) -> Reply {
        tracing::info!(request = %redacted(&raw), "Received MCP request");

        let envelope = match RequestEnvelope::parse(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "Error processing MCP request");
                return internal_error(String::new(), "Internal error processing request", e.to_string());
            }
        };

        let id = envelope
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let Some(method) = envelope.method.as_deref() else {
            tracing::warn!(%id, "Missing method in MCP request");
            return client_error(id, error_codes::INVALID_REQUEST, "Invalid request: Missing method");
        };

        match method {
            EXECUTE_QUERY => self.execute_query(id, &envelope.params).await,
            other => {
                tracing::warn!(%id, method = other, "Unknown method");
                client_error(
                    id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                )
            }
        }
    }

    async fn execute_query(&self, id: String, params: &Params) -> Reply {
        let params = match params {
            Params::Object(map) => map,
            Params::Absent => {
                return client_error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Invalid params: Missing params object",
                )
            }
            Params::NotAnObject => {
                return client_error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Invalid params: params must be an object",
                )
            }
        };

        let Some(query) = string_param(params, "query") else {
            return client_error(id, error_codes::INVALID_PARAMS, "Invalid params: Missing query");
        };

        let Some(connection_string) = string_param(params, "connectionString") else {
            return client_error(
                id,
                error_codes::INVALID_PARAMS,
                "Invalid params: Missing connectionString",
            );
        };

        let outcome = AssertUnwindSafe(
            self.executor
                .execute_read_only_query(query, connection_string),
        )
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(result)) => (StatusCode::OK, RpcResponse::result(id, result)),
            Ok(Err(QueryError::Validation(message))) => client_error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Invalid params: {}", message),
            ),
            Ok(Err(e)) => {
                tracing::error!(%id, error = %e, "Error executing query");
                server_error(
                    id,
                    RpcError::new(error_codes::QUERY_EXECUTION_ERROR, "Error executing query")
                        .with_data(e.to_string()),
                )
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                tracing::error!(%id, detail = %detail, "Error handling executeQuery method");
                internal_error(id, "Internal error handling executeQuery", detail)
            }
        }
    }
}

fn internal_error(id: String, message: &str, detail: impl Into<Value>) -> Reply {
    server_error(
        id,
        RpcError::new(error_codes::INTERNAL_ERROR, message).with_data(detail),
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
