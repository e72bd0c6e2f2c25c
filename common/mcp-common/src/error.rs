//! Error handling utilities for MCP servers
//!
//! Domain errors stay typed inside each server; this module is the single
//! place where they are flattened into rmcp's `ErrorData`.

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Conversion from a domain error into an MCP-compatible error
///
/// Implementors decide which failures are the caller's fault
/// (`invalid_params`) and which are the server's (`internal_error`).
///
/// ```rust,ignore
/// impl IntoMcpError for QueryError {
///     fn into_mcp_error(self) -> McpError {
///         match self {
///             QueryError::Validation(msg) => invalid_params(msg),
///             other => internal_error(other.to_string()),
///         }
///     }
/// }
/// ```
pub trait IntoMcpError {
    /// Convert this error into an MCP error
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(format!("JSON error: {}", self), None)
    }
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

/// Extension trait adding `to_mcp_err()` to any `Result` whose error
/// implements [`IntoMcpError`]
pub trait ResultExt<T> {
    /// Convert the error to an MCP error
    fn to_mcp_err(self) -> McpResult<T>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> McpResult<T> {
        self.map_err(IntoMcpError::into_mcp_error)
    }
}

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Create an invalid params error with a message
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}
