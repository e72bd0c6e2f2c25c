//! MCP server implementation
//!
//! Exposes the read-only query executor as a single `execute_query` tool
//! for MCP clients that launch this binary over stdio.

use mcp_common::{
    internal_error, invalid_params, json_success, IntoMcpError, McpError, McpResult, ResultExt,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::executor::QueryExecutor;
use crate::types::{QueryError, QueryResult};

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for the execute_query tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteQueryParams {
    /// SQL query to execute. Only SELECT statements are allowed.
    pub query: String,

    /// PostgreSQL connection string (URL, `key=value`, or
    /// `Host=...;Database=...;` form). Defaults to the configured
    /// `default_connection_string`.
    #[serde(default, alias = "connectionString")]
    pub connection_string: Option<String>,
}

impl IntoMcpError for QueryError {
    fn into_mcp_error(self) -> McpError {
        match self {
            QueryError::Validation(message) => invalid_params(message),
            other => internal_error(format!("Error executing query: {}", other)),
        }
    }
}

// ============================================================================
// Server Implementation
// ============================================================================

/// PostgreSQL MCP Server
#[derive(Clone)]
pub struct PostgresMcpServer {
    executor: QueryExecutor,
    default_connection_string: Option<String>,
    tool_router: ToolRouter<Self>,
}

impl PostgresMcpServer {
    pub fn new(executor: QueryExecutor, default_connection_string: Option<String>) -> Self {
        Self {
            executor,
            default_connection_string,
            tool_router: Self::tool_router(),
        }
    }

    /// Run a tool call without the MCP framing
    pub async fn run_query(&self, params: ExecuteQueryParams) -> McpResult<QueryResult> {
        let connection_string = params
            .connection_string
            .filter(|cs| !cs.trim().is_empty())
            .or_else(|| self.default_connection_string.clone())
            .ok_or_else(|| {
                invalid_params("Missing connection_string and no default_connection_string is configured")
            })?;

        self.executor
            .execute_read_only_query(&params.query, &connection_string)
            .await
            .to_mcp_err()
    }
}

#[tool_router]
impl PostgresMcpServer {
    /// Execute a read-only SQL query and return results
    #[tool(description = "Execute a read-only SQL query against a PostgreSQL database. Only SELECT statements are allowed. Returns column definitions (name and PostgreSQL type) and rows as JSON objects keyed by column name.")]
    async fn execute_query(
        &self,
        Parameters(params): Parameters<ExecuteQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.run_query(params).await?;
        json_success(&result)
    }
}

#[tool_handler]
impl rmcp::ServerHandler for PostgresMcpServer {
    fn get_info(&self) -> ServerInfo {
        let default = if self.default_connection_string.is_some() {
            "A default connection string is configured."
        } else {
            "No default connection string is configured; pass connection_string on every call."
        };
        ServerInfo {
            instructions: Some(format!(
                "Read-only PostgreSQL query MCP server. \
                Use execute_query to run SELECT statements. {}",
                default
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
