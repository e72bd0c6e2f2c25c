//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: [`init_tracing`] and [`serve_stdio`]
//! - **Results**: [`json_success`] for structured tool output
//! - **Errors**: [`IntoMcpError`] for mapping domain errors onto rmcp
//!
//! ```rust,ignore
//! use mcp_common::{init_tracing, serve_stdio};
//!
//! init_tracing("postgres_mcp")?;
//! serve_stdio(PostgresMcpServer::new(executor, None), "postgres-mcp").await?;
//! ```

pub mod error;
pub mod init;
pub mod result;

// Re-export commonly used items at crate root
pub use error::{internal_error, invalid_params, IntoMcpError, McpResult, ResultExt};
pub use init::{init_tracing, serve_stdio, LogFormat};
pub use result::json_success;

// Re-export rmcp types that are commonly needed
pub use rmcp::{model::CallToolResult, ErrorData as McpError};
