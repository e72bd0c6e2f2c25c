//! Server initialization utilities
//!
//! Tracing setup shared by every transport, plus the stdio serve loop used
//! when a server runs as an MCP child process.

use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

/// Output format for log lines, picked with `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (any case) means plain text
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }
}

/// Initialize tracing for a server crate
///
/// `RUST_LOG` takes precedence; without it `crate_name` logs at `info`.
/// Output always goes to stderr so that the stdio transport keeps stdout
/// for the protocol.
///
/// ```rust,ignore
/// mcp_common::init_tracing("postgres_mcp")?;
/// ```
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{}=info", crate_name)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let installed = match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

/// Serve an rmcp handler over stdin/stdout until the client disconnects
///
/// Tracing must already be initialized.
pub async fn serve_stdio<S>(server: S, name: &str) -> anyhow::Result<()>
where
    S: rmcp::ServerHandler,
{
    tracing::info!("Starting {} MCP server on stdio", name);

    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Server running, waiting for requests...");

    let reason = service.waiting().await?;

    tracing::info!(?reason, "Server shutting down");
    Ok(())
}
