//! PostgreSQL MCP Server
//!
//! Serves read-only PostgreSQL queries as JSON-RPC over HTTP (`http`) or as
//! an MCP tool over stdio (`stdio`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use postgres_mcp::http::{self, HttpConfig};
use postgres_mcp::{Dispatcher, PgConnector, PostgresMcpConfig, PostgresMcpServer, QueryExecutor};

#[derive(Parser)]
#[command(name = "postgres-mcp")]
#[command(about = "Read-only PostgreSQL query server (JSON-RPC over HTTP or MCP over stdio)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.postgres-mcp/config.toml)
    #[arg(long, env = "POSTGRES_MCP_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON-RPC endpoint over HTTP
    Http {
        /// Interface to bind (overrides config)
        #[arg(long, env = "POSTGRES_MCP_HOST")]
        host: Option<String>,
        /// Port to bind (overrides config)
        #[arg(long, short, env = "POSTGRES_MCP_PORT")]
        port: Option<u16>,
        /// Allow cross-origin requests from any origin
        #[arg(long)]
        allow_any_origin: bool,
    },
    /// Serve the execute_query tool over MCP stdio
    Stdio,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    mcp_common::init_tracing("postgres_mcp")?;

    let config = match &cli.config {
        Some(path) => PostgresMcpConfig::load_from(path)?,
        None => PostgresMcpConfig::load_or_default(),
    };

    let connector = Arc::new(PgConnector::new(config.database.connect_timeout()));
    let executor = QueryExecutor::new(connector)
        .with_timeout(config.database.query_timeout())
        .with_connect_timeout(config.database.connect_timeout());

    match cli.command {
        Commands::Http {
            host,
            port,
            allow_any_origin,
        } => {
            let http_config = HttpConfig {
                host: host.unwrap_or(config.server.host),
                port: port.unwrap_or(config.server.port),
                allow_any_origin: allow_any_origin || config.server.allow_any_origin,
            };
            http::serve(http_config, Dispatcher::new(executor)).await
        }
        Commands::Stdio => {
            let server = PostgresMcpServer::new(executor, config.database.default_connection_string);
            mcp_common::serve_stdio(server, "postgres-mcp").await
        }
    }
}
