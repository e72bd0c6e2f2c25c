//! PostgreSQL MCP Library
//!
//! Read-only PostgreSQL queries behind a JSON-RPC style HTTP endpoint or an
//! MCP stdio tool.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use postgres_mcp::{Dispatcher, PgConnector, QueryExecutor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let executor = QueryExecutor::new(Arc::new(PgConnector::new(Duration::from_secs(15))));
//! let dispatcher = Dispatcher::new(executor);
//! let (status, response) = dispatcher.handle(request).await;
//! ```

pub mod config;
pub mod driver;
pub mod executor;
pub mod guard;
pub mod http;
pub mod rpc;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PostgresMcpConfig;
pub use driver::{Connector, Cursor, PgConnector, ScopedSession, Session};
pub use executor::QueryExecutor;
pub use rpc::{Dispatcher, RpcError, RpcOutcome, RpcResponse};
pub use server::{ExecuteQueryParams, PostgresMcpServer};
pub use types::{ColumnDefinition, DriverError, QueryError, QueryResult, Row};
