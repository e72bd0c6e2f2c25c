//! Database driver capability
//!
//! The executor only sees three operations: open a session from a
//! connection string, execute a statement on it, and walk the resulting
//! cursor. [`postgres`] provides the real implementation.
//!
//! Sessions are always held through [`ScopedSession`], which releases them
//! exactly once when dropped, whichever way the caller exits.

pub mod connection_string;
pub mod postgres;
pub mod values;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{ColumnDefinition, DriverError};

pub use postgres::PgConnector;

/// Opens database sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session for `connection_string`
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Session>, DriverError>;
}

/// A single open database session
#[async_trait]
pub trait Session: Send {
    /// Execute one statement and return a cursor over its first result set
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DriverError>;

    /// Ask the server to abandon whatever statement is running on this
    /// session. Succeeds when nothing is running.
    async fn cancel(&mut self) -> Result<(), DriverError>;

    /// Close the session. Called once, from [`ScopedSession`]'s `Drop`.
    fn release(&mut self);
}

/// Forward-only cursor over a result set
#[async_trait]
pub trait Cursor: Send {
    /// Column metadata in driver order
    fn columns(&self) -> &[ColumnDefinition];

    /// Next row with one entry per column, `None` marking SQL NULL.
    /// Returns `Ok(None)` once the result set is exhausted.
    async fn next_row(&mut self) -> Result<Option<Vec<Option<Value>>>, DriverError>;
}

/// Session handle that releases the underlying session on drop
pub struct ScopedSession {
    inner: Box<dyn Session>,
}

impl ScopedSession {
    pub async fn open(connector: &dyn Connector, connection_string: &str) -> Result<Self, DriverError> {
        let inner = connector.open(connection_string).await?;
        Ok(Self { inner })
    }

    pub async fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DriverError> {
        self.inner.execute(sql).await
    }

    pub async fn cancel(&mut self) -> Result<(), DriverError> {
        self.inner.cancel().await
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.inner.release();
        tracing::debug!("Database session released");
    }
}
