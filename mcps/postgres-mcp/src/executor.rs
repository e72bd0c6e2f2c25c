//! Read-only query execution
//!
//! Validates the statement, runs it on a freshly opened session, and
//! materializes the first result set as a [`QueryResult`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::driver::{Connector, ScopedSession};
use crate::guard;
use crate::types::{DriverError, QueryError, QueryResult, Row, READ_ONLY_VIOLATION};

/// Default statement timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on opening a session, handshake and authentication included
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs validated read-only statements
///
/// Holds no per-request state; one instance is shared by every request.
#[derive(Clone)]
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
    timeout: Duration,
    connect_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            timeout: DEFAULT_QUERY_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound on executing the statement and reading every row
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound on opening a session. Also bounds the cancel request sent
    /// after a statement timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Execute `query` against the database behind `connection_string`
    ///
    /// Blank input and non-read-only statements fail with
    /// [`QueryError::Validation`] before any connection is opened.
    pub async fn execute_read_only_query(
        &self,
        query: &str,
        connection_string: &str,
    ) -> Result<QueryResult, QueryError> {
        if query.trim().is_empty() {
            tracing::warn!("Empty query provided");
            return Err(QueryError::Validation("Missing query".to_string()));
        }

        if connection_string.trim().is_empty() {
            tracing::warn!("Empty connection string provided");
            return Err(QueryError::Validation("Missing connectionString".to_string()));
        }

        if !guard::is_read_only(query) {
            tracing::warn!(query, "Non-read-only query attempted");
            return Err(QueryError::Validation(READ_ONLY_VIOLATION.to_string()));
        }

        let mut session = self.open(connection_string).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to open database session");
            QueryError::from(e)
        })?;

        let result = match tokio::time::timeout(self.timeout, run(&mut session, query)).await {
            Ok(result) => result,
            Err(_) => {
                self.cancel(&mut session).await;
                Err(QueryError::Timeout(self.timeout))
            }
        };

        if let Err(e) = &result {
            tracing::error!(query, error = %e, "Error executing query");
        }

        result
    }

    async fn open(&self, connection_string: &str) -> Result<ScopedSession, DriverError> {
        let opening = ScopedSession::open(self.connector.as_ref(), connection_string);
        tokio::time::timeout(self.connect_timeout, opening)
            .await
            .map_err(|_| DriverError::Connect(format!("timed out after {:?}", self.connect_timeout)))?
    }

    /// The statement keeps running server-side after its future is dropped
    async fn cancel(&self, session: &mut ScopedSession) {
        match tokio::time::timeout(self.connect_timeout, session.cancel()).await {
            Ok(Ok(())) => tracing::info!("Cancelled timed out statement"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to cancel timed out statement"),
            Err(_) => tracing::warn!("Cancel request for timed out statement did not complete"),
        }
    }
}

async fn run(session: &mut ScopedSession, query: &str) -> Result<QueryResult, QueryError> {
    let mut cursor = session.execute(query).await?;

    let mut result = QueryResult {
        columns: cursor.columns().to_vec(),
        rows: Vec::new(),
    };

    while let Some(values) = cursor.next_row().await? {
        let mut row = Row::new();
        for (column, value) in result.columns.iter().zip(values) {
            row.insert(column.name.clone(), value.unwrap_or(Value::Null));
        }
        result.rows.push(row);
    }

    Ok(result)
}
