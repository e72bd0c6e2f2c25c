//! Result table and error types shared by the executor and both transports

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Message returned when the read-only guard rejects a statement
pub const READ_ONLY_VIOLATION: &str = "Only SELECT queries are allowed for security reasons";

// ============================================================================
// Result Types
// ============================================================================

/// One result column, in driver order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Backend type name as reported by the server (`int4`, `text`, ...)
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Column name to value. SQL NULL is stored as `Value::Null`.
pub type Row = serde_json::Map<String, Value>;

/// Fully materialized result set for a single statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Row>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures raised by a database driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Connection string could not be understood
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Opening the session failed
    #[error("failed to connect: {0}")]
    Connect(String),

    /// The statement was rejected or failed while running
    #[error("{0}")]
    Execute(String),

    /// Reading a row or converting a value failed
    #[error("failed to read row: {0}")]
    Read(String),
}

/// Outcome of a failed read-only query
///
/// `Validation` is the caller's fault and must stay distinguishable from
/// everything else, which is an execution failure.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Input was blank or the statement is not read-only
    #[error("{0}")]
    Validation(String),

    /// The driver failed to connect, execute, or read
    #[error(transparent)]
    Execution(#[from] DriverError),

    /// Executing and reading the statement took longer than allowed
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    pub fn is_validation(&self) -> bool {
        matches!(self, QueryError::Validation(_))
    }
}
