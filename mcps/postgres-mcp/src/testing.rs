//! Scripted in-memory driver for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::{Connector, Cursor, Session};
use crate::types::{ColumnDefinition, DriverError};

/// What the stub database does for every session it opens
#[derive(Debug, Clone, Default)]
pub struct StubPlan {
    connect_error: Option<String>,
    execute_error: Option<String>,
    columns: Vec<ColumnDefinition>,
    rows: Vec<Vec<Option<Value>>>,
    fail_after: Option<(usize, String)>,
    hang: bool,
    hang_connect: bool,
}

impl StubPlan {
    pub fn rows(columns: Vec<ColumnDefinition>, rows: Vec<Vec<Option<Value>>>) -> Self {
        Self {
            columns,
            rows,
            ..Default::default()
        }
    }

    pub fn refuse_connect(message: &str) -> Self {
        Self {
            connect_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn fail_execute(message: &str) -> Self {
        Self {
            execute_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Serve `rows` rows, then fail the next read
    pub fn fail_after(mut self, rows: usize, message: &str) -> Self {
        self.fail_after = Some((rows, message.to_string()));
        self
    }

    /// Never finish executing
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Never finish opening a session
    pub fn hang_connect(mut self) -> Self {
        self.hang_connect = true;
        self
    }
}

/// Connector that counts opened, cancelled and released sessions
pub struct StubConnector {
    plan: StubPlan,
    opened: AtomicUsize,
    cancelled: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl StubConnector {
    pub fn new(plan: StubPlan) -> Arc<Self> {
        Arc::new(Self {
            plan,
            opened: AtomicUsize::new(0),
            cancelled: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn open(&self, _connection_string: &str) -> Result<Box<dyn Session>, DriverError> {
        if let Some(message) = &self.plan.connect_error {
            return Err(DriverError::Connect(message.clone()));
        }

        if self.plan.hang_connect {
            std::future::pending::<()>().await;
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            plan: self.plan.clone(),
            cancelled: self.cancelled.clone(),
            released: self.released.clone(),
        }))
    }
}

struct StubSession {
    plan: StubPlan,
    cancelled: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for StubSession {
    async fn execute(&mut self, _sql: &str) -> Result<Box<dyn Cursor>, DriverError> {
        if let Some(message) = &self.plan.execute_error {
            return Err(DriverError::Execute(message.clone()));
        }

        if self.plan.hang {
            std::future::pending::<()>().await;
        }

        Ok(Box::new(StubCursor {
            columns: self.plan.columns.clone(),
            rows: self.plan.rows.clone().into(),
            fail_after: self.plan.fail_after.clone(),
            served: 0,
        }))
    }

    async fn cancel(&mut self) -> Result<(), DriverError> {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct StubCursor {
    columns: Vec<ColumnDefinition>,
    rows: VecDeque<Vec<Option<Value>>>,
    fail_after: Option<(usize, String)>,
    served: usize,
}

#[async_trait]
impl Cursor for StubCursor {
    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Option<Value>>>, DriverError> {
        if let Some((limit, message)) = &self.fail_after {
            if self.served == *limit {
                return Err(DriverError::Read(message.clone()));
            }
        }

        self.served += 1;
        Ok(self.rows.pop_front())
    }
}
