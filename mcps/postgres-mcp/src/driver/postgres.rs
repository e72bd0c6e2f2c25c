//! PostgreSQL driver backed by tokio-postgres
//!
//! `sslmode=disable` connects in plain text. Every other mode negotiates TLS
//! through rustls, verifying the server against the platform's root
//! certificates.

use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use rustls::{ClientConfig, RootCertStore};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_postgres::config::SslMode;
use tokio_postgres::{CancelToken, Client, Connection, NoTls, RowStream};
use tokio_postgres_rustls::MakeRustlsConnect;

use super::connection_string;
use super::values::JsonCell;
use super::{Connector, Cursor, Session};
use crate::types::{ColumnDefinition, DriverError};

/// Opens one unpooled connection per session
pub struct PgConnector {
    connect_timeout: Duration,
    rustls: OnceLock<Result<MakeRustlsConnect, String>>,
}

impl PgConnector {
    /// `connect_timeout` applies to the TCP connect when the connection
    /// string sets none
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            rustls: OnceLock::new(),
        }
    }

    /// Built on first use and shared by every later TLS session
    fn rustls(&self) -> Result<MakeRustlsConnect, DriverError> {
        self.rustls
            .get_or_init(build_tls_connector)
            .clone()
            .map_err(DriverError::Connect)
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Session>, DriverError> {
        let mut config = connection_string::parse(connection_string)?;
        if config.get_connect_timeout().is_none() {
            config.connect_timeout(self.connect_timeout);
        }

        let tls = match config.get_ssl_mode() {
            SslMode::Disable => PgTls::None,
            _ => PgTls::Rustls(self.rustls()?),
        };

        let client = match &tls {
            PgTls::None => spawn_connection(config.connect(NoTls).await)?,
            PgTls::Rustls(connector) => spawn_connection(config.connect(connector.clone()).await)?,
        };

        Ok(Box::new(PgSession {
            cancel_token: client.cancel_token(),
            client: Some(client),
            tls,
        }))
    }
}

/// Hands the connection to its own task; it ends once the client is dropped
fn spawn_connection<S, T>(
    connected: Result<(Client, Connection<S, T>), tokio_postgres::Error>,
) -> Result<Client, DriverError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (client, connection) = connected.map_err(|e| DriverError::Connect(describe(&e)))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!("PostgreSQL connection error: {}", e);
        }
    });

    Ok(client)
}

fn build_tls_connector() -> Result<MakeRustlsConnect, String> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        tracing::warn!(error = %e, "Failed to load native root certificates");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded native root certificates");
    if roots.is_empty() {
        tracing::warn!("No root certificates available; TLS server verification will fail");
    }

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("invalid TLS configuration: {}", e))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

/// Transport a session was opened with; cancel requests must match it
#[derive(Clone)]
enum PgTls {
    None,
    Rustls(MakeRustlsConnect),
}

struct PgSession {
    client: Option<Client>,
    cancel_token: CancelToken,
    tls: PgTls,
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DriverError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| DriverError::Execute("session already released".to_string()))?;

        // Preparing first exposes column metadata even for empty results and
        // refuses multiple statements in one string.
        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| DriverError::Execute(describe(&e)))?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| ColumnDefinition::new(c.name(), c.type_().name()))
            .collect();

        let rows = client
            .query_raw(&statement, Vec::<String>::new())
            .await
            .map_err(|e| DriverError::Execute(describe(&e)))?;

        Ok(Box::new(PgCursor {
            columns,
            rows: Box::pin(rows),
        }))
    }

    async fn cancel(&mut self) -> Result<(), DriverError> {
        let sent = match &self.tls {
            PgTls::None => self.cancel_token.cancel_query(NoTls).await,
            PgTls::Rustls(connector) => self.cancel_token.cancel_query(connector.clone()).await,
        };
        sent.map_err(|e| DriverError::Execute(format!("cancel request failed: {}", describe(&e))))
    }

    fn release(&mut self) {
        self.client.take();
    }
}

struct PgCursor {
    columns: Vec<ColumnDefinition>,
    rows: Pin<Box<RowStream>>,
}

#[async_trait]
impl Cursor for PgCursor {
    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Option<Value>>>, DriverError> {
        let Some(row) = self
            .rows
            .try_next()
            .await
            .map_err(|e| DriverError::Read(describe(&e)))?
        else {
            return Ok(None);
        };

        let values = (0..self.columns.len())
            .map(|idx| {
                row.try_get::<_, Option<JsonCell>>(idx)
                    .map(|cell| cell.map(|c| c.0))
                    .map_err(|e| DriverError::Read(describe(&e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(values))
    }
}

/// Server errors carry their SQLSTATE; everything else uses the driver text
fn describe(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{}: {}", db.code().code(), db.message()),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryExecutor;
    use crate::types::QueryError;
    use tokio::net::TcpListener;

    /// Accepts TCP connections and never sends a byte
    async fn silent_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        port
    }

    async fn open_against(connection_string: &str) -> QueryError {
        let executor = QueryExecutor::new(Arc::new(PgConnector::new(Duration::from_secs(5))))
            .with_connect_timeout(Duration::from_millis(200));

        tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute_read_only_query("SELECT 1", connection_string),
        )
        .await
        .expect("a silent server must not hang the request")
        .unwrap_err()
    }

    #[tokio::test]
    async fn test_silent_server_hits_connect_timeout() {
        let port = silent_server().await;

        let err = open_against(&format!(
            "host=127.0.0.1 port={} user=ro dbname=app sslmode=disable",
            port
        ))
        .await;

        assert!(matches!(&err, QueryError::Execution(DriverError::Connect(msg)) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_ssl_required_negotiates_tls() {
        let port = silent_server().await;

        // Waiting on the SSL handshake rather than failing up front shows the
        // TLS connector is in place
        let err = open_against(&format!(
            "Host=127.0.0.1;Port={};Database=app;Username=ro;SslMode=Require;",
            port
        ))
        .await;

        assert!(matches!(&err, QueryError::Execution(DriverError::Connect(msg)) if msg.contains("timed out")));
    }

    #[test]
    fn test_tls_connector_is_built_once() {
        let connector = PgConnector::new(Duration::from_secs(1));
        assert!(connector.rustls().is_ok());
        assert!(connector.rustls.get().is_some());
        assert!(connector.rustls().is_ok());
    }
}
