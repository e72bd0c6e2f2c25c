//! HTTP transport
//!
//! A single JSON-RPC endpoint plus a health probe.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rpc::{Dispatcher, RpcResponse};

/// Configuration for the HTTP server
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub allow_any_origin: bool,
}

/// Start the HTTP server and run until Ctrl-C
pub async fn serve(config: HttpConfig, dispatcher: Dispatcher) -> Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    tracing::info!("Starting HTTP server on http://{}", listener.local_addr()?);

    let app = create_router(dispatcher, config.allow_any_origin);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Create the router with all routes
pub fn create_router(dispatcher: Dispatcher, allow_any_origin: bool) -> Router {
    let mut router = Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/Mcp", post(handle_rpc))
        .route("/health", get(health_check))
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http());

    if allow_any_origin {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// The body is taken raw so that malformed JSON still gets an envelope
async fn handle_rpc(
    State(dispatcher): State<Dispatcher>,
    body: Bytes,
) -> (StatusCode, Json<RpcResponse>) {
    let (status, response) = dispatcher.handle_body(&body).await;
    (status, Json(response))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
