//! metrix collector library entry.
//!
//! Wires config, the in-memory store, snapshot persistence, the optional
//! Postgres backend and the axum HTTP surface. Consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod http;
pub mod ops;
pub mod router;
pub mod shutdown;
pub mod storage;

use std::future::Future;

use metrix_core::error::{MetrixError, Result};

use crate::config::ServerConfig;

/// Serve until `shutdown` resolves, then write the final snapshot.
pub async fn run_until(
    cfg: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    cfg.validate()?;
    // Hostnames (`localhost:8080`) are resolved by `bind`.
    let listen = cfg.server.listen_addr().to_string();

    let listener = tokio::net::TcpListener::bind(listen.as_str())
        .await
        .map_err(|e| MetrixError::Internal(format!("bind {listen} failed: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| MetrixError::Internal(format!("local addr: {e}")))?;
    tracing::info!(%listen, %local, "metrix-server listening");

    let collector = bootstrap::bootstrap(cfg).await?;
    let app = collector.router();

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MetrixError::Internal(format!("server failed: {e}")));

    // Final save runs even when serving failed; persistence errors are
    // logged by the job and not fatal.
    if let Err(e) = collector.shutdown().await {
        tracing::error!(error = %e, "final snapshot failed");
    }
    served
}

/// Serve until Ctrl-C / SIGTERM.
pub async fn run(cfg: ServerConfig) -> Result<()> {
    run_until(cfg, shutdown::shutdown_signal()).await
}
