//! metrix collector binary.
//!
//! Config: `METRIX_CONFIG`, `--config` or `metrix-server.yaml`, then flags
//! (`-a -i -f -r -d`), then `ADDRESS`, `STORE_INTERVAL`, `FILE_STORAGE_PATH`,
//! `RESTORE`, `DATABASE_DSN`.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use metrix_server::config::{self, ServerFlags};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let flags = ServerFlags::parse();
    let cfg = match config::load(&flags) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "config load failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        listen = cfg.server.listen_addr(),
        store_interval_secs = cfg.storage.store_interval_secs,
        file = cfg.storage.file_path().unwrap_or("-"),
        backend = cfg.storage.database_dsn().is_some(),
        "metrix-server starting"
    );

    match metrix_server::run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.client_code().as_str(), "metrix-server stopped");
            ExitCode::FAILURE
        }
    }
}
