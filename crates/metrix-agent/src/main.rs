//! metrix agent binary.
//!
//! Config: `METRIX_CONFIG`, `--config` or `metrix-agent.yaml`, then flags
//! (`-a -p -r`), then `ADDRESS`, `POLL_INTERVAL`, `REPORT_INTERVAL`.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use metrix_agent::config::{self, AgentFlags};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let flags = AgentFlags::parse();
    let cfg = match config::load(&flags) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "config load failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        server = %cfg.agent.base_url(),
        poll_interval_secs = cfg.agent.poll_interval_secs,
        report_interval_secs = cfg.agent.report_interval_secs,
        encoding = ?cfg.transport.encoding,
        gzip = cfg.transport.gzip,
        "metrix-agent starting"
    );

    match metrix_agent::run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "metrix-agent stopped");
            ExitCode::FAILURE
        }
    }
}
