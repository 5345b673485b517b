//! metrix agent library entry.
//!
//! Samples host/process statistics into a local [`MetricStore`] and reports
//! them to the collector on a separate interval.

pub mod agent;
pub mod config;
pub mod sampler;
pub mod shutdown;
pub mod transmitter;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use metrix_core::error::Result;
use metrix_core::MetricStore;

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::sampler::Sampler;
use crate::transmitter::{HttpSink, Transmitter};

/// Build an agent that reports over HTTP as configured.
pub fn build(cfg: &AgentConfig) -> Result<Agent> {
    let sink = Arc::new(HttpSink::from_config(cfg)?);
    let transmitter =
        Transmitter::new(sink, cfg.transport.max_in_flight, cfg.transport.request_timeout());
    Ok(Agent::new(
        Arc::new(MetricStore::new()),
        Sampler::new(),
        transmitter,
        cfg.agent.poll_interval(),
        cfg.agent.report_interval(),
    ))
}

/// Run until Ctrl-C / SIGTERM.
pub async fn run(cfg: AgentConfig) -> Result<()> {
    let agent = build(&cfg)?;
    let cancel = CancellationToken::new();
    let watcher = shutdown::cancel_on_signal(cancel.clone());
    agent.run(cancel.clone()).await;
    cancel.cancel();
    let _ = watcher.await;
    Ok(())
}
