//! Command-line flags for the agent binary.
//!
//! Same precedence as the collector: environment over flag over file.

use clap::Parser;

use super::{schema::normalize_url, AgentConfig};

#[derive(Debug, Default, Clone, Parser)]
#[command(name = "metrix-agent")]
#[command(about = "metrix agent: samples host statistics and reports them")]
pub struct AgentFlags {
    /// YAML config file (`METRIX_CONFIG` wins over this)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Collector address, `host:port` or a URL (env `ADDRESS`)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Seconds between samples, `2` or `2s` (env `POLL_INTERVAL`)
    #[arg(short, long, value_parser = parse_interval)]
    pub poll_interval: Option<u64>,

    /// Seconds between reports, `10` or `10s` (env `REPORT_INTERVAL`)
    #[arg(short, long, value_parser = parse_interval)]
    pub report_interval: Option<u64>,
}

impl AgentFlags {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply(&self, cfg: &mut AgentConfig) {
        if let Some(v) = &self.address {
            cfg.agent.server_url = normalize_url(v);
        }
        if let Some(v) = self.poll_interval {
            cfg.agent.poll_interval_secs = v;
        }
        if let Some(v) = self.report_interval {
            cfg.agent.report_interval_secs = v;
        }
    }
}

fn parse_interval(raw: &str) -> std::result::Result<u64, String> {
    let raw = raw.trim();
    raw.strip_suffix('s')
        .unwrap_or(raw)
        .parse()
        .map_err(|e| format!("expected whole seconds such as 10 or 10s: {e}"))
}
