use std::time::Duration;

use serde::Deserialize;

use metrix_core::error::{MetrixError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub transport: TransportSection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: 1,
            agent: AgentSection::default(),
            transport: TransportSection::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetrixError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.agent.validate()?;
        self.transport.validate()?;
        Ok(())
    }

    /// Apply the agent's environment overrides on top of the file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("ADDRESS") {
            self.agent.server_url = normalize_url(&v);
        }
        if let Some(v) = lookup("POLL_INTERVAL") {
            self.agent.poll_interval_secs = parse_secs("POLL_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("REPORT_INTERVAL") {
            self.agent.report_interval_secs = parse_secs("REPORT_INTERVAL", &v)?;
        }
        Ok(())
    }
}

fn parse_secs(key: &str, v: &str) -> Result<u64> {
    v.trim()
        .parse()
        .map_err(|e| MetrixError::BadRequest(format!("{key} must be seconds: {e}")))
}

/// `localhost:8080` -> `http://localhost:8080`; trailing slashes dropped.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Collector base URL. A bare `host:port` gets `http://` prepended.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_secs: default_poll_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

impl AgentSection {
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(MetrixError::BadRequest("agent.server_url must not be empty".into()));
        }
        if !(1..=3_600).contains(&self.poll_interval_secs) {
            return Err(MetrixError::BadRequest(
                "agent.poll_interval_secs must be between 1 and 3600".into(),
            ));
        }
        if !(1..=3_600).contains(&self.report_interval_secs) {
            return Err(MetrixError::BadRequest(
                "agent.report_interval_secs must be between 1 and 3600".into(),
            ));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        normalize_url(&self.server_url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

/// Wire form used for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// `POST /update/{kind}/{name}/{value}`
    Text,
    /// `POST /update/` with a JSON object
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default = "default_encoding")]
    pub encoding: Encoding,

    #[serde(default = "default_true")]
    pub gzip: bool,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            gzip: true,
            request_timeout_ms: default_request_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl TransportSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60_000).contains(&self.request_timeout_ms) {
            return Err(MetrixError::BadRequest(
                "transport.request_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1..=1_024).contains(&self.max_in_flight) {
            return Err(MetrixError::BadRequest(
                "transport.max_in_flight must be between 1 and 1024".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_server_url() -> String {
    "http://localhost:8080".into()
}
fn default_poll_interval_secs() -> u64 {
    2
}
fn default_report_interval_secs() -> u64 {
    10
}
fn default_encoding() -> Encoding {
    Encoding::Json
}
fn default_true() -> bool {
    true
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_max_in_flight() -> usize {
    32
}
