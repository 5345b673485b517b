use std::time::Duration;

use serde::Deserialize;

use metrix_core::error::{MetrixError, Result};

use crate::storage::retry::BackoffPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            storage: StorageSection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetrixError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    /// Apply the collector's environment overrides on top of the file values.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("ADDRESS") {
            self.server.listen = strip_scheme(&v).to_string();
        }
        if let Some(v) = lookup("STORE_INTERVAL") {
            self.storage.store_interval_secs = v.trim().parse().map_err(|e| {
                MetrixError::BadRequest(format!("STORE_INTERVAL must be seconds: {e}"))
            })?;
        }
        if let Some(v) = lookup("FILE_STORAGE_PATH") {
            self.storage.file_path = Some(v);
        }
        if let Some(v) = lookup("RESTORE") {
            self.storage.restore = parse_bool("RESTORE", &v)?;
        }
        if let Some(v) = lookup("DATABASE_DSN") {
            self.storage.database_dsn = Some(v);
        }
        Ok(())
    }
}

fn parse_bool(key: &str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MetrixError::BadRequest(format!("{key} must be a boolean, got {other:?}"))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    /// `host:port` to bind; a leading `http://` is tolerated so the agent's
    /// `ADDRESS` value can be shared.
    pub fn listen_addr(&self) -> &str {
        strip_scheme(&self.listen)
    }

    pub fn validate(&self) -> Result<()> {
        let addr = self.listen_addr();
        let bad = |why: &str| {
            MetrixError::BadRequest(format!("server.listen must be host:port, got {addr:?}: {why}"))
        };
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| bad("missing port"))?;
        if host.is_empty() {
            return Err(bad("missing host"));
        }
        port.parse::<u16>().map_err(|e| bad(&e.to_string()))?;
        Ok(())
    }
}

/// Drop an `http://` / `https://` prefix and any trailing slash.
pub fn strip_scheme(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
        .unwrap_or(raw);
    raw.trim_end_matches('/')
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Seconds between periodic snapshots; `0` saves after every update.
    #[serde(default = "default_store_interval_secs")]
    pub store_interval_secs: u64,

    /// Snapshot file. Empty string disables file persistence.
    #[serde(default = "default_file_path")]
    pub file_path: Option<String>,

    /// Load prior state at startup.
    #[serde(default = "default_true")]
    pub restore: bool,

    /// Abort startup when prior state exists but cannot be read.
    #[serde(default = "default_true")]
    pub restore_strict: bool,

    /// Postgres DSN for the durable backend.
    #[serde(default)]
    pub database_dsn: Option<String>,

    #[serde(default = "default_connect_initial_ms")]
    pub connect_initial_ms: u64,

    #[serde(default = "default_connect_max_delay_ms")]
    pub connect_max_delay_ms: u64,

    #[serde(default = "default_connect_budget_ms")]
    pub connect_budget_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            store_interval_secs: default_store_interval_secs(),
            file_path: default_file_path(),
            restore: true,
            restore_strict: true,
            database_dsn: None,
            connect_initial_ms: default_connect_initial_ms(),
            connect_max_delay_ms: default_connect_max_delay_ms(),
            connect_budget_ms: default_connect_budget_ms(),
        }
    }
}

impl StorageSection {
    pub fn validate(&self) -> Result<()> {
        if self.store_interval_secs > 86_400 {
            return Err(MetrixError::BadRequest(
                "storage.store_interval_secs must be at most 86400".into(),
            ));
        }
        if !(10..=60_000).contains(&self.connect_initial_ms) {
            return Err(MetrixError::BadRequest(
                "storage.connect_initial_ms must be between 10 and 60000".into(),
            ));
        }
        if self.connect_max_delay_ms < self.connect_initial_ms {
            return Err(MetrixError::BadRequest(
                "storage.connect_max_delay_ms must be >= connect_initial_ms".into(),
            ));
        }
        if self.connect_budget_ms < self.connect_max_delay_ms {
            return Err(MetrixError::BadRequest(
                "storage.connect_budget_ms must be >= connect_max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    pub fn database_dsn(&self) -> Option<&str> {
        self.database_dsn.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(self.connect_initial_ms),
            max_delay: Duration::from_millis(self.connect_max_delay_ms),
            budget: Duration::from_millis(self.connect_budget_ms),
            ..BackoffPolicy::default()
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_store_interval_secs() -> u64 {
    300
}
fn default_file_path() -> Option<String> {
    Some("/tmp/metrics-db.json".into())
}
fn default_true() -> bool {
    true
}
fn default_connect_initial_ms() -> u64 {
    1_000
}
fn default_connect_max_delay_ms() -> u64 {
    5_000
}
fn default_connect_budget_ms() -> u64 {
    10_000
}
