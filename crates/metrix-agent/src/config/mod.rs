//! Agent config loader (strict parsing, flags, environment overrides).
//!
//! Precedence, highest first: environment, command-line flag, YAML file,
//! built-in default.

pub mod flags;
pub mod schema;

use std::fs;
use std::path::Path;

use metrix_core::error::{MetrixError, Result};

pub use flags::AgentFlags;
pub use schema::{AgentConfig, AgentSection, Encoding, TransportSection};

/// File read when neither `METRIX_CONFIG` nor `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "metrix-agent.yaml";

pub fn load(flags: &AgentFlags) -> Result<AgentConfig> {
    resolve(flags, |k| std::env::var(k).ok())
}

/// Resolve the effective config: file, then flags, then `lookup` (env).
pub fn resolve(
    flags: &AgentFlags,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AgentConfig> {
    let path = lookup("METRIX_CONFIG").or_else(|| flags.config.clone());
    let mut cfg = match path {
        Some(path) => load_from_file(&path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH)?,
        None => AgentConfig::default(),
    };
    flags.apply(&mut cfg);
    cfg.apply_env(lookup)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_file(path: &str) -> Result<AgentConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MetrixError::Internal(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<AgentConfig> {
    let cfg: AgentConfig = serde_yaml::from_str(s)
        .map_err(|e| MetrixError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
