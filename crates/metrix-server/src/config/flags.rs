//! Command-line flags for the collector binary.
//!
//! Flags sit between the YAML file and the environment: a flag overrides
//! the file, an environment variable overrides the flag.

use clap::Parser;

use super::{schema::strip_scheme, ServerConfig};

#[derive(Debug, Default, Clone, Parser)]
#[command(name = "metrix-server")]
#[command(about = "metrix collector: accepts metric updates over HTTP")]
pub struct ServerFlags {
    /// YAML config file (`METRIX_CONFIG` wins over this)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Listen address, host:port (env `ADDRESS`)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Seconds between snapshots, 0 = after every update (env `STORE_INTERVAL`)
    #[arg(short = 'i', long)]
    pub store_interval: Option<u64>,

    /// Snapshot file, empty disables it (env `FILE_STORAGE_PATH`)
    #[arg(short = 'f', long)]
    pub file_storage_path: Option<String>,

    /// Load prior state at startup (env `RESTORE`)
    #[arg(short, long)]
    pub restore: Option<bool>,

    /// Postgres DSN (env `DATABASE_DSN`)
    #[arg(short = 'd', long)]
    pub database_dsn: Option<String>,
}

impl ServerFlags {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(v) = &self.address {
            cfg.server.listen = strip_scheme(v).to_string();
        }
        if let Some(v) = self.store_interval {
            cfg.storage.store_interval_secs = v;
        }
        if let Some(v) = &self.file_storage_path {
            cfg.storage.file_path = Some(v.clone());
        }
        if let Some(v) = self.restore {
            cfg.storage.restore = v;
        }
        if let Some(v) = &self.database_dsn {
            cfg.storage.database_dsn = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn short_flags_parse() {
        let flags = ServerFlags::try_parse_from([
            "metrix-server",
            "-a",
            "localhost:9090",
            "-i",
            "0",
            "-f",
            "",
            "-r",
            "false",
            "-d",
            "postgres://localhost/metrix",
        ])
        .unwrap();

        let mut cfg = ServerConfig::default();
        flags.apply(&mut cfg);
        assert_eq!(cfg.server.listen, "localhost:9090");
        assert_eq!(cfg.storage.store_interval_secs, 0);
        assert_eq!(cfg.storage.file_path(), None);
        assert!(!cfg.storage.restore);
        assert_eq!(cfg.storage.database_dsn(), Some("postgres://localhost/metrix"));
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let flags = ServerFlags::try_parse_from(["metrix-server"]).unwrap();
        let mut cfg = ServerConfig::default();
        cfg.storage.store_interval_secs = 42;
        flags.apply(&mut cfg);
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert_eq!(cfg.storage.store_interval_secs, 42);
    }

    #[test]
    fn bad_flag_values_are_rejected() {
        assert!(ServerFlags::try_parse_from(["metrix-server", "-i", "5s"]).is_err());
        assert!(ServerFlags::try_parse_from(["metrix-server", "-r", "maybe"]).is_err());
    }
}
