//! Host and process statistics sampler.
//!
//! Each poll produces a complete gauge set that replaces the previous one
//! wholesale, and bumps the `PollCount` counter by one.

use std::collections::HashMap;

use sysinfo::{Pid, System};

use metrix_core::error::Result;
use metrix_core::MetricStore;

pub const POLL_COUNT: &str = "PollCount";
pub const RANDOM_VALUE: &str = "RandomValue";

/// Gauge names produced by every sample.
pub const GAUGES: [&str; 12] = [
    "TotalMemory",
    "UsedMemory",
    "FreeMemory",
    "AvailableMemory",
    "TotalSwap",
    "UsedSwap",
    "CpuCount",
    "CpuUtilization",
    "ProcessMemory",
    "ProcessVirtualMemory",
    "ProcessCpuUsage",
    RANDOM_VALUE,
];

pub struct Sampler {
    sys: System,
    pid: Option<Pid>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "own pid unavailable, process gauges will be zero");
                None
            }
        };
        Self { sys: System::new(), pid }
    }

    /// Refresh and read one full gauge set.
    pub fn collect(&mut self) -> HashMap<String, f64> {
        self.sys.refresh_memory();
        self.sys.refresh_cpu();

        let (proc_mem, proc_vmem, proc_cpu) = match self.pid {
            Some(pid) if self.sys.refresh_process(pid) => self
                .sys
                .process(pid)
                .map(|p| (p.memory() as f64, p.virtual_memory() as f64, f64::from(p.cpu_usage())))
                .unwrap_or_default(),
            _ => (0.0, 0.0, 0.0),
        };

        let values = [
            self.sys.total_memory() as f64,
            self.sys.used_memory() as f64,
            self.sys.free_memory() as f64,
            self.sys.available_memory() as f64,
            self.sys.total_swap() as f64,
            self.sys.used_swap() as f64,
            self.sys.cpus().len() as f64,
            f64::from(self.sys.global_cpu_info().cpu_usage()),
            proc_mem,
            proc_vmem,
            proc_cpu,
            rand::random::<f64>(),
        ];

        GAUGES
            .iter()
            .zip(values)
            // NaN usage readings happen on the first refresh on some hosts.
            .map(|(name, v)| (name.to_string(), if v.is_finite() { v } else { 0.0 }))
            .collect()
    }

    /// Replace the store's gauges with a fresh sample and count the poll.
    pub fn sample(&mut self, store: &MetricStore) -> Result<()> {
        let gauges = self.collect();
        store.replace_gauges(gauges);
        store.increment_counter(POLL_COUNT, 1)?;
        Ok(())
    }
}
