//! Periodic snapshot job.
//!
//! Lifecycle: `Uninitialized -> (restore attempt) -> Running -> Stopped`.
//! Save failures while running are logged and the loop keeps going; the
//! store keeps serving from memory regardless.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use metrix_core::error::{MetrixError, Result};
use metrix_core::MetricStore;

use super::SnapshotSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Uninitialized,
    Running,
    Stopped,
}

pub struct SnapshotJob {
    store: Arc<MetricStore>,
    sinks: Vec<Arc<dyn SnapshotSink>>,
    interval: Duration,
    state: JobState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Copy the store once and write the copy to every sink.
///
/// Every sink is attempted; the last error (if any) is returned.
pub async fn save_all(store: &MetricStore, sinks: &[Arc<dyn SnapshotSink>]) -> Result<()> {
    if sinks.is_empty() {
        return Ok(());
    }
    let snap = store.snapshot();
    let mut last_err = None;
    for sink in sinks {
        match sink.save(&snap).await {
            Ok(()) => tracing::debug!(
                target_sink = %sink.describe(),
                metrics = snap.len(),
                "snapshot saved"
            ),
            Err(e) => {
                tracing::error!(target_sink = %sink.describe(), error = %e, "snapshot save failed");
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl SnapshotJob {
    /// `interval == 0` disables the periodic loop (saves happen per update and
    /// at `stop`).
    pub fn new(
        store: Arc<MetricStore>,
        sinks: Vec<Arc<dyn SnapshotSink>>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            sinks,
            interval,
            state: JobState::Uninitialized,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Load prior state from `source` into the store.
    ///
    /// Returns `Ok(false)` when the source holds no state. Whether an error
    /// aborts startup is the caller's decision.
    pub async fn restore(&self, source: &dyn SnapshotSink) -> Result<bool> {
        if self.state != JobState::Uninitialized {
            return Err(MetrixError::Internal("restore after snapshot job started".into()));
        }
        match source.load().await? {
            Some(snap) => {
                let metrics = snap.len();
                tracing::info!(source = %source.describe(), metrics, "restored snapshot");
                self.store.restore(snap);
                Ok(true)
            }
            None => {
                tracing::info!(source = %source.describe(), "no prior state");
                Ok(false)
            }
        }
    }

    /// Spawn the periodic save loop.
    pub fn start(&mut self) {
        if self.state != JobState::Uninitialized {
            return;
        }
        self.state = JobState::Running;

        if self.interval.is_zero() || self.sinks.is_empty() {
            return;
        }

        let store = Arc::clone(&self.store);
        let sinks = self.sinks.clone();
        let cancel = self.cancel.clone();
        let period = self.interval;

        self.handle = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; the store was just restored.
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        // Errors are already logged per sink.
                        let _ = save_all(&store, &sinks).await;
                    }
                }
            }
        }));
        tracing::info!(
            interval_secs = period.as_secs(),
            sinks = self.sinks.len(),
            "snapshot job running"
        );
    }

    /// Stop the loop and perform the final save.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == JobState::Stopped {
            return Ok(());
        }
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "snapshot loop panicked");
            }
        }
        self.state = JobState::Stopped;
        let res = save_all(&self.store, &self.sinks).await;
        if res.is_ok() {
            tracing::info!(metrics = self.store.len(), "final snapshot saved");
        }
        res
    }
}
