//! Shared application state for the collector.
//!
//! Cheap to clone: every field is behind an `Arc`.

use std::sync::Arc;

use tokio::sync::Mutex;

use metrix_core::{MetricStore, MetricValue};

use crate::config::ServerConfig;
use crate::storage::{job::save_all, DurableBackend, SnapshotSink};

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<ServerConfig>,
    store: Arc<MetricStore>,
    backend: Option<Arc<dyn DurableBackend>>,
    sync_sinks: Arc<Vec<Arc<dyn SnapshotSink>>>,
    // Orders sync-mode saves so an older copy never overwrites a newer one.
    sync_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(cfg: ServerConfig, store: Arc<MetricStore>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            store,
            backend: None,
            sync_sinks: Arc::new(Vec::new()),
            sync_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Every accepted update is also written through to `backend`.
    pub fn with_backend(mut self, backend: Arc<dyn DurableBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sinks saved after every accepted update (`store_interval_secs == 0`).
    pub fn with_sync_sinks(mut self, sinks: Vec<Arc<dyn SnapshotSink>>) -> Self {
        self.sync_sinks = Arc::new(sinks);
        self
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.cfg
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    pub fn backend(&self) -> Option<Arc<dyn DurableBackend>> {
        self.backend.clone()
    }

    /// Durability hook run after the store accepted `values`.
    ///
    /// Failures are logged and absorbed: the update is already visible in
    /// memory and the client gets its 200.
    pub async fn after_update(&self, values: &[MetricValue]) {
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.record(values).await {
                tracing::error!(count = values.len(), error = %e, "write-through failed");
            }
        }

        if !self.sync_sinks.is_empty() {
            let _guard = self.sync_lock.lock().await;
            // Errors are already logged per sink.
            let _ = save_all(&self.store, &self.sync_sinks).await;
        }
    }
}
