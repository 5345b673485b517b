//! Collector assembly: storage targets, restore, snapshot job, HTTP state.

use std::sync::Arc;

use axum::Router;

use metrix_core::error::Result;
use metrix_core::MetricStore;

use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::router::build_router;
use crate::storage::{FileSnapshot, JobState, PgBackend, SnapshotJob, SnapshotSink};

/// A fully wired collector, ready to be served.
pub struct Collector {
    state: AppState,
    job: SnapshotJob,
}

impl Collector {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn job_state(&self) -> JobState {
        self.job.state()
    }

    /// Stop the periodic job and write the final snapshot.
    pub async fn shutdown(mut self) -> Result<()> {
        self.job.stop().await
    }
}

/// Build the collector described by `cfg`.
///
/// Order: connect the backend (bounded retry, fatal on failure), restore
/// prior state, start the snapshot job.
pub async fn bootstrap(cfg: ServerConfig) -> Result<Collector> {
    let storage = cfg.storage.clone();
    let store = Arc::new(MetricStore::new());

    let file = storage.file_path().map(|p| Arc::new(FileSnapshot::new(p)));
    let pg = match storage.database_dsn() {
        Some(dsn) => Some(Arc::new(PgBackend::connect(dsn, &storage.backoff()).await?)),
        None => None,
    };

    let mut sinks: Vec<Arc<dyn SnapshotSink>> = Vec::new();
    if let Some(f) = &file {
        sinks.push(f.clone());
    }
    if let Some(pg) = &pg {
        sinks.push(pg.clone());
    }

    let mut job = SnapshotJob::new(Arc::clone(&store), sinks, storage.store_interval());

    if storage.restore {
        // The backend is authoritative when configured.
        let source: Option<&dyn SnapshotSink> = match (&pg, &file) {
            (Some(pg), _) => Some(pg.as_ref() as &dyn SnapshotSink),
            (None, Some(f)) => Some(f.as_ref() as &dyn SnapshotSink),
            (None, None) => None,
        };
        if let Some(source) = source {
            match job.restore(source).await {
                Ok(_) => {}
                Err(e) if storage.restore_strict => return Err(e),
                Err(e) => tracing::warn!(error = %e, "restore failed, starting empty"),
            }
        }
    }

    let mut state = AppState::new(cfg, Arc::clone(&store));
    if let Some(pg) = pg {
        state = state.with_backend(pg);
    }
    if storage.store_interval_secs == 0 {
        // Backend rows are already written through per update.
        if let Some(f) = file {
            state = state.with_sync_sinks(vec![f as Arc<dyn SnapshotSink>]);
        }
    }

    job.start();
    Ok(Collector { state, job })
}
