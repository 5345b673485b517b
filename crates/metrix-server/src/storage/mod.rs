//! Durability for the collector's in-memory store.
//!
//! - `snapshot`: JSON snapshot file (restore at startup, save on demand)
//! - `job`: periodic snapshot task with a final save at shutdown
//! - `retry`: bounded exponential backoff used at connect time
//! - `backend`: Postgres backend (write-through + snapshot target)
//!
//! Targets implement [`SnapshotSink`], so the periodic job does not care
//! whether it writes a file, a database, or both.

pub mod backend;
pub mod job;
pub mod retry;
pub mod snapshot;

use async_trait::async_trait;

use metrix_core::error::Result;
use metrix_core::{MetricValue, Snapshot};

pub use backend::PgBackend;
pub use job::{JobState, SnapshotJob};
pub use retry::{retry_with_backoff, AttemptError, BackoffPolicy};
pub use snapshot::{restore_from_file, save_snapshot, FileSnapshot};

/// A place a full snapshot can be written to and read back from.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Human-readable target for logs (`file:/tmp/x.json`, `postgres`).
    fn describe(&self) -> String;

    /// `Ok(None)` means "no prior state".
    async fn load(&self) -> Result<Option<Snapshot>>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// External transactional store used alongside (or instead of) the file.
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Lightweight liveness check for `GET /ping`.
    async fn ping(&self) -> Result<()>;

    /// Persist post-merge values of one accepted request in one transaction.
    async fn record(&self, values: &[MetricValue]) -> Result<()>;
}
