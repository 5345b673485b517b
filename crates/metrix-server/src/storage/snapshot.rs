//! Snapshot file persistence.
//!
//! Writes go to `<path>.tmp` and are renamed over `<path>`, so a crash during
//! a save leaves either the previous snapshot or the new one, never a torn
//! file. The store lock is held only while copying, never across file I/O.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use metrix_core::error::{MetrixError, Result};
use metrix_core::{MetricStore, Snapshot};

use super::SnapshotSink;

/// Read a snapshot file. Missing or empty file means "no prior state".
pub async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MetrixError::Persistence(format!(
                "read {} failed: {e}",
                path.display()
            )))
        }
    };
    Snapshot::from_json(&bytes)
        .map_err(|e| MetrixError::Persistence(format!("{}: {e}", path.display())))
}

/// Serialize `snap` to `path` via a temp file + rename.
pub async fn write_snapshot(path: &Path, snap: &Snapshot) -> Result<()> {
    let bytes = snap.to_json()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            MetrixError::Persistence(format!("create {} failed: {e}", parent.display()))
        })?;
    }

    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
        MetrixError::Persistence(format!("write {} failed: {e}", tmp.display()))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        MetrixError::Persistence(format!("rename to {} failed: {e}", path.display()))
    })?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Load `path` into `store`. Returns `Ok(false)` when there was nothing to load.
pub async fn restore_from_file(store: &MetricStore, path: impl AsRef<Path>) -> Result<bool> {
    match read_snapshot(path.as_ref()).await? {
        Some(snap) => {
            store.restore(snap);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Copy `store` and write it to `path`.
pub async fn save_snapshot(store: &MetricStore, path: impl AsRef<Path>) -> Result<()> {
    let snap = store.snapshot();
    write_snapshot(path.as_ref(), &snap).await
}

/// File-backed [`SnapshotSink`].
pub struct FileSnapshot {
    path: PathBuf,
    // Serializes writers so two saves never race on the temp file.
    write_lock: Mutex<()>,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSink for FileSnapshot {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        read_snapshot(&self.path).await
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_snapshot(&self.path, snapshot).await
    }
}
