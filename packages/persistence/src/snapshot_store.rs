//! # Local Snapshot Store
//!
//! Durable keyed storage for crash-recovery snapshots. One snapshot per
//! document key; single-key operations are atomic, nothing spans keys.
//!
//! Stores report errors, but the rest of the crate only talks to them
//! through [`BestEffortStore`], which turns every failure into a logged
//! no-op so a broken disk simply disables recovery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prototyper_editor::{ContentError, DocumentContent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] ContentError),

    #[error("Snapshot store unavailable")]
    Unavailable,
}

/// Locally persisted copy of possibly-unsaved content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySnapshot {
    /// Store key of the document (see `DocumentKey::store_key`)
    pub document_id: String,
    pub content: DocumentContent,
    pub name: String,
    /// Local wall-clock time of the write
    pub saved_at: DateTime<Utc>,
    /// Last confirmed server save known when the snapshot was taken
    #[serde(default)]
    pub server_saved_at: Option<DateTime<Utc>>,
}

impl RecoverySnapshot {
    pub fn validate(&self) -> Result<(), ContentError> {
        self.content.validate()
    }

    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|max_age| now.checked_sub_signed(max_age))
            .is_some_and(|cutoff| self.saved_at < cutoff)
    }
}

/// Async keyed snapshot storage
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, snapshot: RecoverySnapshot) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<RecoverySnapshot>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<RecoverySnapshot>, StoreError>;

    /// Delete every snapshot written more than `max_age` before `now`.
    /// Returns the number removed.
    async fn purge_older_than(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut purged = 0;
        for snapshot in self.list().await? {
            if snapshot.is_older_than(max_age, now) {
                self.delete(&snapshot.document_id).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, RecoverySnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(&self, snapshot: RecoverySnapshot) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .insert(snapshot.document_id.clone(), snapshot);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<RecoverySnapshot>, StoreError> {
        let mut snapshots = self.snapshots.lock();
        let invalid = matches!(snapshots.get(key), Some(snapshot) if snapshot.validate().is_err());
        if invalid {
            snapshots.remove(key);
            return Ok(None);
        }
        Ok(snapshots.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.snapshots.lock().remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RecoverySnapshot>, StoreError> {
        Ok(self.snapshots.lock().values().cloned().collect())
    }
}

/// One JSON file per key in a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a snapshot directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    /// Parse and validate a snapshot file; invalid files are removed
    async fn read_file(&self, path: &Path) -> Result<Option<RecoverySnapshot>, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed = serde_json::from_slice::<RecoverySnapshot>(&bytes)
            .map_err(StoreError::from)
            .and_then(|snapshot| {
                snapshot.validate()?;
                Ok(snapshot)
            });

        match parsed {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "discarding unreadable snapshot");
                remove_if_exists(path).await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn put(&self, snapshot: RecoverySnapshot) -> Result<(), StoreError> {
        let path = self.path_for(&snapshot.document_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&snapshot)?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<RecoverySnapshot>, StoreError> {
        self.read_file(&self.path_for(key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        remove_if_exists(&self.path_for(key)).await
    }

    async fn list(&self) -> Result<Vec<RecoverySnapshot>, StoreError> {
        let mut snapshots = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(snapshot) = self.read_file(&path).await? {
                snapshots.push(snapshot);
            }
        }

        snapshots.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(snapshots)
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Filesystem-safe, collision-free file stem for a key
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("_{byte:02x}")),
        }
    }
    out
}

/// Best-effort facade over a [`SnapshotStore`].
///
/// Every failure is logged at debug level and reported as success (or
/// absence), so callers proceed as if recovery were simply disabled.
#[derive(Clone)]
pub struct BestEffortStore {
    inner: Option<Arc<dyn SnapshotStore>>,
}

impl BestEffortStore {
    pub fn new(inner: Arc<dyn SnapshotStore>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Store that drops everything
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Open a file store, disabling recovery if the directory is unusable
    pub async fn open_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match FileSnapshotStore::open(&dir).await {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "crash recovery disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn put(&self, snapshot: RecoverySnapshot) {
        let Some(store) = &self.inner else { return };
        let key = snapshot.document_id.clone();
        if let Err(e) = store.put(snapshot).await {
            tracing::debug!(%key, error = %e, "snapshot write failed");
        }
    }

    pub async fn get(&self, key: &str) -> Option<RecoverySnapshot> {
        let store = self.inner.as_ref()?;
        match store.get(key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(%key, error = %e, "snapshot read failed");
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(store) = &self.inner else { return };
        if let Err(e) = store.delete(key).await {
            tracing::debug!(%key, error = %e, "snapshot delete failed");
        }
    }

    pub async fn list(&self) -> Vec<RecoverySnapshot> {
        let Some(store) = &self.inner else { return Vec::new() };
        store.list().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "snapshot listing failed");
            Vec::new()
        })
    }

    pub async fn purge_older_than(&self, max_age: Duration) -> usize {
        let Some(store) = &self.inner else { return 0 };
        store
            .purge_older_than(max_age, Utc::now())
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "snapshot purge failed");
                0
            })
    }
}
