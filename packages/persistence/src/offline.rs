//! Durable queue of saves made while offline.
//!
//! Entries live in a JSON array file. The file is validated on load:
//! entries that do not parse, or whose content is invalid, are dropped
//! with a warning instead of failing the whole queue.

use crate::persistence::SaveListener;
use crate::retry::ErrorClass;
use crate::save_queue::{SaveOutcome, SaveQueue, SaveRequest};
use crate::snapshot_store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prototyper_editor::{Document, DocumentContent, DocumentId, DocumentKey, SaveType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// A save waiting for connectivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSave {
    pub id: String,
    /// `None` for a document that has not been created yet
    pub document_key: Option<DocumentId>,
    /// Editor-side key of a document that has not been created yet
    #[serde(default)]
    pub draft_key: Option<String>,
    pub name: String,
    pub content: DocumentContent,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedSave {
    pub fn from_request(request: &SaveRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_key: request.document_id.clone(),
            draft_key: request.draft_key.clone(),
            name: request.name.clone(),
            content: request.content.clone(),
            owner_id: request.owner_id.clone(),
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Editor-side key the entry was queued under, if it is known
    pub fn key(&self) -> Option<DocumentKey> {
        match (&self.document_key, &self.draft_key) {
            (Some(id), _) => Some(DocumentKey::Saved(id.clone())),
            (None, Some(draft)) => Some(DocumentKey::Unsaved(draft.clone())),
            (None, None) => None,
        }
    }

    fn same_document(&self, other: &QueuedSave) -> bool {
        self.document_key == other.document_key && self.draft_key == other.draft_key
    }

    /// Replays run with background semantics
    pub fn to_request(&self) -> SaveRequest {
        SaveRequest {
            save_type: SaveType::Autosave,
            document_id: self.document_key.clone(),
            draft_key: self.draft_key.clone(),
            name: self.name.clone(),
            content: self.content.clone(),
            owner_id: self.owner_id.clone(),
        }
    }
}

/// Outcome of one [`OfflineQueue::drain`] pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrainReport {
    /// Documents confirmed by the server, paired with the queued key they
    /// were saved under
    pub replayed: Vec<(Option<DocumentKey>, Document)>,
    /// Entries discarded after a permanent failure
    pub dropped: usize,
    /// Entries still waiting
    pub remaining: usize,
}

pub struct OfflineQueue {
    path: Option<PathBuf>,
    entries: Mutex<Vec<QueuedSave>>,
    draining: AtomicBool,
}

impl OfflineQueue {
    /// Queue that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Load (or start) a queue file
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => parse_entries(&bytes, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
            draining: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn entries(&self) -> Vec<QueuedSave> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Append an entry. A newer save for the same document replaces the
    /// older one, since it carries the later content.
    pub async fn push(&self, entry: QueuedSave) {
        let mut entries = self.entries.lock().await;
        match entries
            .iter_mut()
            .find(|existing| existing.same_document(&entry))
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.persist(&entries).await;
    }

    pub async fn remove(&self, id: &str) {
        let mut entries = self.entries.lock().await;
        entries.retain(|entry| entry.id != id);
        self.persist(&entries).await;
    }

    /// Drop queued creates for a draft that has since been saved. Replaying
    /// them would create a second document with older content.
    pub async fn forget_draft(&self, draft_key: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.document_key.is_some() || entry.draft_key.as_deref() != Some(draft_key)
        });
        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(%draft_key, removed, "dropped queued creates for saved draft");
            self.persist(&entries).await;
        }
        removed
    }

    /// Replay entries one at a time through `queue`.
    ///
    /// Successful and permanently failed entries are removed; the pass
    /// stops at the first transient failure. Concurrent calls return an
    /// empty report.
    pub async fn drain(&self, queue: &SaveQueue) -> DrainReport {
        if self.draining.swap(true, Ordering::SeqCst) {
            return DrainReport::default();
        }

        let mut report = DrainReport::default();

        loop {
            let Some(entry) = self.entries.lock().await.first().cloned() else {
                break;
            };

            let outcome = queue.enqueue(entry.to_request()).await;
            match outcome {
                SaveOutcome::Saved(document) => {
                    tracing::info!(entry = %entry.id, "replayed offline save");
                    self.remove(&entry.id).await;
                    report.replayed.push((entry.key(), document));
                }
                SaveOutcome::Superseded => {
                    // The superseding save carries newer content
                    self.remove(&entry.id).await;
                }
                SaveOutcome::QueuedOffline { entry_id } => {
                    // Went offline again; the fresh entry replaced this one
                    tracing::debug!(entry = %entry_id, "connectivity lost during replay");
                    if entry_id != entry.id {
                        self.remove(&entry.id).await;
                    }
                    break;
                }
                SaveOutcome::Failed(error) if error.class == ErrorClass::Retriable => {
                    self.bump_retry(&entry.id).await;
                    tracing::warn!(entry = %entry.id, %error, "offline replay will retry later");
                    break;
                }
                SaveOutcome::Failed(error) => {
                    tracing::warn!(entry = %entry.id, %error, "dropping offline save");
                    self.remove(&entry.id).await;
                    report.dropped += 1;
                }
            }
        }

        report.remaining = self.len().await;
        self.draining.store(false, Ordering::SeqCst);
        report
    }

    async fn bump_retry(&self, id: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) {
            entry.retry_count += 1;
        }
        self.persist(&entries).await;
    }

    async fn persist(&self, entries: &[QueuedSave]) {
        let Some(path) = &self.path else { return };
        if let Err(e) = write_entries(path, entries).await {
            tracing::warn!(path = %path.display(), error = %e, "could not persist offline queue");
        }
    }
}

#[async_trait]
impl SaveListener for OfflineQueue {
    async fn on_saved(&self, previous_key: &DocumentKey, document: &Document) {
        let Some(draft_key) = previous_key.draft() else {
            return;
        };
        if document.key.is_saved() {
            self.forget_draft(draft_key).await;
        }
    }
}

fn parse_entries(bytes: &[u8], path: &Path) -> Vec<QueuedSave> {
    let raw: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "offline queue unreadable; starting empty");
            return Vec::new();
        }
    };

    raw.into_iter()
        .filter_map(|value| {
            let entry = match serde_json::from_value::<QueuedSave>(value) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed offline entry");
                    return None;
                }
            };
            match entry.content.validate() {
                Ok(()) => Some(entry),
                Err(e) => {
                    tracing::warn!(entry = %entry.id, error = %e, "dropping invalid offline entry");
                    None
                }
            }
        })
        .collect()
}

async fn write_entries(path: &Path, entries: &[QueuedSave]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
