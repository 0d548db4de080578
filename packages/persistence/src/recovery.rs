//! # Crash Recovery
//!
//! Keeps a local snapshot of unsaved work and offers it back after a crash.
//!
//! ## Flow
//!
//! ```text
//! content change ──→ pending = true ──→ (3s quiet) ──→ write snapshot
//! tab hidden / navigate / unmount ──→ cancel timer ──→ await running write
//!                                                 ──→ write if pending
//! first `ready` after load/create ──→ compare snapshot.saved_at with the
//!                                     last server save ──→ offer or delete
//! ```
//!
//! The debounce timer and the flush handlers share one pending flag and
//! take it with an atomic swap, so each batch of changes is written once.
//! A debounced write runs on its own task; cancelling the timer never
//! cancels a write that has already started.
//!
//! The staleness check falls back to the session's in-memory
//! `last_saved_at` when the document carries no server timestamp. That
//! value is only meaningful within one session; edits made elsewhere
//! between loads are not detected.

use crate::persistence::SaveListener;
use crate::snapshot_store::{BestEffortStore, RecoverySnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prototyper_editor::{
    ActionKind, Document, DocumentKey, EditSession, EditorInstance, LifecycleStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Quiet period before a snapshot is written
    pub debounce: Duration,
    /// Snapshots older than this are purged on initialization
    pub retention: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(3000),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Lifecycle events that force pending changes to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    TabHidden,
    BeforeNavigate,
    Unmount,
}

struct Inner {
    session: Arc<EditSession>,
    editor: Arc<dyn EditorInstance>,
    store: BestEffortStore,
    config: RecoveryConfig,
    pending_changes: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Debounced write started by the timer
    writing: Mutex<Option<JoinHandle<bool>>>,
    /// Snapshot currently offered to the user
    offered: Mutex<Option<RecoverySnapshot>>,
}

/// Crash recovery for one editor session
#[derive(Clone)]
pub struct CrashRecovery {
    inner: Arc<Inner>,
}

impl CrashRecovery {
    pub fn new(
        session: Arc<EditSession>,
        editor: Arc<dyn EditorInstance>,
        store: BestEffortStore,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                editor,
                store,
                config,
                pending_changes: AtomicBool::new(false),
                timer: Mutex::new(None),
                writing: Mutex::new(None),
                offered: Mutex::new(None),
            }),
        }
    }

    /// Retention sweep. Returns the number of snapshots purged.
    pub async fn initialize(&self) -> usize {
        let purged = self
            .inner
            .store
            .purge_older_than(self.inner.config.retention)
            .await;
        if purged > 0 {
            tracing::info!(purged, "purged expired recovery snapshots");
        }
        purged
    }

    pub fn recovery_available(&self) -> bool {
        self.inner.offered.lock().is_some()
    }

    pub fn recovery_timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner.offered.lock().as_ref().map(|s| s.saved_at)
    }

    pub fn has_pending_changes(&self) -> bool {
        self.inner.pending_changes.load(Ordering::SeqCst)
    }

    /// Note an edit and restart the debounce timer
    pub fn on_content_change(&self) {
        self.inner.pending_changes.store(true, Ordering::SeqCst);

        let inner = self.inner.clone();
        let debounce = self.inner.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.start_debounced_write();
        });

        if let Some(previous) = self.inner.timer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the timer and write now, but only if edits are pending.
    /// A debounced write that is already running is awaited instead.
    pub async fn flush(&self, reason: FlushReason) -> bool {
        let timer = self.inner.timer.lock().take();
        if let Some(timer) = timer {
            timer.abort();
        }

        let (running, pending) = {
            let mut writing = self.inner.writing.lock();
            let running = writing.take().filter(|write| !write.is_finished());
            (running, self.inner.pending_changes.swap(false, Ordering::SeqCst))
        };

        let mut written = false;
        if let Some(write) = running {
            written = write.await.unwrap_or(false);
        }
        if !pending {
            return written;
        }

        tracing::debug!(?reason, "flushing recovery snapshot");
        self.inner.write_snapshot().await
    }

    /// Compare the stored snapshot with the last server save and offer it
    /// if it is newer. Stale snapshots are deleted.
    pub async fn check_recovery(&self) -> bool {
        let state = self.inner.session.state();
        let Some(document) = &state.document else {
            return false;
        };
        let key = document.key.store_key();

        let Some(snapshot) = self.inner.store.get(&key).await else {
            return false;
        };

        let server_saved_at = state.server_timestamp();
        let newer = match server_saved_at {
            Some(saved) => snapshot.saved_at > saved,
            None => true,
        };

        if newer {
            tracing::info!(
                %key,
                snapshot_at = %snapshot.saved_at,
                server_at = ?server_saved_at,
                "offering crash recovery"
            );
            *self.inner.offered.lock() = Some(snapshot);
            true
        } else {
            tracing::debug!(%key, "discarding stale recovery snapshot");
            self.inner.store.delete(&key).await;
            false
        }
    }

    /// Load the offered snapshot into the editor and mark the document
    /// dirty. The user still has to save.
    ///
    /// Only applies while the session is `ready`; otherwise the offer stays
    /// open and nothing is deleted.
    pub async fn restore_recovery(&self) -> bool {
        let status = self.inner.session.status();
        if status != LifecycleStatus::Ready {
            tracing::debug!(%status, "recovery restore deferred until ready");
            return false;
        }

        let offered = self.inner.offered.lock().take();
        let Some(snapshot) = offered else {
            return false;
        };

        match self
            .inner
            .editor
            .load_serialized_content(&snapshot.content.data)
        {
            Ok(()) => {
                if !self.inner.session.content_changed().dirty {
                    // Left `ready` while applying; keep the snapshot on offer
                    tracing::debug!(key = %snapshot.document_id, "recovery restore not accepted");
                    *self.inner.offered.lock() = Some(snapshot);
                    return false;
                }
                self.inner.store.delete(&snapshot.document_id).await;
                tracing::info!(key = %snapshot.document_id, "restored recovery snapshot");
                true
            }
            Err(e) => {
                tracing::error!(key = %snapshot.document_id, error = %e, "failed to restore recovery snapshot");
                false
            }
        }
    }

    /// Hide the offer and throw the snapshot away
    pub async fn dismiss_recovery(&self) {
        let offered = self.inner.offered.lock().take();
        if let Some(snapshot) = offered {
            self.inner.store.delete(&snapshot.document_id).await;
        }
    }

    /// Forget recovery data after a confirmed server save. Idempotent.
    pub async fn clear_recovery_data(&self) {
        let offered = self.inner.offered.lock().take();
        if let Some(snapshot) = offered {
            self.inner.store.delete(&snapshot.document_id).await;
        }
        if let Some(document) = self.inner.session.state().document {
            self.inner.store.delete(&document.key.store_key()).await;
        }
    }

    /// Move a snapshot from a synthetic key to a server-assigned one
    pub async fn migrate_key(&self, from: &DocumentKey, to: &DocumentKey) {
        if from == to {
            return;
        }
        let (from, to) = (from.store_key(), to.store_key());

        {
            let mut offered = self.inner.offered.lock();
            if let Some(offered) = offered.as_mut().filter(|s| s.document_id == from) {
                offered.document_id = to.clone();
            }
        }

        if let Some(mut snapshot) = self.inner.store.get(&from).await {
            snapshot.document_id = to.clone();
            self.inner.store.put(snapshot).await;
            self.inner.store.delete(&from).await;
            tracing::debug!(%from, %to, "migrated recovery snapshot");
        }
    }

    /// Run [`CrashRecovery::check_recovery`] the first time the session
    /// becomes ready after each load or create
    pub fn spawn_lifecycle_watch(&self) -> JoinHandle<()> {
        let mut events = self.inner.session.subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut armed = true;
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "recovery watch lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return,
                };

                match event.action {
                    ActionKind::Load | ActionKind::Create => armed = true,
                    ActionKind::EditorReady
                        if armed
                            && event.from == LifecycleStatus::Initializing
                            && event.state.status == LifecycleStatus::Ready =>
                    {
                        armed = false;
                        let Some(inner) = weak.upgrade() else { return };
                        CrashRecovery { inner }.check_recovery().await;
                    }
                    _ => {}
                }
            }
        })
    }
}

impl Inner {
    fn start_debounced_write(self: &Arc<Self>) {
        let mut writing = self.writing.lock();
        if self.pending_changes.swap(false, Ordering::SeqCst) {
            let inner = self.clone();
            *writing = Some(tokio::spawn(async move { inner.write_snapshot().await }));
        }
    }

    async fn write_snapshot(&self) -> bool {
        let state = self.session.state();
        let Some(document) = state.document else {
            return false;
        };
        let Some(content) = self.editor.serialized_content() else {
            return false;
        };

        let snapshot = RecoverySnapshot {
            document_id: document.key.store_key(),
            content,
            name: document.name,
            saved_at: Utc::now(),
            server_saved_at: state.last_saved_at,
        };
        tracing::debug!(key = %snapshot.document_id, "writing recovery snapshot");
        self.store.put(snapshot).await;
        true
    }
}

#[async_trait]
impl SaveListener for CrashRecovery {
    async fn on_saved(&self, previous_key: &DocumentKey, document: &Document) {
        self.migrate_key(previous_key, &document.key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot_store::{MemorySnapshotStore, SnapshotStore, StoreError};
    use prototyper_editor::{DocumentContent, DocumentId, MemoryEditor, ProjectData};
    use std::sync::atomic::AtomicUsize;

    /// Counts writes to an in-memory store
    #[derive(Default)]
    struct CountingStore {
        inner: MemorySnapshotStore,
        puts: AtomicUsize,
        put_delay: Duration,
    }

    #[async_trait]
    impl SnapshotStore for CountingStore {
        async fn put(&self, snapshot: RecoverySnapshot) -> Result<(), StoreError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if !self.put_delay.is_zero() {
                tokio::time::sleep(self.put_delay).await;
            }
            self.inner.put(snapshot).await
        }
        async fn get(&self, key: &str) -> Result<Option<RecoverySnapshot>, StoreError> {
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }
        async fn list(&self) -> Result<Vec<RecoverySnapshot>, StoreError> {
            self.inner.list().await
        }
    }

    struct Fixture {
        session: Arc<EditSession>,
        editor: Arc<MemoryEditor>,
        store: Arc<CountingStore>,
        recovery: CrashRecovery,
    }

    fn markup(html: &str) -> DocumentContent {
        DocumentContent {
            data: ProjectData::Markup { html: html.to_string() },
            html: html.to_string(),
        }
    }

    fn fixture(document: Document) -> Fixture {
        fixture_with_store(document, CountingStore::default())
    }

    fn fixture_with_store(document: Document, store: CountingStore) -> Fixture {
        let session = Arc::new(EditSession::new("tab-1"));
        session.load_document("home");
        session.document_loaded(document);
        session.editor_ready();

        let editor = Arc::new(MemoryEditor::with_content(markup("<p>draft</p>")));
        let store = Arc::new(store);
        let recovery = CrashRecovery::new(
            session.clone(),
            editor.clone(),
            BestEffortStore::new(store.clone()),
            RecoveryConfig::default(),
        );

        Fixture { session, editor, store, recovery }
    }

    fn saved_document(updated_at: Option<DateTime<Utc>>) -> Document {
        let mut doc = Document::unsaved("Home");
        doc.key = DocumentKey::Saved(DocumentId::new("proto-1"));
        doc.updated_at = updated_at;
        doc
    }

    fn snapshot(key: &str, saved_at: DateTime<Utc>) -> RecoverySnapshot {
        RecoverySnapshot {
            document_id: key.to_string(),
            content: markup("<p>recovered</p>"),
            name: "Home".to_string(),
            saved_at,
            server_saved_at: None,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_writes_once_after_last_change() {
        let f = fixture(saved_document(None));

        for _ in 0..10 {
            f.recovery.on_content_change();
            tokio::time::sleep(Duration::from_millis(290)).await;
        }
        // Last call at t=2610; window ends at t=5610
        tokio::time::sleep(Duration::from_millis(2700)).await;
        settle().await;
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        settle().await;
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 1);
        assert!(!f.recovery.has_pending_changes());
        assert!(f.store.inner.get("proto-1").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_only_when_pending() {
        let f = fixture(saved_document(None));

        assert!(!f.recovery.flush(FlushReason::TabHidden).await);
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 0);

        f.recovery.on_content_change();
        assert!(f.recovery.flush(FlushReason::Unmount).await);
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 1);

        // The cancelled timer must not write again
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_running_debounced_write() {
        let store = CountingStore {
            put_delay: Duration::from_millis(100),
            ..CountingStore::default()
        };
        let f = fixture_with_store(saved_document(None), store);

        f.recovery.on_content_change();
        // Timer fired at 3000ms; the write is still sleeping inside `put`
        tokio::time::sleep(Duration::from_millis(3050)).await;
        settle().await;
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 1);
        assert!(f.store.inner.get("proto-1").await.unwrap().is_none());

        assert!(f.recovery.flush(FlushReason::Unmount).await);
        assert!(f.store.inner.get("proto-1").await.unwrap().is_some());
        assert_eq!(f.store.puts.load(Ordering::SeqCst), 1);

        // A finished write is not reported again
        assert!(!f.recovery.flush(FlushReason::TabHidden).await);
    }

    #[tokio::test]
    async fn test_newer_snapshot_is_offered() {
        let now = Utc::now();
        let f = fixture(saved_document(Some(now - chrono::Duration::milliseconds(60_000))));
        f.store.put(snapshot("proto-1", now - chrono::Duration::milliseconds(1000))).await.unwrap();

        assert!(f.recovery.check_recovery().await);
        assert!(f.recovery.recovery_available());
        assert_eq!(
            f.recovery.recovery_timestamp(),
            Some(now - chrono::Duration::milliseconds(1000))
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_deleted() {
        let now = Utc::now();
        let f = fixture(saved_document(Some(now - chrono::Duration::milliseconds(1000))));
        f.store.put(snapshot("proto-1", now - chrono::Duration::milliseconds(60_000))).await.unwrap();

        assert!(!f.recovery.check_recovery().await);
        assert!(!f.recovery.recovery_available());
        assert!(f.store.inner.get("proto-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_without_server_timestamp_is_offered() {
        let f = fixture(saved_document(None));
        f.store.put(snapshot("proto-1", Utc::now())).await.unwrap();
        assert!(f.recovery.check_recovery().await);
    }

    #[tokio::test]
    async fn test_restore_applies_and_marks_dirty() {
        let f = fixture(saved_document(None));
        f.store.put(snapshot("proto-1", Utc::now())).await.unwrap();
        f.recovery.check_recovery().await;

        assert!(f.recovery.restore_recovery().await);
        assert!(!f.recovery.recovery_available());
        assert!(f.session.state().dirty);
        assert_eq!(
            f.editor.serialized_content().map(|c| c.html),
            Some("<p>recovered</p>".to_string())
        );
        assert!(f.store.inner.get("proto-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_waits_for_ready() {
        let f = fixture(saved_document(None));
        f.store.put(snapshot("proto-1", Utc::now())).await.unwrap();
        f.recovery.check_recovery().await;

        f.session.save_start(prototyper_editor::SaveType::Autosave);
        assert!(!f.recovery.restore_recovery().await);
        assert!(f.recovery.recovery_available());
        assert!(f.store.inner.get("proto-1").await.unwrap().is_some());
        assert_eq!(
            f.editor.serialized_content().map(|c| c.html),
            Some("<p>draft</p>".to_string())
        );

        f.session.save_abandoned();
        assert!(f.recovery.restore_recovery().await);
        assert!(f.session.state().dirty);
        assert!(f.store.inner.get("proto-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_restore_is_not_fatal() {
        let f = fixture(saved_document(None));
        let mut bad = snapshot("proto-1", Utc::now());
        bad.content.data = ProjectData::Pages { pages: vec![], styles: vec![], assets: vec![] };
        // Bypass validation on read by offering directly
        *f.recovery.inner.offered.lock() = Some(bad);

        assert!(!f.recovery.restore_recovery().await);
        assert!(!f.recovery.recovery_available());
        assert!(!f.session.state().dirty);
    }

    #[tokio::test]
    async fn test_dismiss_and_clear() {
        let f = fixture(saved_document(None));
        f.store.put(snapshot("proto-1", Utc::now())).await.unwrap();
        f.recovery.check_recovery().await;

        f.recovery.dismiss_recovery().await;
        assert!(!f.recovery.recovery_available());
        assert!(f.store.inner.get("proto-1").await.unwrap().is_none());

        f.store.put(snapshot("proto-1", Utc::now())).await.unwrap();
        f.recovery.clear_recovery_data().await;
        f.recovery.clear_recovery_data().await;
        assert!(f.store.inner.get("proto-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_migrate_key() {
        let f = fixture(saved_document(None));
        let from = DocumentKey::Unsaved("abc".into());
        let to = DocumentKey::Saved(DocumentId::new("proto-7"));
        f.store.put(snapshot(&from.store_key(), Utc::now())).await.unwrap();

        f.recovery.migrate_key(&from, &to).await;

        assert!(f.store.inner.get("unsaved:abc").await.unwrap().is_none());
        let moved = f.store.inner.get("proto-7").await.unwrap().unwrap();
        assert_eq!(moved.document_id, "proto-7");
    }

    #[tokio::test]
    async fn test_initialize_purges_expired() {
        let f = fixture(saved_document(None));
        f.store.put(snapshot("old", Utc::now() - chrono::Duration::days(8))).await.unwrap();
        f.store.put(snapshot("new", Utc::now())).await.unwrap();

        assert_eq!(f.recovery.initialize().await, 1);
        assert_eq!(f.store.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_store_never_offers() {
        let session = Arc::new(EditSession::new("tab-1"));
        session.load_document("home");
        session.document_loaded(saved_document(None));
        session.editor_ready();
        let recovery = CrashRecovery::new(
            session,
            Arc::new(MemoryEditor::with_content(markup("<p/>"))),
            BestEffortStore::disabled(),
            RecoveryConfig::default(),
        );

        recovery.on_content_change();
        assert!(recovery.flush(FlushReason::BeforeNavigate).await);
        assert!(!recovery.check_recovery().await);
    }

    #[tokio::test]
    async fn test_lifecycle_watch_checks_on_first_ready() {
        let session = Arc::new(EditSession::new("tab-1"));
        let store = Arc::new(CountingStore::default());
        store.put(snapshot("proto-1", Utc::now())).await.unwrap();
        let recovery = CrashRecovery::new(
            session.clone(),
            Arc::new(MemoryEditor::with_content(markup("<p/>"))),
            BestEffortStore::new(store.clone()),
            RecoveryConfig::default(),
        );
        let watch = recovery.spawn_lifecycle_watch();

        session.load_document("home");
        session.document_loaded(saved_document(None));
        session.editor_ready();
        settle().await;

        assert!(recovery.recovery_available());
        watch.abort();
    }
}
