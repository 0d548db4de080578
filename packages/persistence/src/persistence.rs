//! # Persistence Facade
//!
//! Save, load, create, page switch and version restore for one editor
//! session. Every operation is guarded by the lifecycle, runs through the
//! save queue where it writes, and is translated back into lifecycle
//! events. Nothing here returns an error to the caller: outcomes are
//! values, and user-facing failure text is kept in [`Persistence::last_error`].

use crate::executor::{DirectSaveExecutor, RemoteSaveExecutor};
use crate::offline::{DrainReport, OfflineQueue};
use crate::retry::RetryPolicy;
use crate::save_queue::{SaveExecutor, SaveOutcome, SaveQueue, SaveRequest};
use crate::transport::{Connectivity, DocumentTransport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use prototyper_editor::{
    Document, DocumentContent, DocumentKey, EditSession, EditorInstance, LifecycleStatus, SaveType,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

const DEFAULT_NAME: &str = "Untitled prototype";

pub const MSG_CANNOT_SAVE: &str = "The prototype can't be saved right now. Try again in a moment.";
pub const MSG_EDITOR_NOT_READY: &str = "The editor is still loading. Try again in a moment.";
pub const MSG_TEAM_LOADING: &str = "Team information is still loading. Try saving again in a moment.";
pub const MSG_NO_TEAM: &str = "You need to belong to a team before you can save prototypes.";
pub const MSG_SELECT_TEAM: &str = "Select a team to save this prototype to.";
pub const MSG_OFFLINE: &str =
    "You're offline. Your changes were queued and will be saved when the connection returns.";

/// Which team a new document would belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamContext {
    Loading,
    Unavailable,
    Available {
        teams: Vec<String>,
        selected: Option<String>,
    },
}

impl TeamContext {
    /// Owning team for a first save, or the message explaining why there
    /// is none
    pub fn owner(&self) -> Result<String, &'static str> {
        match self {
            TeamContext::Loading => Err(MSG_TEAM_LOADING),
            TeamContext::Unavailable => Err(MSG_NO_TEAM),
            TeamContext::Available { teams, .. } if teams.is_empty() => Err(MSG_NO_TEAM),
            TeamContext::Available { selected: None, .. } => Err(MSG_SELECT_TEAM),
            TeamContext::Available {
                selected: Some(team),
                ..
            } => Ok(team.clone()),
        }
    }
}

/// Notified after every confirmed save
#[async_trait]
pub trait SaveListener: Send + Sync {
    /// `previous_key` is the key the document had before this save; it
    /// differs from `document.key` on a document's first save.
    async fn on_saved(&self, previous_key: &DocumentKey, document: &Document);
}

/// Where documents live
pub enum Backend {
    Remote {
        transport: Arc<dyn DocumentTransport>,
        offline: Arc<OfflineQueue>,
        connectivity: Connectivity,
    },
    Local {
        store: Arc<dyn DocumentTransport>,
    },
}

impl Backend {
    fn documents(&self) -> &dyn DocumentTransport {
        match self {
            Backend::Remote { transport, .. } => transport.as_ref(),
            Backend::Local { store } => store.as_ref(),
        }
    }

    fn is_remote(&self) -> bool {
        matches!(self, Backend::Remote { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Document),
    /// The document does not exist; the host should navigate away
    NotFound,
    Failed(String),
    /// The lifecycle did not allow a load
    Rejected,
}

pub struct Persistence {
    session: Arc<EditSession>,
    editor: Arc<dyn EditorInstance>,
    backend: Backend,
    queue: SaveQueue,
    team: Mutex<TeamContext>,
    listeners: Mutex<Vec<Arc<dyn SaveListener>>>,
    last_error: Mutex<Option<String>>,
}

impl Persistence {
    /// Remote backend with retry and offline queueing
    pub fn remote(
        session: Arc<EditSession>,
        editor: Arc<dyn EditorInstance>,
        transport: Arc<dyn DocumentTransport>,
        offline: Arc<OfflineQueue>,
        connectivity: Connectivity,
        policy: RetryPolicy,
    ) -> Self {
        let executor = RemoteSaveExecutor::new(transport.clone(), policy)
            .with_offline_queue(connectivity.clone(), offline.clone());
        let persistence = Self::with_executor(
            session,
            editor,
            Backend::Remote {
                transport,
                offline,
                connectivity,
            },
            Arc::new(executor),
        );
        // Queued first saves must follow the document to its server key
        if let Backend::Remote { offline, .. } = &persistence.backend {
            persistence.add_listener(offline.clone());
        }
        persistence
    }

    /// Local store backend; no team is needed to create documents
    pub fn local(
        session: Arc<EditSession>,
        editor: Arc<dyn EditorInstance>,
        store: Arc<dyn DocumentTransport>,
    ) -> Self {
        let executor = DirectSaveExecutor::new(store.clone());
        Self::with_executor(session, editor, Backend::Local { store }, Arc::new(executor))
    }

    fn with_executor(
        session: Arc<EditSession>,
        editor: Arc<dyn EditorInstance>,
        backend: Backend,
        executor: Arc<dyn SaveExecutor>,
    ) -> Self {
        let team = if backend.is_remote() {
            TeamContext::Loading
        } else {
            TeamContext::Unavailable
        };

        Self {
            session,
            editor,
            backend,
            queue: SaveQueue::new(executor),
            team: Mutex::new(team),
            listeners: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<EditSession> {
        &self.session
    }

    pub fn save_queue(&self) -> &SaveQueue {
        &self.queue
    }

    /// Stop accepting saves, e.g. when the editor unmounts
    pub fn dispose(&self) {
        self.queue.dispose();
    }

    pub fn set_team_context(&self, context: TeamContext) {
        *self.team.lock() = context;
    }

    pub fn add_listener(&self, listener: Arc<dyn SaveListener>) {
        self.listeners.lock().push(listener);
    }

    /// Last user-facing failure, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn clear_last_error(&self) {
        *self.last_error.lock() = None;
    }

    fn surface(&self, save_type: SaveType, message: &str) {
        if save_type.is_manual() {
            *self.last_error.lock() = Some(message.to_string());
        } else {
            tracing::debug!(%message, "autosave failed quietly");
        }
    }

    async fn notify_saved(&self, previous_key: &DocumentKey, document: &Document) {
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in listeners {
            listener.on_saved(previous_key, document).await;
        }
    }

    /// Save the editor's current content.
    ///
    /// Resolves with the confirmed document, or `None` when the save was
    /// rejected, failed, queued offline or superseded.
    pub async fn save(&self, save_type: SaveType) -> Option<Document> {
        let state = self.session.state();
        let allowed = match save_type {
            SaveType::Manual => state.can_save(),
            SaveType::Autosave => state.can_autosave(),
        };
        if !allowed {
            self.surface(save_type, MSG_CANNOT_SAVE);
            return None;
        }

        let Some(content) = self.editor.serialized_content() else {
            self.surface(save_type, MSG_EDITOR_NOT_READY);
            return None;
        };

        let started = self.session.save_start(save_type);
        if started.status != LifecycleStatus::Saving {
            return None;
        }

        let document = state
            .document
            .unwrap_or_else(|| Document::unsaved(DEFAULT_NAME));
        let previous_key = document.key.clone();

        let owner_id = if !previous_key.is_saved() && self.backend.is_remote() {
            let owner = self.team.lock().owner();
            match owner {
                Ok(team) => Some(team),
                Err(message) => {
                    self.session.save_failed(message);
                    self.surface(save_type, message);
                    return None;
                }
            }
        } else {
            document.owner_id.clone()
        };

        let request = SaveRequest {
            save_type,
            document_id: previous_key.id().cloned(),
            draft_key: previous_key.draft().map(str::to_string),
            name: document.name.clone(),
            content,
            owner_id,
        };

        match self.queue.enqueue(request).await {
            SaveOutcome::Saved(saved) => {
                tracing::info!(key = %saved.key, version = saved.version, %save_type, "saved");
                self.session.save_success(saved.clone());
                self.clear_last_error();
                self.notify_saved(&previous_key, &saved).await;
                Some(saved)
            }
            SaveOutcome::QueuedOffline { .. } => {
                self.session.save_failed(MSG_OFFLINE);
                self.surface(save_type, MSG_OFFLINE);
                None
            }
            SaveOutcome::Failed(error) => {
                tracing::warn!(%error, class = ?error.class, attempts = error.attempts, "save failed");
                self.session.save_failed(error.message.clone());
                // Reaching here means retries are exhausted or pointless
                *self.last_error.lock() = Some(error.message);
                None
            }
            SaveOutcome::Superseded => {
                tracing::debug!(%save_type, "save superseded");
                self.session.save_abandoned();
                None
            }
        }
    }

    /// Load a saved document by slug
    pub async fn load(&self, slug: &str) -> LoadOutcome {
        if self.session.load_document(slug).status != LifecycleStatus::Loading {
            return LoadOutcome::Rejected;
        }

        match self.backend.documents().fetch(slug).await {
            Ok(document) => {
                if let Err(e) = self.editor.load_serialized_content(&document.content.data) {
                    tracing::error!(%slug, error = %e, "editor rejected loaded content");
                }
                self.session.document_loaded(document.clone());
                LoadOutcome::Loaded(document)
            }
            Err(TransportError::NotFound) => {
                tracing::info!(%slug, "prototype not found");
                self.session.reset();
                LoadOutcome::NotFound
            }
            Err(e) => {
                let message = format!("Could not load prototype: {e}");
                self.session.load_failed(message.clone());
                LoadOutcome::Failed(message)
            }
        }
    }

    /// Start a blank document that exists only in the editor until its
    /// first save
    pub async fn create_new(&self, name: Option<&str>) -> Option<Document> {
        if self.session.create_document().status != LifecycleStatus::Creating {
            return None;
        }

        let document = Document::unsaved(name.unwrap_or(DEFAULT_NAME));
        if let Err(e) = self
            .editor
            .load_serialized_content(&document.content.data)
        {
            let message = format!("Could not start a new prototype: {e}");
            self.session.create_failed(message.clone());
            *self.last_error.lock() = Some(message);
            return None;
        }

        self.session.document_created(document.clone());
        Some(document)
    }

    /// Show another page. Returns whether the editor switched.
    pub async fn switch_page(&self, page_id: &str) -> bool {
        if !self.session.can_switch_page() {
            return false;
        }
        self.session.page_switch_start(page_id);

        let switched = match self.editor.select_page(page_id) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%page_id, error = %e, "page switch failed");
                *self.last_error.lock() = Some(e.to_string());
                false
            }
        };

        self.session.page_switch_complete();
        switched
    }

    /// Replace the document with a stored version
    pub async fn restore_version(&self, version: u64) -> Option<Document> {
        let state = self.session.state();
        let id = state.document.as_ref().and_then(|d| d.id()).cloned()?;

        if self.session.restore_start(version).status != LifecycleStatus::RestoringVersion {
            return None;
        }

        let restored = match self.backend.documents().restore_version(&id, version).await {
            Ok(document) => document,
            Err(e) => {
                let message = format!("Could not restore version {version}: {e}");
                self.session.restore_failed(message.clone());
                *self.last_error.lock() = Some(message);
                return None;
            }
        };

        if let Err(e) = self.editor.load_serialized_content(&restored.content.data) {
            let message = format!("Could not show version {version}: {e}");
            self.session.restore_failed(message.clone());
            *self.last_error.lock() = Some(message);
            return None;
        }

        self.session.restore_complete(restored.clone());
        Some(restored)
    }

    /// Replay saves queued while offline. Replays of the open document are
    /// folded into the session.
    pub async fn replay_offline(&self) -> DrainReport {
        let Backend::Remote { offline, .. } = &self.backend else {
            return DrainReport::default();
        };

        let report = offline.drain(&self.queue).await;

        for (queued_key, document) in &report.replayed {
            let current = self.session.state().document;
            let Some(current) = current else { continue };

            if queued_key.as_ref() != Some(&current.key) || !self.session.can_save() {
                continue;
            }

            let dirty = self.session.state().dirty;
            self.session.save_start(SaveType::Autosave);
            self.session.save_success(document.clone());
            if dirty && self.editor.serialized_content().as_ref() != Some(&document.content) {
                // Edits made after the entry was queued are still unsaved
                self.session.content_changed();
            }
            self.notify_saved(&current.key, document).await;
        }

        report
    }

    /// Replay the offline queue on every offline → online edge
    pub fn watch_connectivity(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let Backend::Remote { connectivity, .. } = &self.backend else {
            return None;
        };
        let mut online = connectivity.subscribe();
        let this = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    let Some(this) = this.upgrade() else { return };
                    let report = this.replay_offline().await;
                    tracing::info!(
                        replayed = report.replayed.len(),
                        dropped = report.dropped,
                        remaining = report.remaining,
                        "connectivity restored"
                    );
                }
                was_online = now_online;
            }
        }))
    }

    /// Current editor content, for hosts that export it
    pub fn content(&self) -> Option<DocumentContent> {
        self.editor.serialized_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_context_messages() {
        assert_eq!(TeamContext::Loading.owner(), Err(MSG_TEAM_LOADING));
        assert_eq!(TeamContext::Unavailable.owner(), Err(MSG_NO_TEAM));
        assert_eq!(
            TeamContext::Available { teams: vec![], selected: None }.owner(),
            Err(MSG_NO_TEAM)
        );
        assert_eq!(
            TeamContext::Available { teams: vec!["t1".into()], selected: None }.owner(),
            Err(MSG_SELECT_TEAM)
        );
        assert_eq!(
            TeamContext::Available { teams: vec!["t1".into()], selected: Some("t1".into()) }
                .owner(),
            Ok("t1".to_string())
        );
    }
}
