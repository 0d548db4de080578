//! # Edit Session
//!
//! One editor session's lifecycle state and the only sanctioned way for
//! UI code to change it.
//!
//! An EditSession owns a single [`LifecycleState`]; every named dispatcher
//! routes through [`EditSession::dispatch`], and accepted transitions are
//! published on a broadcast channel so observers (crash recovery, the UI)
//! can react without sharing the state itself.

use crate::document::Document;
use crate::lifecycle::{self, Action, ActionKind, LifecycleState, LifecycleStatus};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Why a save was requested.
///
/// Ordered by urgency so `max` picks the one whose semantics must win.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SaveType {
    #[default]
    Autosave,
    Manual,
}

impl SaveType {
    pub fn is_manual(self) -> bool {
        self == SaveType::Manual
    }
}

impl fmt::Display for SaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveType::Autosave => f.write_str("autosave"),
            SaveType::Manual => f.write_str("manual"),
        }
    }
}

/// Accepted transition
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub action: ActionKind,
    pub from: LifecycleStatus,
    pub previous_document: Option<Document>,
    pub state: LifecycleState,
}

/// Single editor session
pub struct EditSession {
    /// Unique session identifier
    pub id: String,

    state: Mutex<LifecycleState>,
    events: broadcast::Sender<TransitionEvent>,
}

impl EditSession {
    pub fn new(id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: id.into(),
            state: Mutex::new(LifecycleState::default()),
            events,
        }
    }

    /// Current state (cloned)
    pub fn state(&self) -> LifecycleState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> LifecycleStatus {
        self.state.lock().status
    }

    /// Apply an action. Invalid actions are logged and ignored.
    ///
    /// Returns the state after the action.
    pub fn dispatch(&self, action: Action) -> LifecycleState {
        let kind = action.kind();
        let mut guard = self.state.lock();

        let next = match lifecycle::transition(&guard, action) {
            Ok(next) => next,
            Err(rejected) => {
                tracing::warn!(
                    session = %self.id,
                    status = %rejected.status,
                    action = %rejected.action,
                    "ignoring invalid lifecycle transition"
                );
                return guard.clone();
            }
        };

        let from = guard.status;
        let previous_document = guard.document.take();
        *guard = next.clone();
        drop(guard);

        tracing::debug!(session = %self.id, %from, to = %next.status, action = %kind, "transition");

        // No receivers is fine
        let _ = self.events.send(TransitionEvent {
            action: kind,
            from,
            previous_document,
            state: next.clone(),
        });

        next
    }

    /// Subscribe to accepted transitions
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }

    pub fn can_save(&self) -> bool {
        self.state.lock().can_save()
    }

    pub fn can_switch_page(&self) -> bool {
        self.state.lock().can_switch_page()
    }

    pub fn can_autosave(&self) -> bool {
        self.state.lock().can_autosave()
    }

    pub fn can_modify_content(&self) -> bool {
        self.state.lock().can_modify_content()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().is_busy()
    }

    // Named dispatchers

    pub fn load_document(&self, slug: impl Into<String>) -> LifecycleState {
        self.dispatch(Action::Load { slug: slug.into() })
    }

    pub fn document_loaded(&self, document: Document) -> LifecycleState {
        self.dispatch(Action::Loaded { document })
    }

    pub fn load_failed(&self, error: impl Into<String>) -> LifecycleState {
        self.dispatch(Action::LoadFailed { error: error.into() })
    }

    pub fn create_document(&self) -> LifecycleState {
        self.dispatch(Action::Create)
    }

    pub fn document_created(&self, document: Document) -> LifecycleState {
        self.dispatch(Action::Created { document })
    }

    pub fn create_failed(&self, error: impl Into<String>) -> LifecycleState {
        self.dispatch(Action::CreateFailed { error: error.into() })
    }

    pub fn editor_initializing(&self) -> LifecycleState {
        self.dispatch(Action::EditorInitializing)
    }

    pub fn editor_ready(&self) -> LifecycleState {
        self.dispatch(Action::EditorReady)
    }

    pub fn save_start(&self, save_type: SaveType) -> LifecycleState {
        self.dispatch(Action::SaveStart { save_type })
    }

    pub fn save_success(&self, document: Document) -> LifecycleState {
        self.dispatch(Action::SaveSuccess {
            document,
            saved_at: Utc::now(),
        })
    }

    pub fn save_failed(&self, error: impl Into<String>) -> LifecycleState {
        self.dispatch(Action::SaveFailed { error: error.into() })
    }

    pub fn save_abandoned(&self) -> LifecycleState {
        self.dispatch(Action::SaveAbandoned)
    }

    pub fn page_switch_start(&self, page_id: impl Into<String>) -> LifecycleState {
        self.dispatch(Action::PageSwitchStart { page_id: page_id.into() })
    }

    pub fn page_switch_complete(&self) -> LifecycleState {
        self.dispatch(Action::PageSwitchComplete)
    }

    pub fn restore_start(&self, version: u64) -> LifecycleState {
        self.dispatch(Action::RestoreStart { version })
    }

    pub fn restore_complete(&self, document: Document) -> LifecycleState {
        self.dispatch(Action::RestoreComplete {
            document,
            restored_at: Utc::now(),
        })
    }

    pub fn restore_failed(&self, error: impl Into<String>) -> LifecycleState {
        self.dispatch(Action::RestoreFailed { error: error.into() })
    }

    pub fn content_changed(&self) -> LifecycleState {
        self.dispatch(Action::ContentChanged)
    }

    pub fn mark_clean(&self) -> LifecycleState {
        self.dispatch(Action::MarkClean)
    }

    pub fn clear_error(&self) -> LifecycleState {
        self.dispatch(Action::ClearError)
    }

    pub fn reset(&self) -> LifecycleState {
        self.dispatch(Action::Reset)
    }
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
