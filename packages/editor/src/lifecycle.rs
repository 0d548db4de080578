//! # Editor Lifecycle
//!
//! Pure state machine governing which document operations are legal.
//!
//! ```text
//! uninitialized ─load──→ loading ──loaded──→ initializing ──editor_ready──→ ready
//!       │                   └─load_failed─→ error                         │  ↑
//!       └─create─→ creating ─created─→ initializing                       │  │
//!                     └─create_failed─→ error          save_start ────────┘  │
//!                                                      page_switch_start     │
//!                                                      restore_start ────────┘
//!                                                      (→ saving / page_switching /
//!                                                         restoring_version → ready)
//! ```
//!
//! The status plus [`valid_actions`] is the only authority on whether an
//! action is accepted. Rejected actions leave the state untouched.
//!
//! Save and restore failures return to `ready`: a failed save keeps the
//! user's edits and lets them retry. Only load/create failures, which leave
//! no usable document, escalate to `error`.

use crate::document::Document;
use crate::errors::TransitionRejected;
use crate::session::SaveType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of lifecycle statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Uninitialized,
    Loading,
    Creating,
    Initializing,
    Ready,
    PageSwitching,
    Saving,
    RestoringVersion,
    Error,
}

impl LifecycleStatus {
    pub const ALL: [LifecycleStatus; 9] = [
        LifecycleStatus::Uninitialized,
        LifecycleStatus::Loading,
        LifecycleStatus::Creating,
        LifecycleStatus::Initializing,
        LifecycleStatus::Ready,
        LifecycleStatus::PageSwitching,
        LifecycleStatus::Saving,
        LifecycleStatus::RestoringVersion,
        LifecycleStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStatus::Uninitialized => "uninitialized",
            LifecycleStatus::Loading => "loading",
            LifecycleStatus::Creating => "creating",
            LifecycleStatus::Initializing => "initializing",
            LifecycleStatus::Ready => "ready",
            LifecycleStatus::PageSwitching => "page_switching",
            LifecycleStatus::Saving => "saving",
            LifecycleStatus::RestoringVersion => "restoring_version",
            LifecycleStatus::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary data scoped to the transition that produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionMeta {
    #[default]
    None,
    Loading { slug: String },
    Creating,
    Saving { save_type: SaveType },
    PageSwitch { page_id: String },
    Restoring { version: u64 },
}

/// Lifecycle snapshot; replaced wholesale on each transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleState {
    pub status: LifecycleStatus,

    /// Last confirmed document
    pub document: Option<Document>,

    /// Local edits exist since the last confirmed save
    pub dirty: bool,

    pub error: Option<String>,

    pub meta: TransitionMeta,

    pub last_saved_at: Option<DateTime<Utc>>,

    /// Status to return to when leaving `error`
    pub previous_status: Option<LifecycleStatus>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            status: LifecycleStatus::Uninitialized,
            document: None,
            dirty: false,
            error: None,
            meta: TransitionMeta::None,
            last_saved_at: None,
            previous_status: None,
        }
    }
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_save(&self) -> bool {
        can_save(self)
    }

    pub fn can_switch_page(&self) -> bool {
        can_switch_page(self)
    }

    pub fn can_autosave(&self) -> bool {
        can_autosave(self)
    }

    pub fn can_modify_content(&self) -> bool {
        can_modify_content(self)
    }

    pub fn is_loading(&self) -> bool {
        is_loading(self)
    }

    pub fn is_busy(&self) -> bool {
        is_busy(self)
    }

    /// Most recent server timestamp known for the current document
    pub fn server_timestamp(&self) -> Option<DateTime<Utc>> {
        self.document
            .as_ref()
            .and_then(|doc| doc.updated_at)
            .or(self.last_saved_at)
    }
}

/// Lifecycle actions
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Load { slug: String },
    Loaded { document: Document },
    LoadFailed { error: String },
    Create,
    Created { document: Document },
    CreateFailed { error: String },
    EditorInitializing,
    EditorReady,
    SaveStart { save_type: SaveType },
    SaveSuccess { document: Document, saved_at: DateTime<Utc> },
    SaveFailed { error: String },
    /// Leave `saving` without an outcome, e.g. when a newer save replaced this one
    SaveAbandoned,
    PageSwitchStart { page_id: String },
    PageSwitchComplete,
    RestoreStart { version: u64 },
    RestoreComplete { document: Document, restored_at: DateTime<Utc> },
    RestoreFailed { error: String },
    ContentChanged,
    MarkClean,
    ClearError,
    Reset,
}

/// Payload-free discriminant of [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Load,
    Loaded,
    LoadFailed,
    Create,
    Created,
    CreateFailed,
    EditorInitializing,
    EditorReady,
    SaveStart,
    SaveSuccess,
    SaveFailed,
    SaveAbandoned,
    PageSwitchStart,
    PageSwitchComplete,
    RestoreStart,
    RestoreComplete,
    RestoreFailed,
    ContentChanged,
    MarkClean,
    ClearError,
    Reset,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Load => "load",
            ActionKind::Loaded => "loaded",
            ActionKind::LoadFailed => "load_failed",
            ActionKind::Create => "create",
            ActionKind::Created => "created",
            ActionKind::CreateFailed => "create_failed",
            ActionKind::EditorInitializing => "editor_initializing",
            ActionKind::EditorReady => "editor_ready",
            ActionKind::SaveStart => "save_start",
            ActionKind::SaveSuccess => "save_success",
            ActionKind::SaveFailed => "save_failed",
            ActionKind::SaveAbandoned => "save_abandoned",
            ActionKind::PageSwitchStart => "page_switch_start",
            ActionKind::PageSwitchComplete => "page_switch_complete",
            ActionKind::RestoreStart => "restore_start",
            ActionKind::RestoreComplete => "restore_complete",
            ActionKind::RestoreFailed => "restore_failed",
            ActionKind::ContentChanged => "content_changed",
            ActionKind::MarkClean => "mark_clean",
            ActionKind::ClearError => "clear_error",
            ActionKind::Reset => "reset",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Load { .. } => ActionKind::Load,
            Action::Loaded { .. } => ActionKind::Loaded,
            Action::LoadFailed { .. } => ActionKind::LoadFailed,
            Action::Create => ActionKind::Create,
            Action::Created { .. } => ActionKind::Created,
            Action::CreateFailed { .. } => ActionKind::CreateFailed,
            Action::EditorInitializing => ActionKind::EditorInitializing,
            Action::EditorReady => ActionKind::EditorReady,
            Action::SaveStart { .. } => ActionKind::SaveStart,
            Action::SaveSuccess { .. } => ActionKind::SaveSuccess,
            Action::SaveFailed { .. } => ActionKind::SaveFailed,
            Action::SaveAbandoned => ActionKind::SaveAbandoned,
            Action::PageSwitchStart { .. } => ActionKind::PageSwitchStart,
            Action::PageSwitchComplete => ActionKind::PageSwitchComplete,
            Action::RestoreStart { .. } => ActionKind::RestoreStart,
            Action::RestoreComplete { .. } => ActionKind::RestoreComplete,
            Action::RestoreFailed { .. } => ActionKind::RestoreFailed,
            Action::ContentChanged => ActionKind::ContentChanged,
            Action::MarkClean => ActionKind::MarkClean,
            Action::ClearError => ActionKind::ClearError,
            Action::Reset => ActionKind::Reset,
        }
    }
}

/// Actions accepted in each status
pub fn valid_actions(status: LifecycleStatus) -> &'static [ActionKind] {
    use ActionKind as A;

    match status {
        LifecycleStatus::Uninitialized => &[
            A::Load,
            A::Create,
            A::EditorInitializing,
            A::EditorReady,
            A::Reset,
        ],
        LifecycleStatus::Loading => &[A::Loaded, A::LoadFailed, A::Reset],
        LifecycleStatus::Creating => &[A::Created, A::CreateFailed, A::Reset],
        // `load` here is a safety net for re-entrant navigation
        LifecycleStatus::Initializing => &[A::EditorReady, A::Load, A::Reset],
        LifecycleStatus::Ready => &[
            A::Load,
            A::SaveStart,
            A::PageSwitchStart,
            A::RestoreStart,
            A::ContentChanged,
            A::MarkClean,
            A::Reset,
        ],
        LifecycleStatus::PageSwitching => &[A::PageSwitchComplete, A::Reset],
        LifecycleStatus::Saving => &[A::SaveSuccess, A::SaveFailed, A::SaveAbandoned, A::Reset],
        LifecycleStatus::RestoringVersion => &[A::RestoreComplete, A::RestoreFailed, A::Reset],
        LifecycleStatus::Error => &[A::ClearError, A::Load, A::Create, A::Reset],
    }
}

pub fn is_valid(status: LifecycleStatus, action: ActionKind) -> bool {
    valid_actions(status).contains(&action)
}

/// Apply `action` to `state`, or explain why it is not allowed
pub fn transition(
    state: &LifecycleState,
    action: Action,
) -> Result<LifecycleState, TransitionRejected> {
    let kind = action.kind();
    if !is_valid(state.status, kind) {
        return Err(TransitionRejected {
            status: state.status,
            action: kind,
        });
    }

    let next = match action {
        Action::Reset => LifecycleState::default(),

        Action::Load { slug } => LifecycleState {
            status: LifecycleStatus::Loading,
            error: None,
            meta: TransitionMeta::Loading { slug },
            ..state.clone()
        },

        Action::Loaded { document } => LifecycleState {
            status: LifecycleStatus::Initializing,
            last_saved_at: document.updated_at,
            document: Some(document),
            dirty: false,
            error: None,
            meta: TransitionMeta::None,
            previous_status: None,
        },

        Action::LoadFailed { error } | Action::CreateFailed { error } => LifecycleState {
            status: LifecycleStatus::Error,
            error: Some(error),
            meta: TransitionMeta::None,
            previous_status: Some(state.status),
            ..state.clone()
        },

        Action::Create => LifecycleState {
            status: LifecycleStatus::Creating,
            error: None,
            meta: TransitionMeta::Creating,
            ..state.clone()
        },

        Action::Created { document } => LifecycleState {
            status: LifecycleStatus::Initializing,
            last_saved_at: document.updated_at,
            document: Some(document),
            dirty: false,
            error: None,
            meta: TransitionMeta::None,
            previous_status: None,
        },

        Action::EditorInitializing => LifecycleState {
            status: LifecycleStatus::Initializing,
            meta: TransitionMeta::None,
            ..state.clone()
        },

        Action::EditorReady => LifecycleState {
            status: LifecycleStatus::Ready,
            meta: TransitionMeta::None,
            ..state.clone()
        },

        Action::SaveStart { save_type } => LifecycleState {
            status: LifecycleStatus::Saving,
            meta: TransitionMeta::Saving { save_type },
            ..state.clone()
        },

        Action::SaveSuccess { document, saved_at } => LifecycleState {
            status: LifecycleStatus::Ready,
            document: Some(document),
            dirty: false,
            error: None,
            meta: TransitionMeta::None,
            last_saved_at: Some(saved_at),
            ..state.clone()
        },

        // Dirty is preserved; a failed save never blocks further edits.
        Action::SaveFailed { error } | Action::RestoreFailed { error } => LifecycleState {
            status: LifecycleStatus::Ready,
            error: Some(error),
            meta: TransitionMeta::None,
            ..state.clone()
        },

        Action::SaveAbandoned => LifecycleState {
            status: LifecycleStatus::Ready,
            meta: TransitionMeta::None,
            ..state.clone()
        },

        Action::PageSwitchStart { page_id } => LifecycleState {
            status: LifecycleStatus::PageSwitching,
            meta: TransitionMeta::PageSwitch { page_id },
            ..state.clone()
        },

        Action::PageSwitchComplete => LifecycleState {
            status: LifecycleStatus::Ready,
            meta: TransitionMeta::None,
            ..state.clone()
        },

        Action::RestoreStart { version } => LifecycleState {
            status: LifecycleStatus::RestoringVersion,
            meta: TransitionMeta::Restoring { version },
            ..state.clone()
        },

        Action::RestoreComplete {
            document,
            restored_at,
        } => LifecycleState {
            status: LifecycleStatus::Ready,
            document: Some(document),
            dirty: false,
            error: None,
            meta: TransitionMeta::None,
            last_saved_at: Some(restored_at),
            ..state.clone()
        },

        Action::ContentChanged => LifecycleState {
            dirty: true,
            ..state.clone()
        },

        Action::MarkClean => LifecycleState {
            dirty: false,
            ..state.clone()
        },

        Action::ClearError => LifecycleState {
            status: state
                .previous_status
                .unwrap_or(LifecycleStatus::Uninitialized),
            error: None,
            meta: TransitionMeta::None,
            previous_status: None,
            ..state.clone()
        },
    };

    Ok(next)
}

/// Total form of [`transition`]: rejected actions are logged and the
/// input state is returned unchanged.
pub fn reduce(state: &LifecycleState, action: Action) -> LifecycleState {
    match transition(state, action) {
        Ok(next) => next,
        Err(rejected) => {
            tracing::warn!(
                status = %rejected.status,
                action = %rejected.action,
                "ignoring invalid lifecycle transition"
            );
            state.clone()
        }
    }
}

pub fn can_save(state: &LifecycleState) -> bool {
    state.status == LifecycleStatus::Ready
}

pub fn can_switch_page(state: &LifecycleState) -> bool {
    state.status == LifecycleStatus::Ready
}

pub fn can_autosave(state: &LifecycleState) -> bool {
    state.status == LifecycleStatus::Ready && state.dirty && state.document.is_some()
}

pub fn can_modify_content(state: &LifecycleState) -> bool {
    matches!(
        state.status,
        LifecycleStatus::Ready | LifecycleStatus::Initializing
    )
}

/// `initializing` is deliberately excluded: the editing surface has to be
/// mounted in that status for the editor to report readiness.
pub fn is_loading(state: &LifecycleState) -> bool {
    matches!(
        state.status,
        LifecycleStatus::Loading | LifecycleStatus::Creating
    )
}

pub fn is_busy(state: &LifecycleState) -> bool {
    matches!(
        state.status,
        LifecycleStatus::Loading
            | LifecycleStatus::Creating
            | LifecycleStatus::Saving
            | LifecycleStatus::RestoringVersion
            | LifecycleStatus::PageSwitching
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use crate::DocumentKey;

    fn saved_document(id: &str) -> Document {
        let mut doc = Document::unsaved("Prototype");
        doc.key = DocumentKey::Saved(DocumentId::new(id));
        doc.updated_at = Some(Utc::now());
        doc
    }

    fn sample_action(kind: ActionKind) -> Action {
        let doc = saved_document("proto-1");
        match kind {
            ActionKind::Load => Action::Load { slug: "home".into() },
            ActionKind::Loaded => Action::Loaded { document: doc },
            ActionKind::LoadFailed => Action::LoadFailed { error: "boom".into() },
            ActionKind::Create => Action::Create,
            ActionKind::Created => Action::Created { document: doc },
            ActionKind::CreateFailed => Action::CreateFailed { error: "boom".into() },
            ActionKind::EditorInitializing => Action::EditorInitializing,
            ActionKind::EditorReady => Action::EditorReady,
            ActionKind::SaveStart => Action::SaveStart { save_type: SaveType::Manual },
            ActionKind::SaveSuccess => Action::SaveSuccess { document: doc, saved_at: Utc::now() },
            ActionKind::SaveFailed => Action::SaveFailed { error: "boom".into() },
            ActionKind::SaveAbandoned => Action::SaveAbandoned,
            ActionKind::PageSwitchStart => Action::PageSwitchStart { page_id: "p2".into() },
            ActionKind::PageSwitchComplete => Action::PageSwitchComplete,
            ActionKind::RestoreStart => Action::RestoreStart { version: 3 },
            ActionKind::RestoreComplete => Action::RestoreComplete {
                document: doc,
                restored_at: Utc::now(),
            },
            ActionKind::RestoreFailed => Action::RestoreFailed { error: "boom".into() },
            ActionKind::ContentChanged => Action::ContentChanged,
            ActionKind::MarkClean => Action::MarkClean,
            ActionKind::ClearError => Action::ClearError,
            ActionKind::Reset => Action::Reset,
        }
    }

    const ALL_KINDS: [ActionKind; 21] = [
        ActionKind::Load,
        ActionKind::Loaded,
        ActionKind::LoadFailed,
        ActionKind::Create,
        ActionKind::Created,
        ActionKind::CreateFailed,
        ActionKind::EditorInitializing,
        ActionKind::EditorReady,
        ActionKind::SaveStart,
        ActionKind::SaveSuccess,
        ActionKind::SaveFailed,
        ActionKind::SaveAbandoned,
        ActionKind::PageSwitchStart,
        ActionKind::PageSwitchComplete,
        ActionKind::RestoreStart,
        ActionKind::RestoreComplete,
        ActionKind::RestoreFailed,
        ActionKind::ContentChanged,
        ActionKind::MarkClean,
        ActionKind::ClearError,
        ActionKind::Reset,
    ];

    fn state_in(status: LifecycleStatus) -> LifecycleState {
        LifecycleState {
            status,
            document: Some(saved_document("proto-1")),
            dirty: true,
            error: Some("earlier".into()),
            meta: TransitionMeta::None,
            last_saved_at: Some(Utc::now()),
            previous_status: Some(LifecycleStatus::Loading),
        }
    }

    fn ready() -> LifecycleState {
        let state = reduce(&LifecycleState::new(), Action::Load { slug: "home".into() });
        let state = reduce(&state, Action::Loaded { document: saved_document("proto-1") });
        reduce(&state, Action::EditorReady)
    }

    #[test]
    fn test_invalid_actions_leave_state_unchanged() {
        for status in LifecycleStatus::ALL {
            let state = state_in(status);
            for kind in ALL_KINDS {
                if is_valid(status, kind) {
                    continue;
                }
                let next = reduce(&state, sample_action(kind));
                assert_eq!(next, state, "{kind} from {status} should be ignored");
                assert!(transition(&state, sample_action(kind)).is_err());
            }
        }
    }

    #[test]
    fn test_reset_is_accepted_everywhere() {
        for status in LifecycleStatus::ALL {
            let next = reduce(&state_in(status), Action::Reset);
            assert_eq!(next, LifecycleState::default());
        }
    }

    #[test]
    fn test_load_to_ready() {
        let state = ready();
        assert_eq!(state.status, LifecycleStatus::Ready);
        assert!(!state.dirty);
        assert!(state.last_saved_at.is_some());
        assert!(state.can_save());
    }

    #[test]
    fn test_save_failure_returns_to_ready() {
        let state = reduce(&ready(), Action::ContentChanged);
        let state = reduce(&state, Action::SaveStart { save_type: SaveType::Manual });
        assert_eq!(state.status, LifecycleStatus::Saving);
        assert!(!state.can_save());
        assert_eq!(state.meta, TransitionMeta::Saving { save_type: SaveType::Manual });

        let state = reduce(&state, Action::SaveFailed { error: "server down".into() });
        assert_eq!(state.status, LifecycleStatus::Ready);
        assert_eq!(state.error.as_deref(), Some("server down"));
        assert!(state.dirty);
        assert!(state.can_save());
    }

    #[test]
    fn test_abandoned_save_returns_to_ready_without_error() {
        let state = reduce(&ready(), Action::ContentChanged);
        let state = reduce(&state, Action::SaveStart { save_type: SaveType::Manual });
        let state = reduce(&state, Action::SaveAbandoned);
        assert_eq!(state.status, LifecycleStatus::Ready);
        assert!(state.error.is_none());
        assert!(state.dirty);
        assert_eq!(state.meta, TransitionMeta::None);

        // Only meaningful while saving
        let ignored = reduce(&state, Action::SaveAbandoned);
        assert_eq!(ignored, state);
    }

    #[test]
    fn test_dirty_round_trip() {
        let state = reduce(&ready(), Action::ContentChanged);
        assert!(state.dirty);
        assert!(state.can_autosave());

        let cleaned = reduce(&state, Action::MarkClean);
        assert!(!cleaned.dirty);

        let state = reduce(&state, Action::SaveStart { save_type: SaveType::Autosave });
        assert!(state.dirty, "save_start must not clear dirty");
        let saved_at = Utc::now();
        let state = reduce(
            &state,
            Action::SaveSuccess { document: saved_document("proto-1"), saved_at },
        );
        assert!(!state.dirty);
        assert_eq!(state.last_saved_at, Some(saved_at));
    }

    #[test]
    fn test_page_switch_keeps_dirty() {
        let state = reduce(&ready(), Action::ContentChanged);
        let state = reduce(&state, Action::PageSwitchStart { page_id: "p2".into() });
        assert_eq!(state.status, LifecycleStatus::PageSwitching);
        assert!(!state.can_switch_page());
        let state = reduce(&state, Action::PageSwitchComplete);
        assert_eq!(state.status, LifecycleStatus::Ready);
        assert!(state.dirty);
    }

    #[test]
    fn test_restore_replaces_document() {
        let state = reduce(&ready(), Action::ContentChanged);
        let state = reduce(&state, Action::RestoreStart { version: 2 });
        assert_eq!(state.meta, TransitionMeta::Restoring { version: 2 });

        let mut restored = saved_document("proto-1");
        restored.version = 2;
        let state = reduce(
            &state,
            Action::RestoreComplete { document: restored.clone(), restored_at: Utc::now() },
        );
        assert_eq!(state.status, LifecycleStatus::Ready);
        assert_eq!(state.document, Some(restored));
        assert!(!state.dirty);
    }

    #[test]
    fn test_load_failure_recovers_through_clear_error() {
        let state = reduce(&LifecycleState::new(), Action::Load { slug: "x".into() });
        let state = reduce(&state, Action::LoadFailed { error: "500".into() });
        assert_eq!(state.status, LifecycleStatus::Error);
        assert_eq!(state.previous_status, Some(LifecycleStatus::Loading));

        let state = reduce(&state, Action::ClearError);
        assert_eq!(state.status, LifecycleStatus::Loading);
        assert!(state.error.is_none());
        assert!(state.previous_status.is_none());
    }

    #[test]
    fn test_error_allows_fresh_create() {
        let state = reduce(&LifecycleState::new(), Action::Create);
        let state = reduce(&state, Action::CreateFailed { error: "no team".into() });
        let state = reduce(&state, Action::Create);
        assert_eq!(state.status, LifecycleStatus::Creating);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_initializing_accepts_reentrant_load() {
        let state = reduce(&LifecycleState::new(), Action::Create);
        let state = reduce(&state, Action::Created { document: Document::unsaved("New") });
        assert_eq!(state.status, LifecycleStatus::Initializing);
        assert!(state.can_modify_content());
        assert!(!state.is_loading());

        let state = reduce(&state, Action::Load { slug: "other".into() });
        assert_eq!(state.status, LifecycleStatus::Loading);
        assert!(state.is_loading());
        assert!(state.is_busy());
    }

    #[test]
    fn test_direct_editor_ready() {
        let state = reduce(&LifecycleState::new(), Action::EditorReady);
        assert_eq!(state.status, LifecycleStatus::Ready);
        assert!(!state.can_autosave(), "no document yet");
    }

    #[test]
    fn test_server_timestamp_prefers_document() {
        let mut state = ready();
        let doc_time = state.document.as_ref().and_then(|d| d.updated_at);
        state.last_saved_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert_eq!(state.server_timestamp(), doc_time);

        if let Some(doc) = state.document.as_mut() {
            doc.updated_at = None;
        }
        assert_eq!(state.server_timestamp(), state.last_saved_at);
    }
}
