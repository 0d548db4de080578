//! Error types for the editor

use crate::lifecycle::{ActionKind, LifecycleStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Invalid content: {0}")]
    Content(#[from] ContentError),

    #[error("Editor is not ready")]
    NotReady,

    #[error("Unknown page: {0}")]
    UnknownPage(String),
}

/// Structured content that failed validation at a serialization boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("project has no pages")]
    NoPages,

    #[error("duplicate page id `{0}`")]
    DuplicatePage(String),

    #[error("page id must not be empty")]
    EmptyPageId,
}

/// An action that is not listed for the current status.
///
/// Carries enough context to log the rejection; the state it was
/// dispatched against is left untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("action `{action}` is not valid while `{status}`")]
pub struct TransitionRejected {
    pub status: LifecycleStatus,
    pub action: ActionKind,
}
