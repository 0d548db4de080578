//! # Prototyper Editor
//!
//! Document model and lifecycle engine for the prototyping canvas.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ canvas (external): renders components       │
//! │  - implements EditorInstance                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Document model + lifecycle          │
//! │  - Pure transition table                    │
//! │  - Guard predicates (can_save, is_busy, …)  │
//! │  - EditSession event surface                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ persistence: save queue, recovery, backends │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Status is the only authority**: an action not listed for the
//!    current status is a logged no-op, never a panic
//! 2. **Failures never trap**: a failed save returns to `ready`
//! 3. **Pure reducer**: timestamps travel on actions, not in the reducer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prototyper_editor::{EditSession, SaveType};
//!
//! let session = EditSession::new("tab-1");
//! session.load_document("landing-page");
//! session.document_loaded(document);
//! session.editor_ready();
//!
//! session.content_changed();
//! if session.can_save() {
//!     session.save_start(SaveType::Manual);
//! }
//! ```

mod document;
mod errors;
mod instance;
pub mod lifecycle;
mod session;

pub use document::{Document, DocumentContent, DocumentId, DocumentKey, PageData, ProjectData};
pub use errors::{ContentError, EditorError, TransitionRejected};
pub use instance::{EditorInstance, MemoryEditor};
pub use lifecycle::{
    reduce, transition, Action, ActionKind, LifecycleState, LifecycleStatus, TransitionMeta,
};
pub use session::{EditSession, SaveType, TransitionEvent};
