//! # Prototyper Persistence
//!
//! Everything between an [`EditSession`](prototyper_editor::EditSession) and
//! durable storage.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  save/load   ┌──────────────┐   execute   ┌──────────────────┐
//! │  Persistence  │ ───────────→ │  SaveQueue   │ ──────────→ │ SaveExecutor     │
//! │  (facade)     │              │ 1 in flight  │             │  retry / offline │
//! └───────┬───────┘              │ 1 pending    │             └────────┬─────────┘
//!         │ on_saved             └──────────────┘                      │
//!         ▼                                                            ▼
//! ┌───────────────┐   snapshots  ┌──────────────┐             ┌──────────────────┐
//! │ CrashRecovery │ ───────────→ │ SnapshotStore│             │DocumentTransport │
//! └───────────────┘              └──────────────┘             │ HTTP / local     │
//!                                                             └──────────────────┘
//! ```

pub mod config;
mod executor;
mod http;
mod local_store;
mod offline;
mod persistence;
mod recovery;
pub mod retry;
mod save_queue;
mod snapshot_store;
mod transport;

pub use config::{ConfigError, PersistenceConfig, RetryConfig, DEFAULT_CONFIG_NAME};
pub use executor::{DirectSaveExecutor, RemoteSaveExecutor};
pub use http::HttpTransport;
pub use local_store::LocalDocumentStore;
pub use offline::{DrainReport, OfflineQueue, QueuedSave};
pub use persistence::{
    Backend, LoadOutcome, Persistence, SaveListener, TeamContext, MSG_CANNOT_SAVE,
    MSG_EDITOR_NOT_READY, MSG_NO_TEAM, MSG_OFFLINE, MSG_SELECT_TEAM,
    MSG_TEAM_LOADING,
};
pub use recovery::{CrashRecovery, FlushReason, RecoveryConfig};
pub use retry::{classify, ErrorClass, RetryPolicy};
pub use save_queue::{SaveError, SaveExecutor, SaveOutcome, SaveQueue, SaveRequest};
pub use snapshot_store::{
    BestEffortStore, FileSnapshotStore, MemorySnapshotStore, RecoverySnapshot, SnapshotStore,
    StoreError,
};
pub use transport::{Connectivity, DocumentTransport, DocumentUpdate, NewDocument, TransportError};
