//! # Save Queue
//!
//! Serializes saves for one document: at most one request in flight and
//! at most one waiting behind it.
//!
//! ```text
//! enqueue(A) ──→ in flight ─────────────────→ Saved(A)
//! enqueue(B) ──→ pending
//! enqueue(C) ──→ pending (B resolves Superseded, C inherits B's urgency)
//!                          A settles ──→ drain C ──→ Saved(C)
//! ```
//!
//! Nothing in flight is ever cancelled; only the waiting request can be
//! replaced. In-flight work runs on a spawned task, so a caller dropping
//! its future never wedges the queue.

use crate::retry::ErrorClass;
use async_trait::async_trait;
use parking_lot::Mutex;
use prototyper_editor::{Document, DocumentContent, DocumentId, SaveType};
use std::sync::Arc;
use tokio::sync::oneshot;

/// One save attempt's input
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub save_type: SaveType,
    /// Server identity; `None` creates the document
    pub document_id: Option<DocumentId>,
    /// Synthetic key of a document that has not been created yet
    pub draft_key: Option<String>,
    pub name: String,
    pub content: DocumentContent,
    pub owner_id: Option<String>,
}

/// A save that did not go through
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SaveError {
    pub class: ErrorClass,
    /// User-facing description
    pub message: String,
    pub attempts: u32,
}

impl SaveError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Permanent,
            message: message.into(),
            attempts: 0,
        }
    }
}

/// Result of [`SaveQueue::enqueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Document),
    /// Stored for replay once connectivity returns
    QueuedOffline { entry_id: String },
    Failed(SaveError),
    /// Replaced by a newer request before it ran. Not a failure.
    Superseded,
}

impl SaveOutcome {
    pub fn document(&self) -> Option<&Document> {
        match self {
            SaveOutcome::Saved(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, SaveOutcome::Superseded)
    }
}

/// Performs a single (possibly retried) save
#[async_trait]
pub trait SaveExecutor: Send + Sync {
    async fn execute(&self, request: SaveRequest) -> SaveOutcome;
}

struct Pending {
    request: SaveRequest,
    reply: oneshot::Sender<SaveOutcome>,
}

#[derive(Default)]
struct QueueState {
    in_flight: bool,
    pending: Option<Pending>,
    disposed: bool,
}

struct Shared {
    executor: Arc<dyn SaveExecutor>,
    state: Mutex<QueueState>,
}

/// Per-document save serializer
#[derive(Clone)]
pub struct SaveQueue {
    shared: Arc<Shared>,
}

impl SaveQueue {
    pub fn new(executor: Arc<dyn SaveExecutor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Submit a save. Resolves when this request has run, been
    /// superseded, or the queue was disposed.
    pub async fn enqueue(&self, request: SaveRequest) -> SaveOutcome {
        let (reply, rx) = oneshot::channel();

        {
            let mut state = self.shared.state.lock();

            if state.disposed {
                return SaveOutcome::Failed(SaveError::permanent("Save queue has been disposed"));
            }

            if state.in_flight {
                let mut request = request;
                if let Some(previous) = state.pending.take() {
                    request.save_type = request.save_type.max(previous.request.save_type);
                    tracing::debug!(
                        superseded = %previous.request.save_type,
                        effective = %request.save_type,
                        "superseding pending save"
                    );
                    let _ = previous.reply.send(SaveOutcome::Superseded);
                }
                state.pending = Some(Pending { request, reply });
            } else {
                state.in_flight = true;
                tokio::spawn(drive(self.shared.clone(), Pending { request, reply }));
            }
        }

        rx.await.unwrap_or(SaveOutcome::Superseded)
    }

    pub fn is_idle(&self) -> bool {
        let state = self.shared.state.lock();
        !state.in_flight && state.pending.is_none()
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Stop accepting saves. A waiting request resolves as superseded;
    /// the in-flight one (if any) still completes.
    pub fn dispose(&self) {
        let mut state = self.shared.state.lock();
        state.disposed = true;
        if let Some(pending) = state.pending.take() {
            let _ = pending.reply.send(SaveOutcome::Superseded);
        }
    }

    /// Accept saves again after [`SaveQueue::dispose`]
    pub fn reinitialize(&self) {
        self.shared.state.lock().disposed = false;
    }
}

/// Run `first`, then keep draining the pending slot until it is empty
async fn drive(shared: Arc<Shared>, first: Pending) {
    let mut next = first;

    loop {
        let Pending { request, reply } = next;
        let outcome = shared.executor.execute(request).await;
        let _ = reply.send(outcome);

        // Let callers observe the settled save before the next one starts
        tokio::task::yield_now().await;

        let pending = {
            let mut state = shared.state.lock();
            let pending = state.pending.take();
            if pending.is_none() {
                state.in_flight = false;
            }
            pending
        };

        match pending {
            Some(pending) => next = pending,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Semaphore;

    /// Records each request; waits for a permit before finishing
    struct GatedExecutor {
        gate: Semaphore,
        seen: Mutex<Vec<SaveRequest>>,
    }

    impl GatedExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SaveExecutor for GatedExecutor {
        async fn execute(&self, request: SaveRequest) -> SaveOutcome {
            self.seen.lock().push(request.clone());
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            let mut doc = Document::unsaved(request.name);
            doc.key = prototyper_editor::DocumentKey::Saved(DocumentId::new("proto-1"));
            SaveOutcome::Saved(doc)
        }
    }

    fn request(name: &str, save_type: SaveType) -> SaveRequest {
        SaveRequest {
            save_type,
            document_id: Some(DocumentId::new("proto-1")),
            draft_key: None,
            name: name.to_string(),
            content: DocumentContent::blank(),
            owner_id: None,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_idle_queue_runs_immediately() {
        let executor = GatedExecutor::new();
        executor.gate.add_permits(1);
        let queue = SaveQueue::new(executor.clone());

        let outcome = queue.enqueue(request("A", SaveType::Manual)).await;
        assert_eq!(outcome.document().map(|d| d.name.as_str()), Some("A"));
        settle().await;
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_coalesces_and_upgrades() {
        let executor = GatedExecutor::new();
        let queue = SaveQueue::new(executor.clone());

        let a = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("A", SaveType::Autosave)).await }
        });
        settle().await;

        let b = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("B", SaveType::Autosave)).await }
        });
        settle().await;
        assert!(queue.has_pending());

        let c = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("C", SaveType::Manual)).await }
        });
        settle().await;

        assert_eq!(b.await.unwrap(), SaveOutcome::Superseded);

        executor.gate.add_permits(2);
        assert!(a.await.unwrap().document().is_some());
        let c = c.await.unwrap();
        assert_eq!(c.document().map(|d| d.name.as_str()), Some("C"));

        let seen = executor.seen.lock();
        let names: Vec<&str> = seen.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(seen[1].save_type, SaveType::Manual);
    }

    #[tokio::test]
    async fn test_manual_is_never_downgraded() {
        let executor = GatedExecutor::new();
        let queue = SaveQueue::new(executor.clone());

        let _a = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("A", SaveType::Autosave)).await }
        });
        settle().await;
        let b = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("B", SaveType::Manual)).await }
        });
        settle().await;
        let c = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("C", SaveType::Autosave)).await }
        });
        settle().await;

        executor.gate.add_permits(2);
        assert!(b.await.unwrap().is_superseded());
        assert!(c.await.unwrap().document().is_some());
        assert_eq!(executor.seen.lock()[1].save_type, SaveType::Manual);
    }

    #[tokio::test]
    async fn test_dispose_supersedes_pending_and_rejects_new() {
        let executor = GatedExecutor::new();
        let queue = SaveQueue::new(executor.clone());

        let a = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("A", SaveType::Manual)).await }
        });
        settle().await;
        let b = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(request("B", SaveType::Manual)).await }
        });
        settle().await;

        queue.dispose();
        assert!(b.await.unwrap().is_superseded());
        assert!(matches!(
            queue.enqueue(request("C", SaveType::Manual)).await,
            SaveOutcome::Failed(_)
        ));

        executor.gate.add_permits(1);
        assert!(a.await.unwrap().document().is_some(), "in-flight save still completes");

        queue.reinitialize();
        executor.gate.add_permits(1);
        assert!(queue.enqueue(request("D", SaveType::Manual)).await.document().is_some());
    }
}
