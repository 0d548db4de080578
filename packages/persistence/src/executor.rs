//! Save executors: how a queued [`SaveRequest`] reaches a backend.

use crate::offline::{OfflineQueue, QueuedSave};
use crate::retry::{with_retry, ErrorClass, RetryFailure, RetryPolicy};
use crate::save_queue::{SaveError, SaveExecutor, SaveOutcome, SaveRequest};
use crate::transport::{Connectivity, DocumentTransport, DocumentUpdate, NewDocument, TransportError};
use async_trait::async_trait;
use prototyper_editor::Document;
use std::sync::Arc;

async fn send(
    transport: &dyn DocumentTransport,
    request: &SaveRequest,
) -> Result<Document, TransportError> {
    match &request.document_id {
        Some(id) => {
            transport
                .update(
                    id,
                    DocumentUpdate {
                        name: request.name.clone(),
                        content: request.content.clone(),
                    },
                )
                .await
        }
        None => {
            transport
                .create(NewDocument {
                    name: request.name.clone(),
                    content: request.content.clone(),
                    owner_id: request.owner_id.clone(),
                })
                .await
        }
    }
}

fn describe(failure: &RetryFailure) -> String {
    match failure.class {
        ErrorClass::Auth => "Your session has expired. Sign in again to save.".to_string(),
        ErrorClass::Permanent => match &failure.error {
            TransportError::NotFound => "This prototype no longer exists.".to_string(),
            error => format!("The server rejected the save: {error}"),
        },
        ErrorClass::Retriable if failure.attempts > 1 => format!(
            "Could not save after {} attempts: {}",
            failure.attempts, failure.error
        ),
        ErrorClass::Retriable => format!("Could not save: {}", failure.error),
    }
}

impl From<RetryFailure> for SaveError {
    fn from(failure: RetryFailure) -> Self {
        SaveError {
            message: describe(&failure),
            class: failure.class,
            attempts: failure.attempts,
        }
    }
}

/// Remote saves with retry, falling back to the offline queue
pub struct RemoteSaveExecutor {
    transport: Arc<dyn DocumentTransport>,
    policy: RetryPolicy,
    connectivity: Connectivity,
    offline: Option<Arc<OfflineQueue>>,
}

impl RemoteSaveExecutor {
    pub fn new(transport: Arc<dyn DocumentTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            connectivity: Connectivity::default(),
            offline: None,
        }
    }

    pub fn with_offline_queue(mut self, connectivity: Connectivity, queue: Arc<OfflineQueue>) -> Self {
        self.connectivity = connectivity;
        self.offline = Some(queue);
        self
    }

    async fn queue_offline(&self, queue: &OfflineQueue, request: &SaveRequest) -> SaveOutcome {
        let entry = QueuedSave::from_request(request);
        let entry_id = entry.id.clone();
        tracing::info!(entry = %entry_id, document = ?request.document_id, "queued save while offline");
        queue.push(entry).await;
        SaveOutcome::QueuedOffline { entry_id }
    }
}

#[async_trait]
impl SaveExecutor for RemoteSaveExecutor {
    async fn execute(&self, request: SaveRequest) -> SaveOutcome {
        if let Some(queue) = &self.offline {
            if !self.connectivity.is_online() {
                return self.queue_offline(queue, &request).await;
            }
        }

        let transport = self.transport.as_ref();
        let pending = &request;
        let result = with_retry(&self.policy, request.save_type, move |attempt| {
            tracing::debug!(attempt, save_type = %pending.save_type, "sending save");
            send(transport, pending)
        })
        .await;

        match result {
            Ok(document) => SaveOutcome::Saved(document),
            Err(failure) => match (&failure.error, &self.offline) {
                (TransportError::Offline, Some(queue)) => self.queue_offline(queue, &request).await,
                _ => SaveOutcome::Failed(failure.into()),
            },
        }
    }
}

/// Single-attempt saves against a local store
pub struct DirectSaveExecutor {
    store: Arc<dyn DocumentTransport>,
}

impl DirectSaveExecutor {
    pub fn new(store: Arc<dyn DocumentTransport>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SaveExecutor for DirectSaveExecutor {
    async fn execute(&self, request: SaveRequest) -> SaveOutcome {
        match send(self.store.as_ref(), &request).await {
            Ok(document) => SaveOutcome::Saved(document),
            Err(error) => SaveOutcome::Failed(SaveError {
                class: ErrorClass::Permanent,
                message: format!("Could not save locally: {error}"),
                attempts: 1,
            }),
        }
    }
}
