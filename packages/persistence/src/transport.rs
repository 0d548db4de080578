//! Document transports and connectivity.
//!
//! A transport performs document CRUD. It must report failures precisely
//! enough for the retry layer to tell "not found", "auth", "client error"
//! and "transient" apart.

use async_trait::async_trait;
use prototyper_editor::{Document, DocumentContent, DocumentId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Document not found")]
    NotFound,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Too many requests")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Offline")]
    Offline,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Map an HTTP status to the matching error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 | 410 => TransportError::NotFound,
            401 | 403 => TransportError::Unauthorized(message),
            429 => TransportError::RateLimited,
            400..=499 => TransportError::Client { status, message },
            _ => TransportError::Server { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound)
    }
}

/// Body of a create call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub name: String,
    pub content: DocumentContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Body of an update call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub name: String,
    pub content: DocumentContent,
}

/// Document CRUD backend
#[async_trait]
pub trait DocumentTransport: Send + Sync {
    /// Fetch by slug (saved documents are addressed by slug in URLs)
    async fn fetch(&self, slug: &str) -> Result<Document, TransportError>;

    /// Create; the returned document carries its assigned identity
    async fn create(&self, document: NewDocument) -> Result<Document, TransportError>;

    async fn update(
        &self,
        id: &DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, TransportError>;

    /// Replace the current content with a stored version
    async fn restore_version(
        &self,
        id: &DocumentId,
        version: u64,
    ) -> Result<Document, TransportError>;
}

/// Online/offline signal shared by transports and the save layer
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
