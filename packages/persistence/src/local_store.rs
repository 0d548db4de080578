//! Local document backend, used when no server is configured.
//!
//! Layout:
//!
//! ```text
//! {dir}/{id}.json                 current document
//! {dir}/versions/{id}/{n}.json    every confirmed version
//! ```

use crate::transport::{DocumentTransport, DocumentUpdate, NewDocument, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use prototyper_editor::{Document, DocumentId, DocumentKey};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct LocalDocumentStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

fn io_error(e: std::io::Error) -> TransportError {
    TransportError::Network(format!("local store: {e}"))
}

impl LocalDocumentStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(dir.join("versions"))
            .await
            .map_err(io_error)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn version_path(&self, id: &str, version: u64) -> PathBuf {
        self.dir
            .join("versions")
            .join(id)
            .join(format!("{version}.json"))
    }

    async fn read(&self, path: &Path) -> Result<Document, TransportError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::NotFound)
            }
            Err(e) => return Err(io_error(e)),
        };

        let document: Document = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        document
            .content
            .validate()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(document)
    }

    async fn write(&self, document: &Document) -> Result<(), TransportError> {
        let id = document
            .id()
            .ok_or_else(|| TransportError::InvalidResponse("document has no id".into()))?
            .as_str()
            .to_string();
        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        let version_path = self.version_path(&id, document.version);
        if let Some(parent) = version_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&version_path, &json).await.map_err(io_error)?;

        let path = self.document_path(&id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error)?;
        Ok(())
    }

    /// All stored documents, newest first. Unreadable files are skipped.
    pub async fn list(&self) -> Result<Vec<Document>, TransportError> {
        let mut documents = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path).await {
                Ok(document) => documents.push(document),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping document"),
            }
        }
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }
}

#[async_trait]
impl DocumentTransport for LocalDocumentStore {
    async fn fetch(&self, slug: &str) -> Result<Document, TransportError> {
        if slug.is_empty() || slug.contains(['/', '\\', '.']) {
            return Err(TransportError::NotFound);
        }
        self.read(&self.document_path(slug)).await
    }

    async fn create(&self, new: NewDocument) -> Result<Document, TransportError> {
        let _guard = self.write_lock.lock().await;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        let document = Document {
            key: DocumentKey::Saved(DocumentId::new(id.clone())),
            slug: Some(id),
            name: new.name,
            content: new.content,
            owner_id: new.owner_id,
            version: 1,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.write(&document).await?;
        Ok(document)
    }

    async fn update(
        &self,
        id: &DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, TransportError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read(&self.document_path(id.as_str())).await?;

        document.name = update.name;
        document.content = update.content;
        document.version += 1;
        document.updated_at = Some(Utc::now());

        self.write(&document).await?;
        Ok(document)
    }

    async fn restore_version(
        &self,
        id: &DocumentId,
        version: u64,
    ) -> Result<Document, TransportError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(&self.document_path(id.as_str())).await?;
        let old = self.read(&self.version_path(id.as_str(), version)).await?;

        let restored = Document {
            name: old.name,
            content: old.content,
            version: current.version + 1,
            updated_at: Some(Utc::now()),
            ..current
        };
        self.write(&restored).await?;
        Ok(restored)
    }
}
