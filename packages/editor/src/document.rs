//! # Document Model
//!
//! A Document is the user's saved project: identity, display name,
//! structured canvas data plus its HTML rendering, and the timestamps
//! the server assigned on the last confirmed write.
//!
//! Documents can be:
//! - **Saved**: the server (or local store) assigned a [`DocumentId`]
//! - **Unsaved**: freshly created in the editor and keyed by a synthetic
//!   token until the first successful save
//!
//! ## Identity migration
//!
//! ```text
//! create_new() → Unsaved("3f2a…") → first save → Saved("proto-42")
//!                     ↓                                ↓
//!          snapshot "unsaved:3f2a…"   ────────→   snapshot "proto-42"
//! ```

use crate::errors::ContentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const UNSAVED_PREFIX: &str = "unsaved:";

/// Server-assigned document identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key a document is tracked under, before and after its first save
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DocumentKey {
    Saved(DocumentId),
    Unsaved(String),
}

impl DocumentKey {
    /// Fresh synthetic key for a document that has never been saved
    pub fn unsaved() -> Self {
        DocumentKey::Unsaved(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn id(&self) -> Option<&DocumentId> {
        match self {
            DocumentKey::Saved(id) => Some(id),
            DocumentKey::Unsaved(_) => None,
        }
    }

    /// Synthetic token of a document that has never been saved
    pub fn draft(&self) -> Option<&str> {
        match self {
            DocumentKey::Saved(_) => None,
            DocumentKey::Unsaved(token) => Some(token),
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, DocumentKey::Saved(_))
    }

    /// String form used by local stores
    pub fn store_key(&self) -> String {
        match self {
            DocumentKey::Saved(id) => id.as_str().to_string(),
            DocumentKey::Unsaved(token) => format!("{UNSAVED_PREFIX}{token}"),
        }
    }

    /// Inverse of [`DocumentKey::store_key`]
    pub fn from_store_key(key: &str) -> Self {
        match key.strip_prefix(UNSAVED_PREFIX) {
            Some(token) => DocumentKey::Unsaved(token.to_string()),
            None => DocumentKey::Saved(DocumentId::new(key)),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.store_key())
    }
}

/// One canvas page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub id: String,
    pub name: String,

    /// Component tree for the page, opaque to persistence
    #[serde(default)]
    pub frames: Vec<serde_json::Value>,
}

/// Structured project data as produced by the editor canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectData {
    /// Multi-page project
    Pages {
        pages: Vec<PageData>,
        #[serde(default)]
        styles: Vec<serde_json::Value>,
        #[serde(default)]
        assets: Vec<serde_json::Value>,
    },

    /// Older documents that only kept their markup
    Markup { html: String },
}

impl ProjectData {
    /// Blank single-page project
    pub fn blank() -> Self {
        ProjectData::Pages {
            pages: vec![PageData {
                id: "page-1".to_string(),
                name: "Page 1".to_string(),
                frames: Vec::new(),
            }],
            styles: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            ProjectData::Pages { pages, .. } => {
                if pages.is_empty() {
                    return Err(ContentError::NoPages);
                }
                let mut seen = HashSet::new();
                for page in pages {
                    if page.id.is_empty() {
                        return Err(ContentError::EmptyPageId);
                    }
                    if !seen.insert(page.id.as_str()) {
                        return Err(ContentError::DuplicatePage(page.id.clone()));
                    }
                }
                Ok(())
            }
            ProjectData::Markup { .. } => Ok(()),
        }
    }

    pub fn page_ids(&self) -> Vec<&str> {
        match self {
            ProjectData::Pages { pages, .. } => pages.iter().map(|p| p.id.as_str()).collect(),
            ProjectData::Markup { .. } => Vec::new(),
        }
    }
}

/// Serializable editor content: structured data plus its HTML rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub data: ProjectData,
    pub html: String,
}

impl DocumentContent {
    pub fn blank() -> Self {
        Self {
            data: ProjectData::blank(),
            html: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        self.data.validate()
    }
}

/// Editable prototype document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub key: DocumentKey,

    /// URL slug (saved documents only)
    #[serde(default)]
    pub slug: Option<String>,

    pub name: String,

    pub content: DocumentContent,

    /// Owning team
    #[serde(default)]
    pub owner_id: Option<String>,

    /// Server-assigned version, incremented on every confirmed write
    #[serde(default)]
    pub version: u64,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// New document that exists only in the editor
    pub fn unsaved(name: impl Into<String>) -> Self {
        Self {
            key: DocumentKey::unsaved(),
            slug: None,
            name: name.into(),
            content: DocumentContent::blank(),
            owner_id: None,
            version: 0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn id(&self) -> Option<&DocumentId> {
        self.key.id()
    }
}
