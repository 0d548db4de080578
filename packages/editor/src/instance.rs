//! # Editor Instance
//!
//! The live canvas editor, seen from the persistence side. Rendering and
//! component wiring stay behind this trait.

use crate::document::{DocumentContent, ProjectData};
use crate::errors::EditorError;
use parking_lot::Mutex;

/// Live editor collaborator
pub trait EditorInstance: Send + Sync {
    /// Current content, or `None` while the canvas cannot yet produce a
    /// serializable snapshot
    fn serialized_content(&self) -> Option<DocumentContent>;

    /// Replace the canvas content
    fn load_serialized_content(&self, data: &ProjectData) -> Result<(), EditorError>;

    /// Show another page of the current project
    fn select_page(&self, page_id: &str) -> Result<(), EditorError>;
}

/// In-memory editor used by headless sessions and tests.
///
/// Holds content as plain data; `html` is regenerated naively from the
/// markup variant and otherwise kept as last set.
#[derive(Debug, Default)]
pub struct MemoryEditor {
    inner: Mutex<MemoryEditorState>,
}

#[derive(Debug, Default)]
struct MemoryEditorState {
    content: Option<DocumentContent>,
    current_page: Option<String>,
}

impl MemoryEditor {
    /// Editor that has not mounted yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: DocumentContent) -> Self {
        let editor = Self::new();
        editor.set_content(content);
        editor
    }

    /// Simulate a user edit
    pub fn set_content(&self, content: DocumentContent) {
        let mut inner = self.inner.lock();
        inner.current_page = content.data.page_ids().first().map(|id| id.to_string());
        inner.content = Some(content);
    }

    pub fn current_page(&self) -> Option<String> {
        self.inner.lock().current_page.clone()
    }
}

impl EditorInstance for MemoryEditor {
    fn serialized_content(&self) -> Option<DocumentContent> {
        self.inner.lock().content.clone()
    }

    fn load_serialized_content(&self, data: &ProjectData) -> Result<(), EditorError> {
        data.validate()?;
        let html = match data {
            ProjectData::Markup { html } => html.clone(),
            ProjectData::Pages { .. } => self
                .inner
                .lock()
                .content
                .as_ref()
                .map(|c| c.html.clone())
                .unwrap_or_default(),
        };
        self.set_content(DocumentContent {
            data: data.clone(),
            html,
        });
        Ok(())
    }

    fn select_page(&self, page_id: &str) -> Result<(), EditorError> {
        let mut inner = self.inner.lock();
        let content = inner.content.as_ref().ok_or(EditorError::NotReady)?;
        if !content.data.page_ids().contains(&page_id) {
            return Err(EditorError::UnknownPage(page_id.to_string()));
        }
        inner.current_page = Some(page_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageData;
    use crate::errors::ContentError;

    #[test]
    fn test_unmounted_editor_has_no_content() {
        let editor = MemoryEditor::new();
        assert!(editor.serialized_content().is_none());
        assert!(matches!(editor.select_page("page-1"), Err(EditorError::NotReady)));
    }

    #[test]
    fn test_load_rejects_invalid_data() {
        let editor = MemoryEditor::new();
        let bad = ProjectData::Pages { pages: vec![], styles: vec![], assets: vec![] };
        assert!(matches!(
            editor.load_serialized_content(&bad),
            Err(EditorError::Content(ContentError::NoPages))
        ));
        assert!(editor.serialized_content().is_none());
    }

    #[test]
    fn test_select_page() {
        let editor = MemoryEditor::with_content(DocumentContent {
            data: ProjectData::Pages {
                pages: vec![
                    PageData { id: "a".into(), name: "A".into(), frames: vec![] },
                    PageData { id: "b".into(), name: "B".into(), frames: vec![] },
                ],
                styles: vec![],
                assets: vec![],
            },
            html: String::new(),
        });
        assert_eq!(editor.current_page().as_deref(), Some("a"));
        editor.select_page("b").unwrap();
        assert_eq!(editor.current_page().as_deref(), Some("b"));
        assert!(matches!(editor.select_page("c"), Err(EditorError::UnknownPage(id)) if id == "c"));
    }
}
