//! One editing surface bound to the document list.
//!
//! The session is the edit path: it moves markup from the surface into the
//! store and plain text into the analysis driver. Annotation itself happens in
//! the driver, which shares the surface.

use glossa_common::documents::DocumentPatch;
use glossa_common::storage::KeyValueStore;
use glossa_common::{Document, DocumentStore, GlossaError};

use crate::format::{FormatCommand, FormatError};
use crate::scheduler::AnalysisHandle;
use crate::surface::{EditorSurface, PlatformError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] GlossaError),
    #[error("editor surface error: {0}")]
    Surface(#[from] PlatformError),
    #[error(transparent)]
    Format(#[from] FormatError),
}

pub struct EditorSession<K, S> {
    store: DocumentStore<K>,
    surface: S,
    analysis: AnalysisHandle,
}

impl<K, S> EditorSession<K, S>
where
    K: KeyValueStore,
    S: EditorSurface,
{
    /// Bind a store and surface, loading the active document if there is one.
    pub fn new(
        store: DocumentStore<K>,
        surface: S,
        analysis: AnalysisHandle,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            store,
            surface,
            analysis,
        };
        session.open_active()?;
        Ok(session)
    }

    pub fn store(&self) -> &DocumentStore<K> {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Make `id` active and show its content.
    pub fn open(&mut self, id: &str) -> Result<(), SessionError> {
        let content = self.store.select(id)?.content.clone();
        self.load_surface(&content)
    }

    /// Show whatever the store considers active, or clear the surface.
    pub fn open_active(&mut self) -> Result<(), SessionError> {
        let content = self
            .store
            .active()
            .map(|d| d.content.clone())
            .unwrap_or_default();
        self.load_surface(&content)
    }

    fn load_surface(&mut self, content: &str) -> Result<(), SessionError> {
        self.surface.set_markup(content)?;
        self.analysis.content_changed(self.surface.plain_text());
        Ok(())
    }

    /// The user edited the surface.
    ///
    /// Stores the new markup on the active document and schedules analysis of
    /// the new text. Returns the updated document, `None` if nothing is active.
    pub fn on_input(&mut self) -> Result<Option<Document>, SessionError> {
        let Some(id) = self.store.active_id().cloned() else {
            return Ok(None);
        };
        let doc = self
            .store
            .update(&id, DocumentPatch::content(self.surface.markup()))?;
        if !self.analysis.content_changed(self.surface.plain_text()) {
            tracing::debug!(target: "glossa::scheduler", "analysis driver stopped, edit not analyzed");
        }
        Ok(Some(doc))
    }

    /// Rename the active document.
    pub fn set_title(&mut self, title: &str) -> Result<Option<Document>, SessionError> {
        let Some(id) = self.store.active_id().cloned() else {
            return Ok(None);
        };
        Ok(Some(self.store.update(&id, DocumentPatch::title(title))?))
    }

    /// Create a new document and open it.
    pub fn create_document(&mut self) -> Result<Document, SessionError> {
        let doc = self.store.create();
        self.load_surface(&doc.content)?;
        Ok(doc)
    }

    pub fn toggle_pin(&mut self, id: &str) -> Result<Document, SessionError> {
        Ok(self.store.toggle_pin(id)?)
    }

    /// Delete a document. Deleting the open one opens whatever the store
    /// selects next, or clears the surface.
    pub fn delete_document(&mut self, id: &str) -> Result<Document, SessionError> {
        let was_active = self.store.active_id().is_some_and(|active| active == id);
        let removed = self.store.delete(id)?;
        if was_active {
            self.open_active()?;
        }
        Ok(removed)
    }

    /// Run a toolbar command against the surface.
    ///
    /// Formatting changes the markup, so it goes through the edit path.
    pub fn apply_format(&mut self, name: &str, value: Option<&str>) -> Result<(), SessionError> {
        let command = FormatCommand::parse(name, value)?;
        self.surface.exec_command(&command)?;
        self.on_input()?;
        Ok(())
    }
}
