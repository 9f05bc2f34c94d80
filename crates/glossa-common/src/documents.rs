//! The document list: ordering, the active document, and persistence.
//!
//! The list is kept sorted at all times: pinned documents first, then most
//! recently modified first. Every mutation stamps `last_modified`, re-sorts and
//! writes the whole list to the backing [`KeyValueStore`]. Storage failures are
//! logged and otherwise ignored; losing a save must never interrupt editing.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr};

use crate::error::{GlossaError, ParseError, SerDeError, StorageError};
use crate::storage::KeyValueStore;

/// Key the serialized document list lives under.
pub const STORAGE_KEY: &str = "notes";

pub const DEFAULT_TITLE: &str = "Welcome Note";
pub const DEFAULT_CONTENT: &str = "Start writing your notes here...";
pub const UNTITLED: &str = "Untitled Note";

pub type DocumentId = SmolStr;

/// One note. `content` is a markup string as produced by the editing surface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_pinned: bool,
    /// Serialized as RFC 3339 text.
    pub last_modified: DateTime<Utc>,
}

impl Document {
    /// The document shown when nothing could be loaded.
    pub fn welcome(now: DateTime<Utc>) -> Self {
        Self {
            id: SmolStr::new_static("1"),
            title: DEFAULT_TITLE.to_owned(),
            content: DEFAULT_CONTENT.to_owned(),
            is_pinned: false,
            last_modified: now,
        }
    }
}

/// Fields to change in [`DocumentStore::update`]. `None` leaves a field alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
}

impl DocumentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    fn apply(self, doc: &mut Document) {
        if let Some(title) = self.title {
            doc.title = title;
        }
        if let Some(content) = self.content {
            doc.content = content;
        }
        if let Some(is_pinned) = self.is_pinned {
            doc.is_pinned = is_pinned;
        }
    }
}

/// List ordering: pinned first, then newest first.
pub fn compare_documents(a: &Document, b: &Document) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.last_modified.cmp(&a.last_modified))
}

/// Stable sort, so documents equal under [`compare_documents`] keep their order.
pub fn sort_documents(documents: &mut [Document]) {
    documents.sort_by(compare_documents);
}

/// Owns the document list and which document is being edited.
#[derive(Debug)]
pub struct DocumentStore<K> {
    documents: Vec<Document>,
    active: Option<DocumentId>,
    backend: K,
    last_stamp: Option<DateTime<Utc>>,
}

impl<K: KeyValueStore> DocumentStore<K> {
    /// Load the list from `backend`, falling back to a single welcome document
    /// if nothing is stored or what is stored cannot be read.
    pub fn load(backend: K) -> Self {
        let documents = match read_documents(&backend) {
            Ok(Some(documents)) => documents,
            Ok(None) => {
                tracing::debug!(target: "glossa::store", "no stored documents, starting fresh");
                vec![Document::welcome(Utc::now())]
            }
            Err(e) => {
                tracing::error!(
                    target: "glossa::store",
                    error = ?miette::Report::new(e),
                    "failed to load documents, falling back to default"
                );
                vec![Document::welcome(Utc::now())]
            }
        };
        Self::from_documents(documents, backend)
    }

    /// Build a store around an existing list without writing anything.
    pub fn from_documents(mut documents: Vec<Document>, backend: K) -> Self {
        sort_documents(&mut documents);
        let active = documents.first().map(|d| d.id.clone());
        let last_stamp = documents.iter().map(|d| d.last_modified).max();
        Self {
            documents,
            active,
            backend,
            last_stamp,
        }
    }

    /// All documents in display order.
    pub fn list(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn active_id(&self) -> Option<&DocumentId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Document> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Make `id` the active document.
    pub fn select(&mut self, id: &str) -> Result<&Document, GlossaError> {
        let idx = self.position(id)?;
        self.active = Some(self.documents[idx].id.clone());
        Ok(&self.documents[idx])
    }

    /// Create an empty untitled document and make it active.
    pub fn create(&mut self) -> Document {
        let now = self.stamp();
        let mut id = now.timestamp_millis().to_smolstr();
        let mut bump = 0i64;
        while self.get(&id).is_some() {
            bump += 1;
            id = (now.timestamp_millis() + bump).to_smolstr();
        }
        let doc = Document {
            id,
            title: UNTITLED.to_owned(),
            content: String::new(),
            is_pinned: false,
            last_modified: now,
        };
        tracing::debug!(target: "glossa::store", id = %doc.id, "created document");
        self.documents.push(doc.clone());
        self.active = Some(doc.id.clone());
        self.commit();
        doc
    }

    /// Merge `patch` into the document and stamp it.
    pub fn update(&mut self, id: &str, patch: DocumentPatch) -> Result<Document, GlossaError> {
        let idx = self.position(id)?;
        let now = self.stamp();
        let doc = &mut self.documents[idx];
        patch.apply(doc);
        doc.last_modified = now;
        let doc = doc.clone();
        self.commit();
        Ok(doc)
    }

    /// Flip the pinned flag and stamp the document.
    pub fn toggle_pin(&mut self, id: &str) -> Result<Document, GlossaError> {
        let idx = self.position(id)?;
        let now = self.stamp();
        let doc = &mut self.documents[idx];
        doc.is_pinned = !doc.is_pinned;
        doc.last_modified = now;
        let doc = doc.clone();
        tracing::debug!(target: "glossa::store", id = %doc.id, pinned = doc.is_pinned, "toggled pin");
        self.commit();
        Ok(doc)
    }

    /// Remove a document. If it was active, the first remaining document in
    /// list order becomes active, or none if the list is now empty.
    pub fn delete(&mut self, id: &str) -> Result<Document, GlossaError> {
        let idx = self.position(id)?;
        let removed = self.documents.remove(idx);
        if self.active.as_deref() == Some(id) {
            self.active = self.documents.first().map(|d| d.id.clone());
            tracing::debug!(
                target: "glossa::store",
                removed = %removed.id,
                active = ?self.active,
                "deleted active document, reselected"
            );
        }
        self.commit();
        Ok(removed)
    }

    fn position(&self, id: &str) -> Result<usize, GlossaError> {
        self.documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| GlossaError::DocumentNotFound(id.to_smolstr()))
    }

    /// Current time, strictly after every stamp this store has handed out so
    /// mutations within one clock tick still order by recency.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn commit(&mut self) {
        sort_documents(&mut self.documents);
        if let Err(e) = write_documents(&mut self.backend, &self.documents) {
            tracing::error!(
                target: "glossa::store",
                error = %e,
                "failed to persist documents"
            );
        }
    }
}

fn read_documents<K: KeyValueStore>(backend: &K) -> Result<Option<Vec<Document>>, GlossaError> {
    let Some(text) = backend.get(STORAGE_KEY)? else {
        return Ok(None);
    };
    let documents: Vec<Document> = ParseError::parse_json(STORAGE_KEY, &text)
        .map_err(|e| e.with_advice("the stored note list is not valid; it will be replaced"))?;
    Ok(Some(documents))
}

fn write_documents<K: KeyValueStore>(
    backend: &mut K,
    documents: &[Document],
) -> Result<(), StorageError> {
    let text = serde_json::to_string(documents).map_err(SerDeError::from)?;
    backend.set(STORAGE_KEY, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn doc(id: &str, pinned: bool, secs: i64) -> Document {
        Document {
            id: id.into(),
            title: id.to_owned(),
            content: String::new(),
            is_pinned: pinned,
            last_modified: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn ids<K: KeyValueStore>(store: &DocumentStore<K>) -> Vec<&str> {
        store.list().iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_sort_pinned_then_newest() {
        let mut docs = vec![
            doc("a", false, 10),
            doc("b", true, 5),
            doc("c", false, 20),
            doc("d", true, 7),
        ];
        sort_documents(&mut docs);
        let order: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, ["d", "b", "c", "a"]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut docs = vec![doc("x", false, 10), doc("y", false, 10), doc("z", false, 10)];
        sort_documents(&mut docs);
        let order: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, ["x", "y", "z"]);
    }

    #[test]
    fn test_toggle_pin_reorders_by_fresh_stamp() {
        let mut store = DocumentStore::from_documents(
            vec![doc("first", false, 10), doc("second", true, 5)],
            MemoryStore::new(),
        );
        assert_eq!(ids(&store), ["second", "first"]);

        let toggled = store.toggle_pin("first").unwrap();
        assert!(toggled.is_pinned);
        assert!(toggled.last_modified > Utc.timestamp_opt(10, 0).unwrap());
        assert_eq!(ids(&store), ["first", "second"]);
        assert!(store.list().iter().all(|d| d.is_pinned));
    }

    #[test]
    fn test_update_stamps_and_moves_to_top_of_group() {
        let mut store = DocumentStore::from_documents(
            vec![doc("a", false, 30), doc("b", false, 20), doc("p", true, 1)],
            MemoryStore::new(),
        );
        let updated = store.update("b", DocumentPatch::content("<b>hi</b>")).unwrap();
        assert_eq!(updated.content, "<b>hi</b>");
        assert_eq!(ids(&store), ["p", "b", "a"]);
    }

    #[test]
    fn test_successive_stamps_strictly_increase() {
        let mut store = DocumentStore::from_documents(vec![doc("a", false, 1)], MemoryStore::new());
        let first = store.update("a", DocumentPatch::title("one")).unwrap();
        let second = store.update("a", DocumentPatch::title("two")).unwrap();
        assert!(second.last_modified > first.last_modified);
    }

    #[test]
    fn test_create_selects_new_document() {
        let mut store = DocumentStore::from_documents(vec![doc("a", true, 1)], MemoryStore::new());
        let created = store.create();
        assert_eq!(created.title, UNTITLED);
        assert!(created.content.is_empty());
        assert!(!created.is_pinned);
        assert_eq!(store.active_id(), Some(&created.id));
        // Pinned documents stay ahead of the new one.
        assert_eq!(ids(&store), ["a", created.id.as_str()]);
    }

    #[test]
    fn test_create_ids_are_unique() {
        let mut store = DocumentStore::from_documents(Vec::new(), MemoryStore::new());
        let a = store.create();
        let b = store.create();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_delete_active_reselects_remaining() {
        let mut store = DocumentStore::from_documents(
            vec![doc("a", false, 3), doc("b", false, 2), doc("c", false, 1)],
            MemoryStore::new(),
        );
        store.select("b").unwrap();
        store.delete("b").unwrap();

        let active = store.active_id().cloned().unwrap();
        assert!(active == "a" || active == "c");
        assert!(store.get(&active).is_some());
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let mut store = DocumentStore::from_documents(
            vec![doc("a", false, 3), doc("b", false, 2)],
            MemoryStore::new(),
        );
        store.select("a").unwrap();
        store.delete("b").unwrap();
        assert_eq!(store.active_id().map(|s| s.as_str()), Some("a"));
    }

    #[test]
    fn test_delete_last_clears_active() {
        let mut store = DocumentStore::from_documents(vec![doc("a", false, 3)], MemoryStore::new());
        store.delete("a").unwrap();
        assert!(store.active().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_id_is_error() {
        let mut store = DocumentStore::from_documents(vec![doc("a", false, 3)], MemoryStore::new());
        assert!(matches!(
            store.toggle_pin("nope"),
            Err(GlossaError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_persist_and_reload() {
        let mut store = DocumentStore::load(MemoryStore::new());
        let created = store.create();
        store
            .update(&created.id, DocumentPatch::content("<i>draft</i>"))
            .unwrap();

        let raw = store.backend().get(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"isPinned\":false"));
        assert!(raw.contains("\"lastModified\":\""));

        let reloaded = DocumentStore::load(MemoryStore::with_entry(STORAGE_KEY, raw));
        assert_eq!(reloaded.list(), store.list());
    }

    #[test]
    fn test_load_accepts_iso_timestamps() {
        let raw = r#"[{"id":"9","title":"t","content":"c","isPinned":true,"lastModified":"2024-03-01T12:30:00.000Z"}]"#;
        let store = DocumentStore::load(MemoryStore::with_entry(STORAGE_KEY, raw));
        let doc = store.get("9").unwrap();
        assert!(doc.is_pinned);
        assert_eq!(doc.last_modified, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_load_corrupt_falls_back_to_default() {
        let store = DocumentStore::load(MemoryStore::with_entry(STORAGE_KEY, "{not json"));
        assert_eq!(store.len(), 1);
        let doc = store.active().unwrap();
        assert_eq!(doc.id, "1");
        assert_eq!(doc.title, DEFAULT_TITLE);
        assert_eq!(doc.content, DEFAULT_CONTENT);
    }

    #[test]
    fn test_load_empty_backend_gives_default() {
        let store = DocumentStore::load(MemoryStore::new());
        assert_eq!(ids(&store), ["1"]);
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
    }

    #[test]
    fn test_storage_failures_do_not_interrupt_editing() {
        let mut store = DocumentStore::load(BrokenStore);
        assert_eq!(ids(&store), ["1"]);
        let created = store.create();
        store.update(&created.id, DocumentPatch::content("x")).unwrap();
        assert_eq!(store.len(), 2);
    }
}
