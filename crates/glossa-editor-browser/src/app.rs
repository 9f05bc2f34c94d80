//! JS entry point: one editor element bound to the stored notes.
//!
//! ```js
//! const editor = new GlossaEditor("editor", apiKey, null);
//! editor.createDocument();
//! editor.applyFormat("bold");
//! JSON.parse(editor.documents());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::EventListener;
use glossa_common::{ChatAnalyzer, Config, DocumentStore, KeyValueStore, MemoryStore};
use glossa_editor_core::{AnalysisDriver, EditorSession, EditorSurface, annotation_at};
use n0_future::time::Duration;
use wasm_bindgen::prelude::*;

use crate::storage::LocalStorageStore;
use crate::surface::DomSurface;

type SharedSurface = Rc<RefCell<DomSurface>>;
type Session = EditorSession<Box<dyn KeyValueStore>, SharedSurface>;

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

#[wasm_bindgen]
pub struct GlossaEditor {
    session: Rc<RefCell<Session>>,
    surface: SharedSurface,
    _input: EventListener,
}

#[wasm_bindgen]
impl GlossaEditor {
    /// Bind the element with id `element_id`.
    ///
    /// `config_json` is an optional JSON `Config`; missing fields take defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        element_id: &str,
        api_key: String,
        config_json: Option<String>,
    ) -> Result<GlossaEditor, JsError> {
        let config: Config = match config_json.as_deref() {
            Some(json) => serde_json::from_str(json).map_err(js_err)?,
            None => Config::default(),
        };
        if api_key.trim().is_empty() {
            tracing::warn!(target: "glossa::analyzer", "no api key given, analysis will fail");
        }

        let surface = Rc::new(RefCell::new(DomSurface::from_id(element_id).map_err(js_err)?));
        let element = surface.borrow().element().clone();

        let backend: Box<dyn KeyValueStore> = match LocalStorageStore::new() {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!(
                    target: "glossa::store",
                    error = %e,
                    "localStorage unavailable, notes will not persist"
                );
                Box::new(MemoryStore::new())
            }
        };
        let store = DocumentStore::load(backend);

        let analyzer = ChatAnalyzer::new(config.analyzer.clone(), api_key);
        let debounce = Duration::from_millis(config.editor.debounce_ms);
        let (driver, handle) = AnalysisDriver::new(analyzer, surface.clone(), debounce);
        wasm_bindgen_futures::spawn_local(async move {
            driver.run().await;
        });

        let session = EditorSession::new(store, surface.clone(), handle).map_err(js_err)?;
        let session = Rc::new(RefCell::new(session));

        let input_session = session.clone();
        let input = EventListener::new(&element, "input", move |_event| {
            // execCommand fires input synchronously while the session is
            // already borrowed; that path calls on_input itself.
            let Ok(mut session) = input_session.try_borrow_mut() else {
                return;
            };
            if let Err(e) = session.on_input() {
                tracing::warn!(error = %e, "failed to record edit");
            }
        });

        Ok(GlossaEditor {
            session,
            surface,
            _input: input,
        })
    }

    /// The document list in display order, as JSON.
    pub fn documents(&self) -> Result<String, JsError> {
        serde_json::to_string(self.session.borrow().store().list()).map_err(js_err)
    }

    #[wasm_bindgen(js_name = activeId)]
    pub fn active_id(&self) -> Option<String> {
        self.session
            .borrow()
            .store()
            .active_id()
            .map(|id| id.to_string())
    }

    pub fn open(&self, id: &str) -> Result<(), JsError> {
        self.session.borrow_mut().open(id).map_err(js_err)
    }

    /// Create and open a new document, returning its id.
    #[wasm_bindgen(js_name = createDocument)]
    pub fn create_document(&self) -> Result<String, JsError> {
        let doc = self.session.borrow_mut().create_document().map_err(js_err)?;
        Ok(doc.id.to_string())
    }

    #[wasm_bindgen(js_name = deleteDocument)]
    pub fn delete_document(&self, id: &str) -> Result<(), JsError> {
        self.session
            .borrow_mut()
            .delete_document(id)
            .map(|_| ())
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = togglePin)]
    pub fn toggle_pin(&self, id: &str) -> Result<(), JsError> {
        self.session
            .borrow_mut()
            .toggle_pin(id)
            .map(|_| ())
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = setTitle)]
    pub fn set_title(&self, title: &str) -> Result<(), JsError> {
        self.session
            .borrow_mut()
            .set_title(title)
            .map(|_| ())
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = applyFormat)]
    pub fn apply_format(&self, command: &str, value: Option<String>) -> Result<(), JsError> {
        self.session
            .borrow_mut()
            .apply_format(command, value.as_deref())
            .map_err(js_err)
    }

    /// Definition of the annotated term under the cursor, if any.
    #[wasm_bindgen(js_name = definitionAtCursor)]
    pub fn definition_at_cursor(&self) -> Option<String> {
        let surface = self.surface.borrow();
        let cursor = surface.capture_cursor()?;
        annotation_at(&surface.markup(), cursor.char_offset).map(|a| a.definition)
    }
}
