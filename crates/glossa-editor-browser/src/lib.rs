//! Browser DOM layer for the glossa editor.
//!
//! Assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `surface`: `contenteditable` element as an [`EditorSurface`], cursor via the Selection API
//! - `storage`: `localStorage` backend for the document list
//! - `app`: the JS-facing [`GlossaEditor`] that wires store, surface and analysis together
//!
//! # Re-exports
//!
//! This crate re-exports `glossa-editor-core` for convenience, so consumers
//! only need to depend on `glossa-editor-browser`.

pub use glossa_editor_core;
pub use glossa_editor_core::*;

pub mod app;
pub mod storage;
pub mod surface;

pub use app::GlossaEditor;
pub use storage::LocalStorageStore;
pub use surface::DomSurface;

use wasm_bindgen::prelude::*;

/// Install the panic hook and console logging.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();

    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );
    let filter = EnvFilter::new("debug,reqwest=info,hyper=info");
    let reg = Registry::default().with(filter).with(wasm_layer);

    let _ = set_global_default(reg);
}
