//! glossa-editor-core: editor logic without framework dependencies.
//!
//! This crate provides:
//! - `MarkupTree` - lossless parse of an editable region's markup
//! - `offset_map` - cursor capture and restore across markup rewrites
//! - `annotate::rewrite` - wraps recognized terms in annotation spans
//! - `AnalysisScheduler` / `AnalysisDriver` - debounced, serialized analysis passes
//! - `EditorSurface` - the seam to a real editable region, plus `MemorySurface`
//! - `EditorSession` - the edit path from surface to document store

pub mod annotate;
pub mod format;
pub mod markup;
pub mod offset_map;
pub mod scheduler;
pub mod session;
pub mod surface;
pub mod types;

pub use annotate::{ANNOTATION_CLASS, Annotation, annotation_at, annotations, rewrite};
pub use format::{FONT_FAMILIES, FONT_SIZES, FormatCommand, FormatError};
pub use markup::MarkupTree;
pub use scheduler::{
    AnalysisDriver, AnalysisHandle, AnalysisPhase, AnalysisRequest, AnalysisScheduler,
    DEFAULT_DEBOUNCE, apply_pass,
};
pub use session::{EditorSession, SessionError};
pub use smol_str::SmolStr;
pub use surface::{EditorSurface, MemorySurface, PlatformError};
pub use types::{CursorOffset, TreePoint, TreeRange};
