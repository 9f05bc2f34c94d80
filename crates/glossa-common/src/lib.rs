//! Shared pieces of glossa: errors, configuration, the term analyzer
//! collaborator and the persisted document list.

pub mod analyzer;
pub mod config;
pub mod documents;
pub mod error;
pub mod storage;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::analyzer::{Analyzer, ChatAnalyzer, RecognizedTerm, parse_terms};
pub use crate::config::Config;
pub use crate::documents::{Document, DocumentId, DocumentPatch, DocumentStore};
pub use crate::error::{AnalyzerError, GlossaError, ParseError, SerDeError, StorageError};
pub use crate::storage::{FileStore, KeyValueStore, MemoryStore};
