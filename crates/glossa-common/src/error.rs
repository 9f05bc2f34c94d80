//! Error types for glossa.
//!
//! Each concern has its own small `thiserror` enum; [`GlossaError`] gathers
//! them for the places (mostly the CLI) that report errors to a person.

use miette::{Diagnostic, NamedSource, SourceOffset, SourceSpan};
use std::borrow::Cow;

/// Main error type for glossa operations
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum GlossaError {
    /// Key-value storage failure
    #[error(transparent)]
    #[diagnostic_source]
    Storage(#[from] StorageError),

    /// External term analyzer failure
    #[error(transparent)]
    #[diagnostic_source]
    Analyzer(#[from] AnalyzerError),

    /// Configuration could not be loaded or saved
    #[error("configuration error: {0}")]
    #[diagnostic(code(glossa::config))]
    Config(String),

    /// No document with the given id
    #[error("no document with id {0}")]
    #[diagnostic(code(glossa::store::not_found))]
    DocumentNotFound(smol_str::SmolStr),

    /// IO error
    #[error(transparent)]
    Io(#[from] n0_future::io::Error),

    /// Parse error with source location
    #[error(transparent)]
    #[diagnostic_source]
    Parse(#[from] ParseError),

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic_source]
    Serde(#[from] SerDeError),
}

/// Errors from a [`KeyValueStore`](crate::storage::KeyValueStore) backend.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage io error: {0}")]
    #[diagnostic(code(glossa::storage::io))]
    Io(#[from] std::io::Error),

    /// Backend refused the operation (quota exceeded, storage disabled, ...).
    #[error("storage unavailable: {0}")]
    #[diagnostic(code(glossa::storage::unavailable))]
    Unavailable(String),

    #[error(transparent)]
    #[diagnostic_source]
    Serde(#[from] SerDeError),
}

/// Errors from the external term analyzer.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum AnalyzerError {
    #[error("analyzer api key not set (expected in ${0})")]
    #[diagnostic(
        code(glossa::analyzer::api_key),
        help("export the variable or change `analyzer.api_key_env` in the config")
    )]
    MissingApiKey(String),

    #[error("analyzer request failed: {0}")]
    #[diagnostic(code(glossa::analyzer::http))]
    Http(#[from] reqwest::Error),

    #[error("analyzer returned status {status}")]
    #[diagnostic(code(glossa::analyzer::status))]
    Status { status: u16, body: String },

    #[error("analyzer timed out")]
    #[diagnostic(code(glossa::analyzer::timeout))]
    Timeout,

    /// Anything else an [`Analyzer`](crate::analyzer::Analyzer) implementation wants to report.
    #[error("analyzer error: {0}")]
    Other(String),
}

/// Parse error with source code location information
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("parse error: {}",self.kind)]
#[diagnostic(code(glossa::parse))]
pub struct ParseError {
    #[diagnostic_source]
    kind: ParseErrorKind,
    #[source_code]
    src: NamedSource<Cow<'static, str>>,
    #[label("error")]
    err_location: SourceSpan,
    err_line_col: Option<(usize, usize)>,
    #[help]
    advice: Option<String>,
}

impl ParseError {
    /// Attach the text that failed to parse, relocating the error span into it.
    pub fn with_source(self, src: NamedSource<Cow<'static, str>>) -> Self {
        if let Some((line, column)) = self.err_line_col {
            let location = SourceSpan::new(
                SourceOffset::from_location(src.inner(), line, column),
                self.err_location.len(),
            );
            Self {
                kind: self.kind,
                src,
                err_location: location,
                err_line_col: Some((line, column)),
                advice: self.advice,
            }
        } else {
            let (line, col) = offset_to_line_col(self.err_location.offset(), &src);
            let len = self.err_location.len();
            let location =
                SourceSpan::new(SourceOffset::from_location(src.inner(), line, col), len);
            Self {
                kind: self.kind,
                src,
                err_location: location,
                err_line_col: self.err_line_col,
                advice: self.advice,
            }
        }
    }

    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = Some(advice.into());
        self
    }

    /// Parse JSON from `text`, naming the source `name` in any diagnostic.
    pub fn parse_json<T: serde::de::DeserializeOwned>(
        name: &'static str,
        text: &str,
    ) -> Result<T, ParseError> {
        serde_json::from_str(text).map_err(|e| {
            ParseError::from(e)
                .with_source(NamedSource::new(name, Cow::Owned(text.to_owned())))
        })
    }
}

#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ParseErrorKind {
    #[error(transparent)]
    SerdeError(#[from] SerDeError),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Serialization/deserialization errors
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum SerDeError {
    #[error(transparent)]
    #[diagnostic_source]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        let line = err.line();
        let column = err.column();
        let location = SourceSpan::new(SourceOffset::from_location("", line, column), 0);
        Self {
            kind: ParseErrorKind::SerdeError(SerDeError::Json(err)),
            src: NamedSource::new("json", Cow::Borrowed("")),
            err_location: location,
            advice: None,
            err_line_col: Some((line, column)),
        }
    }
}

impl From<toml::de::Error> for ParseError {
    fn from(err: toml::de::Error) -> Self {
        let span = err.span().unwrap_or(0..0);
        Self {
            kind: ParseErrorKind::Toml(err),
            src: NamedSource::new("toml", Cow::Borrowed("")),
            err_location: SourceSpan::new(span.start.into(), span.len()),
            advice: None,
            err_line_col: None,
        }
    }
}

fn offset_to_line_col(offset: usize, src: &NamedSource<Cow<'static, str>>) -> (usize, usize) {
    let mut acc_bytes = 0usize;

    for (i, line) in src.inner().split_inclusive('\n').enumerate() {
        let line_start = acc_bytes;
        acc_bytes += line.len();
        if offset < acc_bytes {
            let line_offset = offset - line_start;
            let col = line
                .char_indices()
                .take_while(|(byte_idx, _)| *byte_idx < line_offset)
                .count();
            return (i + 1, col + 1);
        }
    }
    (src.inner().lines().count().max(1), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_reports_location() {
        let err = ParseError::parse_json::<Vec<u32>>("notes", "[1, 2,").unwrap_err();
        assert!(err.err_line_col.is_some());
        assert_eq!(err.src.name(), "notes");
    }

    #[test]
    fn test_offset_to_line_col() {
        let src = NamedSource::new("t", Cow::Borrowed("ab\ncd\n"));
        assert_eq!(offset_to_line_col(0, &src), (1, 1));
        assert_eq!(offset_to_line_col(4, &src), (2, 2));
    }
}
