//! The editable surface the core drives.
//!
//! A surface owns the live markup and the live selection. The browser
//! implementation is a `contenteditable` element; [`MemorySurface`] keeps the
//! same state in a [`MarkupTree`] for native use and tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::format::FormatCommand;
use crate::markup::MarkupTree;
use crate::offset_map;
use crate::types::{CursorOffset, TreeRange};

/// Error type for platform operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl From<&str> for PlatformError {
    fn from(s: &str) -> Self {
        PlatformError(s.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(s: String) -> Self {
        PlatformError(s)
    }
}

/// Read and write access to an editable region.
pub trait EditorSurface {
    /// Raw markup of the region (`innerHTML`).
    fn markup(&self) -> String;

    /// Replace the region's markup. Any live selection is lost.
    fn set_markup(&mut self, markup: &str) -> Result<(), PlatformError>;

    /// Plain-text projection of the region (`innerText`).
    fn plain_text(&self) -> String;

    /// Offset of the live selection start, `None` if there is no selection
    /// inside the region.
    fn capture_cursor(&self) -> Option<CursorOffset>;

    /// Collapse the selection at `offset`. A region with no text is left alone.
    fn restore_cursor(&mut self, offset: CursorOffset) -> Result<(), PlatformError>;

    /// Apply a formatting command to the live selection.
    fn exec_command(&mut self, command: &FormatCommand) -> Result<(), PlatformError>;
}

impl<T: EditorSurface> EditorSurface for Rc<RefCell<T>> {
    fn markup(&self) -> String {
        self.borrow().markup()
    }

    fn set_markup(&mut self, markup: &str) -> Result<(), PlatformError> {
        self.borrow_mut().set_markup(markup)
    }

    fn plain_text(&self) -> String {
        self.borrow().plain_text()
    }

    fn capture_cursor(&self) -> Option<CursorOffset> {
        self.borrow().capture_cursor()
    }

    fn restore_cursor(&mut self, offset: CursorOffset) -> Result<(), PlatformError> {
        self.borrow_mut().restore_cursor(offset)
    }

    fn exec_command(&mut self, command: &FormatCommand) -> Result<(), PlatformError> {
        self.borrow_mut().exec_command(command)
    }
}

/// Surface backed by an in-memory tree.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    tree: MarkupTree,
    selection: Option<TreeRange>,
    executed: Vec<FormatCommand>,
    writes: usize,
}

impl MemorySurface {
    pub fn new(markup: &str) -> Self {
        Self {
            tree: MarkupTree::parse(markup),
            ..Default::default()
        }
    }

    pub fn tree(&self) -> &MarkupTree {
        &self.tree
    }

    pub fn selection(&self) -> Option<&TreeRange> {
        self.selection.as_ref()
    }

    pub fn select(&mut self, range: Option<TreeRange>) {
        self.selection = range;
    }

    /// Place a collapsed cursor at a text offset, as a click would.
    pub fn place_cursor(&mut self, offset: usize) {
        self.selection =
            offset_map::restore(&self.tree, CursorOffset::new(offset)).map(TreeRange::collapsed);
    }

    /// Commands applied so far, oldest first.
    pub fn executed(&self) -> &[FormatCommand] {
        &self.executed
    }

    /// Number of times the markup was replaced through [`EditorSurface::set_markup`].
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl EditorSurface for MemorySurface {
    fn markup(&self) -> String {
        self.tree.to_markup()
    }

    fn set_markup(&mut self, markup: &str) -> Result<(), PlatformError> {
        self.tree = MarkupTree::parse(markup);
        self.selection = None;
        self.writes += 1;
        Ok(())
    }

    fn plain_text(&self) -> String {
        self.tree.plain_text()
    }

    fn capture_cursor(&self) -> Option<CursorOffset> {
        offset_map::capture(&self.tree, self.selection.as_ref())
    }

    fn restore_cursor(&mut self, offset: CursorOffset) -> Result<(), PlatformError> {
        if let Some(point) = offset_map::restore(&self.tree, offset) {
            self.selection = Some(TreeRange::collapsed(point));
        }
        Ok(())
    }

    fn exec_command(&mut self, command: &FormatCommand) -> Result<(), PlatformError> {
        tracing::debug!(command = command.command_name(), value = ?command.value(), "exec command");
        self.executed.push(command.clone());
        Ok(())
    }
}
