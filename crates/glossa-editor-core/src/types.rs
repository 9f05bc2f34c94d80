//! Core editor types: cursor offsets and positions inside a markup tree.
//!
//! A cursor survives a markup rewrite as a single number, the count of text
//! characters before it. Everything tree-shaped is only valid for the tree it
//! was computed against.

/// Cursor position as a count of text characters from the start of the region.
///
/// Characters are counted in the plain-text projection, so tags and
/// attribute values contribute nothing.
#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct CursorOffset {
    /// Character offset in text (NOT byte offset!)
    pub char_offset: usize,
}

impl CursorOffset {
    pub fn new(char_offset: usize) -> Self {
        Self { char_offset }
    }
}

impl From<usize> for CursorOffset {
    fn from(char_offset: usize) -> Self {
        Self { char_offset }
    }
}

/// A concrete boundary point in a markup tree, like a DOM `(node, offset)` pair.
///
/// `path` is the chain of child indexes from the root. When it names a text
/// node, `offset` counts chars into that node's text. Otherwise `offset` is a
/// child index of the addressed element (or of the root when `path` is empty).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TreePoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl TreePoint {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Point before the first child of the root.
    pub fn start() -> Self {
        Self::default()
    }
}

/// Live selection in a tree. Collapsed when start == end.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TreeRange {
    pub start: TreePoint,
    pub end: TreePoint,
}

impl TreeRange {
    pub fn new(start: TreePoint, end: TreePoint) -> Self {
        Self { start, end }
    }

    pub fn collapsed(point: TreePoint) -> Self {
        Self {
            start: point.clone(),
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}
