//! Conversion between tree positions and plain-text character offsets.
//!
//! Capture happens against the tree before a rewrite, restore against the tree
//! after it. Tree paths are never carried across a rewrite, only the offset.

use crate::markup::{MarkupTree, Node};
use crate::types::{CursorOffset, TreePoint, TreeRange};

/// Text characters strictly before `point`, or `None` if the point does not
/// address anything in `tree`.
pub fn chars_before(tree: &MarkupTree, point: &TreePoint) -> Option<usize> {
    let mut nodes: &[Node] = &tree.children;
    let mut count = 0;

    for (depth, &idx) in point.path.iter().enumerate() {
        let node = nodes.get(idx)?;
        count += nodes[..idx].iter().map(Node::text_len).sum::<usize>();
        match node {
            Node::Element(el) => nodes = &el.children,
            Node::Text(text) if depth + 1 == point.path.len() => {
                return Some(count + point.offset.min(text.len_chars()));
            }
            // Text and raw markup have no children to descend into.
            _ => return None,
        }
    }

    // Point addresses a child boundary of an element or the root.
    let idx = point.offset.min(nodes.len());
    Some(count + nodes[..idx].iter().map(Node::text_len).sum::<usize>())
}

/// Character offset of the selection start, `None` when there is no selection
/// or it does not lie inside `tree`.
pub fn capture(tree: &MarkupTree, selection: Option<&TreeRange>) -> Option<CursorOffset> {
    let range = selection?;
    let offset = chars_before(tree, &range.start)?;
    tracing::trace!(
        target: "glossa::cursor",
        offset,
        collapsed = range.is_collapsed(),
        "captured cursor"
    );
    Some(CursorOffset::new(offset))
}

/// Find the text position for `offset`.
///
/// Walks text nodes in document order and stops at the first one whose end
/// reaches the offset. Offsets past the end land at the end of the last text
/// node. Returns `None` if the tree has no text nodes at all.
pub fn restore(tree: &MarkupTree, offset: CursorOffset) -> Option<TreePoint> {
    let target = offset.char_offset;
    let mut running = 0;
    let mut last = None;

    for (path, text) in tree.text_nodes() {
        let len = text.len_chars();
        if running + len >= target {
            return Some(TreePoint::new(path, target - running));
        }
        running += len;
        last = Some((path, len));
    }

    let (path, len) = last?;
    tracing::debug!(
        target: "glossa::cursor",
        requested = target,
        total = running,
        "offset past end of content, collapsing to end"
    );
    Some(TreePoint::new(path, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(s: &str) -> MarkupTree {
        MarkupTree::parse(s)
    }

    fn at(path: &[usize], offset: usize) -> TreeRange {
        TreeRange::collapsed(TreePoint::new(path.to_vec(), offset))
    }

    #[test]
    fn test_capture_without_selection() {
        assert_eq!(capture(&tree("hello"), None), None);
    }

    #[test]
    fn test_capture_outside_tree() {
        let t = tree("<p>hello</p>");
        assert_eq!(capture(&t, Some(&at(&[3], 0))), None);
        assert_eq!(capture(&t, Some(&at(&[0, 0, 0], 0))), None);
    }

    #[test]
    fn test_capture_counts_text_only() {
        let t = tree("<p>Hello <b>bold</b> world</p>");
        // Inside "world", after "wo".
        assert_eq!(capture(&t, Some(&at(&[0, 2], 3))), Some(CursorOffset::new(13)));
        // Inside the bold text.
        assert_eq!(capture(&t, Some(&at(&[0, 1, 0], 2))), Some(CursorOffset::new(8)));
    }

    #[test]
    fn test_capture_element_boundary() {
        let t = tree("<p>ab<b>cd</b>ef</p>");
        // Between <b> and "ef" as a child index of <p>.
        assert_eq!(capture(&t, Some(&at(&[0], 2))), Some(CursorOffset::new(4)));
        // Root boundary after everything.
        assert_eq!(capture(&t, Some(&at(&[], 1))), Some(CursorOffset::new(6)));
    }

    #[test]
    fn test_capture_uses_selection_start() {
        let t = tree("abcdef");
        let range = TreeRange::new(TreePoint::new(vec![0], 1), TreePoint::new(vec![0], 4));
        assert!(!range.is_collapsed());
        assert_eq!(capture(&t, Some(&range)), Some(CursorOffset::new(1)));
    }

    #[test]
    fn test_capture_counts_decoded_chars() {
        let t = tree("a&amp;b<i>c</i>");
        assert_eq!(capture(&t, Some(&at(&[1, 0], 1))), Some(CursorOffset::new(4)));
    }

    #[test]
    fn test_restore_inside_text() {
        let t = tree("<p>Hello <b>bold</b> world</p>");
        assert_eq!(
            restore(&t, CursorOffset::new(8)),
            Some(TreePoint::new(vec![0, 1, 0], 2))
        );
    }

    #[test]
    fn test_restore_at_node_boundary_prefers_earlier_node() {
        let t = tree("ab<b>cd</b>");
        assert_eq!(restore(&t, CursorOffset::new(2)), Some(TreePoint::new(vec![0], 2)));
        assert_eq!(restore(&t, CursorOffset::new(0)), Some(TreePoint::new(vec![0], 0)));
    }

    #[test]
    fn test_restore_past_end_collapses_to_end() {
        let t = tree("ab<b>cd</b>");
        assert_eq!(
            restore(&t, CursorOffset::new(100)),
            Some(TreePoint::new(vec![1, 0], 2))
        );
    }

    #[test]
    fn test_restore_without_text_nodes() {
        assert_eq!(restore(&tree(""), CursorOffset::new(0)), None);
        assert_eq!(restore(&tree("<br><img src=x>"), CursorOffset::new(3)), None);
    }

    #[test]
    fn test_round_trip_on_unmodified_tree() {
        let t = tree("<div>one <b>two</b><!-- c --> three&nbsp;<i>four</i></div>");
        let total = t.text_len();
        for offset in 0..=total {
            let point = restore(&t, CursorOffset::new(offset)).unwrap();
            let range = TreeRange::collapsed(point);
            assert_eq!(capture(&t, Some(&range)), Some(CursorOffset::new(offset)));
        }
    }

    #[test]
    fn test_offset_survives_rewrap() {
        let before = tree("Neural networks are powerful.");
        let offset = capture(&before, Some(&at(&[0], 20))).unwrap();
        let after = tree(
            r#"<span class="term-highlight" data-term="Neural networks" data-definition="x">Neural networks</span> are powerful."#,
        );
        let point = restore(&after, offset).unwrap();
        assert_eq!(point, TreePoint::new(vec![1], 5));
        assert_eq!(chars_before(&after, &point), Some(20));
    }
}
