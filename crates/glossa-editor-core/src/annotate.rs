//! Wraps recognized terms in annotation spans.
//!
//! Matching only ever runs over genuine text nodes. Tag markup, attribute
//! values, comments and the text inside an existing annotation are never
//! candidates, which is what makes a second pass with the same terms a no-op.

use std::fmt;
use std::ops::Range;

use glossa_common::RecognizedTerm;
use markdown_weaver_escape::{FmtWriter, StrWrite, escape_html, escape_html_body_text};
use regex::Regex;

use crate::markup::{Element, MarkupTree, Node, Text, decode_entities};

/// Marker class on every annotation span.
pub const ANNOTATION_CLASS: &str = "term-highlight";

/// Elements whose text is not prose.
const OPAQUE_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Apply `terms` to `markup` in order, returning the annotated markup.
///
/// When nothing matches the input is returned unchanged, byte for byte, so
/// callers can compare against the input to decide whether to write back.
pub fn rewrite(markup: &str, terms: &[RecognizedTerm]) -> String {
    let mut tree = MarkupTree::parse(markup);
    let mut changed = false;

    for term in terms {
        let Some(matcher) = TermMatcher::new(term) else {
            continue;
        };
        let wrapped = matcher.wrap_in(&mut tree.children);
        if wrapped > 0 {
            tracing::trace!(term = %term.term, wrapped, "annotated term");
            changed = true;
        }
    }

    if changed {
        tree.to_markup()
    } else {
        markup.to_owned()
    }
}

struct TermMatcher<'a> {
    regex: Regex,
    term: &'a RecognizedTerm,
    open_tag: String,
}

impl<'a> TermMatcher<'a> {
    fn new(term: &'a RecognizedTerm) -> Option<Self> {
        let literal = term.term.trim();
        if literal.is_empty() {
            return None;
        }
        let pattern = format!(r"(?i)\b({})\b", regex::escape(literal));
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!(term = %term.term, error = %e, "could not build term pattern");
                return None;
            }
        };
        let open_tag = match open_tag(term) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::warn!(term = %term.term, error = %e, "could not write annotation tag");
                return None;
            }
        };
        Some(Self {
            regex,
            term,
            open_tag,
        })
    }

    /// Wrap every plain-text occurrence under `nodes`. Returns how many were wrapped.
    fn wrap_in(&self, nodes: &mut Vec<Node>) -> usize {
        let mut wrapped = 0;
        let mut i = 0;
        while i < nodes.len() {
            match &mut nodes[i] {
                Node::Element(el) if is_annotation(el) || is_opaque(el) => {}
                Node::Element(el) => wrapped += self.wrap_in(&mut el.children),
                Node::Text(text) => {
                    if let Some(pieces) = self.split(text) {
                        wrapped += pieces.iter().filter(|n| n.as_element().is_some()).count();
                        let count = pieces.len();
                        nodes.splice(i..i + 1, pieces);
                        i += count;
                        continue;
                    }
                }
                Node::Markup(_) => {}
            }
            i += 1;
        }
        wrapped
    }

    /// Split a text node around its matches, `None` if there are none.
    fn split(&self, text: &Text) -> Option<Vec<Node>> {
        let ranges: Vec<Range<usize>> = self
            .regex
            .find_iter(text.text())
            .map(|m| m.range())
            .collect();
        if ranges.is_empty() {
            return None;
        }

        let map = text.boundary_map();
        let raw = text.raw();
        let mut pieces = Vec::with_capacity(ranges.len() * 2 + 1);
        let mut cursor = 0;
        for range in ranges {
            let start = raw_offset(&map, range.start);
            let end = raw_offset(&map, range.end);
            if start > cursor {
                pieces.push(Node::Text(text_piece(&raw[cursor..start])?));
            }
            pieces.push(Node::Element(self.span(&raw[start..end])?));
            cursor = end;
        }
        if cursor < raw.len() {
            pieces.push(Node::Text(text_piece(&raw[cursor..])?));
        }
        Some(pieces)
    }

    fn span(&self, raw: &str) -> Option<Element> {
        Some(Element::new(
            "span",
            self.open_tag.clone(),
            Some("</span>".to_owned()),
            vec![Node::Text(text_piece(raw)?)],
        ))
    }
}

fn open_tag(term: &RecognizedTerm) -> Result<String, fmt::Error> {
    let mut tag = String::new();
    let mut w = FmtWriter(&mut tag);
    w.write_str(r#"<span class=""#)?;
    w.write_str(ANNOTATION_CLASS)?;
    w.write_str(r#"" data-term=""#)?;
    escape_html(&mut w, &term.term)?;
    w.write_str(r#"" data-definition=""#)?;
    escape_html(&mut w, &term.definition)?;
    w.write_str(r#"">"#)?;
    Ok(tag)
}

/// A slice of a split text node as a standalone text node.
///
/// A bare `<` or `>` was harmless while the run was one node but could pair
/// up with the tags now placed beside it, so such runs are re-encoded.
fn text_piece(raw: &str) -> Option<Text> {
    if !raw.contains(['<', '>']) {
        return Some(Text::from_raw(raw));
    }
    let mut encoded = String::with_capacity(raw.len() + 8);
    escape_html_body_text(FmtWriter(&mut encoded), &decode_entities(raw)).ok()?;
    Some(Text::from_raw(encoded))
}

impl std::fmt::Debug for TermMatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermMatcher")
            .field("term", &self.term.term)
            .field("pattern", &self.regex.as_str())
            .finish()
    }
}

/// Map a decoded byte offset at a char boundary to its raw source offset.
fn raw_offset(map: &[(usize, usize)], decoded: usize) -> usize {
    match map.binary_search_by_key(&decoded, |&(d, _)| d) {
        Ok(idx) => map[idx].1,
        // Regex matches always end on char boundaries; clamp just in case.
        Err(idx) => map.get(idx).map(|&(_, r)| r).unwrap_or_else(|| {
            map.last().map(|&(_, r)| r).unwrap_or_default()
        }),
    }
}

fn is_annotation(el: &Element) -> bool {
    el.has_class(ANNOTATION_CLASS)
}

fn is_opaque(el: &Element) -> bool {
    OPAQUE_ELEMENTS.contains(&el.name())
}

/// An annotation found in existing markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub term: String,
    pub definition: String,
    /// The annotated text as displayed.
    pub text: String,
    /// Char range of the annotated text in the plain-text projection.
    pub range: Range<usize>,
}

/// All annotations in `markup`, in document order.
pub fn annotations(markup: &str) -> Vec<Annotation> {
    let tree = MarkupTree::parse(markup);
    let mut out = Vec::new();
    let mut offset = 0;
    collect_annotations(&tree.children, &mut offset, &mut out);
    out
}

fn collect_annotations(nodes: &[Node], offset: &mut usize, out: &mut Vec<Annotation>) {
    for node in nodes {
        match node {
            Node::Element(el) if is_annotation(el) => {
                let len = el.text_len();
                out.push(Annotation {
                    term: el.attr("data-term").unwrap_or_default(),
                    definition: el.attr("data-definition").unwrap_or_default(),
                    text: el.inner_text(),
                    range: *offset..*offset + len,
                });
                *offset += len;
            }
            Node::Element(el) => collect_annotations(&el.children, offset, out),
            other => *offset += other.text_len(),
        }
    }
}

/// The annotation covering the character at `char_offset`, if any.
pub fn annotation_at(markup: &str, char_offset: usize) -> Option<Annotation> {
    annotations(markup)
        .into_iter()
        .find(|a| a.range.contains(&char_offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(t: &str, d: &str) -> RecognizedTerm {
        RecognizedTerm::new(t, d)
    }

    #[test]
    fn test_wraps_single_term() {
        let out = rewrite(
            "Neural networks are powerful.",
            &[term("Neural networks", "A computing model")],
        );
        insta::assert_snapshot!(out, @r#"<span class="term-highlight" data-term="Neural networks" data-definition="A computing model">Neural networks</span> are powerful."#);
    }

    #[test]
    fn test_second_pass_is_identity() {
        let terms = [term("Neural networks", "A computing model")];
        let once = rewrite("Neural networks are powerful.", &terms);
        let twice = rewrite(&once, &terms);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_idempotent_with_several_terms() {
        let terms = [
            term("rust", "A systems language"),
            term("borrow checker", "Enforces ownership"),
            term("ownership", "Who frees what"),
        ];
        let markup = "<p>Rust has a <b>borrow checker</b>.</p><p>rust ownership rules, RUST.</p>";
        let once = rewrite(markup, &terms);
        assert_ne!(once, markup);
        assert_eq!(rewrite(&once, &terms), once);
        assert_eq!(annotations(&once).len(), 5);
    }

    #[test]
    fn test_no_match_returns_input() {
        let markup = "<p>Nothing  to&nbsp;see</p><!-- here -->";
        assert_eq!(rewrite(markup, &[term("absent", "x")]), markup);
        assert_eq!(rewrite(markup, &[]), markup);
    }

    #[test]
    fn test_preserves_case_of_match() {
        let out = rewrite("NEURAL Networks!", &[term("neural networks", "def")]);
        assert_eq!(
            out,
            r#"<span class="term-highlight" data-term="neural networks" data-definition="def">NEURAL Networks</span>!"#
        );
    }

    #[test]
    fn test_respects_word_boundaries() {
        let markup = "cats concatenate scattered";
        assert_eq!(rewrite(markup, &[term("cat", "animal")]), markup);
    }

    #[test]
    fn test_attribute_occurrence_left_alone() {
        let markup = r#"<a title="graph theory" href="/graph">link</a>"#;
        assert_eq!(rewrite(markup, &[term("graph", "nodes and edges")]), markup);
    }

    #[test]
    fn test_tag_name_left_alone() {
        let markup = "<b>bold</b> text";
        let out = rewrite(markup, &[term("b", "letter")]);
        assert_eq!(out, markup);
    }

    #[test]
    fn test_later_substring_term_does_not_nest() {
        let terms = [
            term("machine learning", "Learning from data"),
            term("learning", "Acquiring knowledge"),
        ];
        let out = rewrite("machine learning and learning", &terms);
        let found = annotations(&out);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].term, "machine learning");
        assert_eq!(found[0].range, 0..16);
        assert_eq!(found[1].term, "learning");
        assert_eq!(found[1].range, 21..29);
        assert!(!out.contains("term-highlight\" data-term=\"machine learning\" data-definition=\"Learning from data\"><span"));
    }

    #[test]
    fn test_matches_inside_formatting() {
        let out = rewrite("<p>An <i>algorithm</i> runs</p>", &[term("algorithm", "steps")]);
        assert_eq!(
            out,
            r#"<p>An <i><span class="term-highlight" data-term="algorithm" data-definition="steps">algorithm</span></i> runs</p>"#
        );
    }

    #[test]
    fn test_escapes_attribute_values() {
        let out = rewrite("quote here", &[term("quote", r#"Say "hi" & <wave>"#)]);
        assert!(out.contains(r#"data-definition="Say &quot;hi&quot; &amp; &lt;wave&gt;""#));
        let found = annotations(&out);
        assert_eq!(found[0].definition, r#"Say "hi" & <wave>"#);
    }

    #[test]
    fn test_escapes_pattern_characters() {
        let out = rewrite("Use a.b.c or axbxc", &[term("a.b.c", "dotted")]);
        let found = annotations(&out);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "a.b.c");
    }

    #[test]
    fn test_entities_inside_match_are_kept() {
        let out = rewrite("AT&amp;T rocks", &[term("AT&T", "telecom")]);
        assert_eq!(
            out,
            r#"<span class="term-highlight" data-term="AT&amp;T" data-definition="telecom">AT&amp;T</span> rocks"#
        );
    }

    #[test]
    fn test_skips_blank_terms_and_scripts() {
        let markup = "<script>var x = 1;</script> x";
        let out = rewrite(markup, &[term("   ", "blank"), term("x", "letter")]);
        assert_eq!(
            out,
            r#"<script>var x = 1;</script> <span class="term-highlight" data-term="x" data-definition="letter">x</span>"#
        );
    }

    #[test]
    fn test_text_projection_unchanged() {
        let markup = "<p>Graphs &amp; trees: a graph is not a tree.</p>";
        let out = rewrite(markup, &[term("graph", "g"), term("tree", "t")]);
        assert_eq!(
            MarkupTree::parse(&out).plain_text(),
            MarkupTree::parse(markup).plain_text()
        );
    }

    #[test]
    fn test_stray_angle_bracket_stays_text() {
        let markup = "if x <y then b";
        let out = rewrite(markup, &[term("then", "otherwise")]);
        assert_eq!(
            out,
            r#"if x &lt;y <span class="term-highlight" data-term="then" data-definition="otherwise">then</span> b"#
        );
        assert_eq!(MarkupTree::parse(&out).plain_text(), markup);

        let found = annotations(&out);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "then");
        assert_eq!(found[0].range, 8..12);
        assert_eq!(rewrite(&out, &[term("then", "otherwise")]), out);
    }

    #[test]
    fn test_angle_bracket_inside_match() {
        let markup = "<p>when a < b holds and a > b fails</p>";
        let out = rewrite(markup, &[term("holds", "is true"), term("fails", "is false")]);
        assert_eq!(
            MarkupTree::parse(&out).plain_text(),
            MarkupTree::parse(markup).plain_text()
        );
        let found = annotations(&out);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "holds");
        assert_eq!(found[1].text, "fails");
    }

    #[test]
    fn test_annotation_at() {
        let out = rewrite("The kernel schedules", &[term("kernel", "core of an OS")]);
        assert_eq!(annotation_at(&out, 3), None);
        assert_eq!(annotation_at(&out, 4).unwrap().definition, "core of an OS");
        assert_eq!(annotation_at(&out, 9).unwrap().text, "kernel");
        assert_eq!(annotation_at(&out, 10), None);
    }
}
