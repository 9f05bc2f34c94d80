//! Minimal lossless markup tree.
//!
//! This is not an HTML parser. It knows just enough structure to find the
//! genuine text nodes of an editable region and to address positions inside
//! them. Parsing never fails and `MarkupTree::parse(s).to_markup() == s` for
//! every input: each node keeps the exact source text it came from, so a tree
//! that was not modified serializes back byte-for-byte.
//!
//! Text nodes keep both their raw source (with character references) and the
//! decoded text a browser's text node would hold. Offsets into text are
//! counted in chars of the decoded text.

use smol_str::SmolStr;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A parsed markup fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupTree {
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
    /// Comments, doctypes, stray closing tags: kept verbatim, never text.
    Markup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: SmolStr,
    open_tag: String,
    close_tag: Option<String>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    raw: String,
    text: String,
}

impl MarkupTree {
    pub fn parse(markup: &str) -> Self {
        let mut builder = TreeBuilder::default();
        let mut pos = 0;
        let mut text_start = 0;

        while let Some(rel) = markup[pos..].find('<') {
            let lt = pos + rel;
            match scan_construct(markup, lt) {
                Some((end, token)) => {
                    builder.text(&markup[text_start..lt]);
                    builder.token(token, &markup[lt..end]);
                    pos = end;
                    text_start = end;
                }
                // A lone `<` is just text.
                None => pos = lt + 1,
            }
        }
        builder.text(&markup[text_start..]);
        builder.finish()
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.children, &mut out);
        out
    }

    /// The plain-text projection: decoded character data in document order.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (_, text) in self.text_nodes() {
            out.push_str(text.text());
        }
        out
    }

    /// Total length of the plain-text projection in chars.
    pub fn text_len(&self) -> usize {
        self.children.iter().map(Node::text_len).sum()
    }

    /// Every text node with its child-index path, in document order.
    pub fn text_nodes(&self) -> Vec<(Vec<usize>, &Text)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_text_nodes(&self.children, &mut path, &mut out);
        out
    }

    /// Look up the node at a child-index path.
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.children.get(first)?;
        for &idx in rest {
            node = match node {
                Node::Element(el) => el.children.get(idx)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

fn collect_text_nodes<'a>(
    nodes: &'a [Node],
    path: &mut Vec<usize>,
    out: &mut Vec<(Vec<usize>, &'a Text)>,
) {
    for (idx, node) in nodes.iter().enumerate() {
        path.push(idx);
        match node {
            Node::Text(text) => out.push((path.clone(), text)),
            Node::Element(el) => collect_text_nodes(&el.children, path, out),
            Node::Markup(_) => {}
        }
        path.pop();
    }
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(el) => {
                out.push_str(&el.open_tag);
                write_nodes(&el.children, out);
                if let Some(close) = &el.close_tag {
                    out.push_str(close);
                }
            }
            Node::Text(text) => out.push_str(&text.raw),
            Node::Markup(raw) => out.push_str(raw),
        }
    }
}

impl Node {
    /// Length of the text this node contributes, in chars.
    pub fn text_len(&self) -> usize {
        match self {
            Node::Element(el) => el.text_len(),
            Node::Text(text) => text.len_chars(),
            Node::Markup(_) => 0,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Element {
    /// Build an element from its literal tags. `name` is matched case-insensitively.
    pub fn new(
        name: &str,
        open_tag: impl Into<String>,
        close_tag: Option<String>,
        children: Vec<Node>,
    ) -> Self {
        Self {
            name: SmolStr::new(name.to_ascii_lowercase()),
            open_tag: open_tag.into(),
            close_tag,
            children,
        }
    }

    /// Lowercased tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn open_tag(&self) -> &str {
        &self.open_tag
    }

    pub fn close_tag(&self) -> Option<&str> {
        self.close_tag.as_deref()
    }

    /// Decoded value of an attribute, if present.
    pub fn attr(&self, wanted: &str) -> Option<String> {
        parse_attributes(&self.open_tag)
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn text_len(&self) -> usize {
        self.children.iter().map(Node::text_len).sum()
    }

    /// Decoded text of everything inside this element.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        let mut path = Vec::new();
        let mut nodes = Vec::new();
        collect_text_nodes(&self.children, &mut path, &mut nodes);
        for (_, text) in nodes {
            out.push_str(text.text());
        }
        out
    }
}

impl Text {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let (text, _) = decode_with_map(&raw);
        Self { raw, text }
    }

    /// Source text, character references intact.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Decoded text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// `(decoded byte offset, raw byte offset)` at every char boundary of the
    /// decoded text, including the end. Sorted by both components.
    pub fn boundary_map(&self) -> Vec<(usize, usize)> {
        decode_with_map(&self.raw).1
    }
}

/// Decode character references, returning the decoded string and the boundary map.
fn decode_with_map(raw: &str) -> (String, Vec<(usize, usize)>) {
    let mut text = String::with_capacity(raw.len());
    let mut map = Vec::with_capacity(raw.len() + 1);
    let mut i = 0;
    while i < raw.len() {
        map.push((text.len(), i));
        let rest = &raw[i..];
        if rest.starts_with('&') {
            if let Some((ch, consumed)) = parse_char_ref(rest) {
                text.push(ch);
                i += consumed;
                continue;
            }
        }
        let ch = rest.chars().next().unwrap_or_default();
        text.push(ch);
        i += ch.len_utf8();
    }
    map.push((text.len(), raw.len()));
    (text, map)
}

/// Decode character references in an attribute value or text run.
pub fn decode_entities(raw: &str) -> String {
    decode_with_map(raw).0
}

/// Parse one character reference at the start of `s` (which starts with `&`).
fn parse_char_ref(s: &str) -> Option<(char, usize)> {
    let semi = s[1..].find(';').filter(|&n| n > 0 && n <= 10)? + 1;
    let body = &s[1..semi];
    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let num = body.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some((ch, semi + 1))
}

enum Token {
    Open { name: SmolStr, self_closing: bool },
    Close { name: SmolStr },
    Markup,
}

/// Recognize a tag-like construct starting at `lt`; returns its end offset.
fn scan_construct(s: &str, lt: usize) -> Option<(usize, Token)> {
    let rest = &s[lt..];
    if let Some(body) = rest.strip_prefix("<!--") {
        let end = body.find("-->").map(|i| lt + 4 + i + 3).unwrap_or(s.len());
        return Some((end, Token::Markup));
    }
    let bytes = rest.as_bytes();
    match bytes.get(1)? {
        b'/' => {
            if !bytes.get(2).is_some_and(u8::is_ascii_alphabetic) {
                return None;
            }
            let end = rest.find('>')?;
            Some((
                lt + end + 1,
                Token::Close {
                    name: tag_name(&rest[2..]),
                },
            ))
        }
        b'!' | b'?' => {
            let end = rest.find('>')?;
            Some((lt + end + 1, Token::Markup))
        }
        c if c.is_ascii_alphabetic() => {
            let end = find_tag_end(rest)?;
            let name = tag_name(&rest[1..]);
            let self_closing =
                rest[..end].ends_with('/') || VOID_ELEMENTS.contains(&name.as_str());
            Some((lt + end + 1, Token::Open { name, self_closing }))
        }
        _ => None,
    }
}

/// Index of the `>` closing an open tag, skipping quoted attribute values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut after_eq = false;
    for (i, &c) in tag.as_bytes().iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                b'"' | b'\'' if after_eq => quote = Some(c),
                b'>' => return Some(i),
                _ => {}
            },
        }
        if quote.is_none() && !c.is_ascii_whitespace() {
            after_eq = c == b'=';
        }
    }
    None
}

fn tag_name(s: &str) -> SmolStr {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
        .unwrap_or(s.len());
    SmolStr::new(s[..end].to_ascii_lowercase())
}

fn parse_attributes(tag: &str) -> Vec<(String, String)> {
    let b = tag.as_bytes();
    let len = b.len();
    let mut attrs = Vec::new();
    let mut i = 1;
    while i < len && !b[i].is_ascii_whitespace() && b[i] != b'>' && b[i] != b'/' {
        i += 1;
    }
    loop {
        while i < len && (b[i].is_ascii_whitespace() || b[i] == b'/') {
            i += 1;
        }
        if i >= len || b[i] == b'>' {
            break;
        }
        let name_start = i;
        while i < len && !b[i].is_ascii_whitespace() && !matches!(b[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let name = &tag[name_start..i];
        while i < len && b[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < len && b[i] == b'=' {
            i += 1;
            while i < len && b[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < len && (b[i] == b'"' || b[i] == b'\'') {
                let q = b[i];
                i += 1;
                let start = i;
                while i < len && b[i] != q {
                    i += 1;
                }
                value = decode_entities(&tag[start..i]);
                i = (i + 1).min(len);
            } else {
                let start = i;
                while i < len && !b[i].is_ascii_whitespace() && b[i] != b'>' {
                    i += 1;
                }
                value = decode_entities(&tag[start..i]);
            }
        }
        if name.is_empty() {
            i += 1;
            continue;
        }
        attrs.push((name.to_ascii_lowercase(), value));
    }
    attrs
}

#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(el) => &mut el.children,
            None => &mut self.root,
        }
    }

    fn text(&mut self, raw: &str) {
        if !raw.is_empty() {
            self.current().push(Node::Text(Text::from_raw(raw)));
        }
    }

    fn token(&mut self, token: Token, raw: &str) {
        match token {
            Token::Open {
                name,
                self_closing: true,
            } => self.current().push(Node::Element(Element {
                name,
                open_tag: raw.to_owned(),
                close_tag: None,
                children: Vec::new(),
            })),
            Token::Open { name, .. } => self.stack.push(Element {
                name,
                open_tag: raw.to_owned(),
                close_tag: None,
                children: Vec::new(),
            }),
            Token::Close { name } => {
                match self.stack.iter().rposition(|el| el.name == name) {
                    Some(idx) => {
                        // Anything opened inside and never closed ends here.
                        while self.stack.len() > idx + 1 {
                            self.close_top(None);
                        }
                        self.close_top(Some(raw.to_owned()));
                    }
                    None => self.current().push(Node::Markup(raw.to_owned())),
                }
            }
            Token::Markup => self.current().push(Node::Markup(raw.to_owned())),
        }
    }

    fn close_top(&mut self, close_tag: Option<String>) {
        if let Some(mut el) = self.stack.pop() {
            el.close_tag = close_tag;
            self.current().push(Node::Element(el));
        }
    }

    fn finish(mut self) -> MarkupTree {
        while !self.stack.is_empty() {
            self.close_top(None);
        }
        MarkupTree {
            children: self.root,
        }
    }
}
