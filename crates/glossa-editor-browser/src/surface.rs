//! `contenteditable` element as an editor surface.
//!
//! Uses the DOM Selection API for the cursor and `execCommand` for
//! formatting. Offsets are counted in chars, the same unit the core uses;
//! conversion to the DOM's UTF-16 offsets happens only at the node boundary.

use glossa_editor_core::{CursorOffset, EditorSurface, FormatCommand, PlatformError};
use wasm_bindgen::JsCast;

/// `NodeFilter.SHOW_TEXT`
const SHOW_TEXT: u32 = 0x4;

/// Editor surface over a live DOM element.
#[derive(Debug, Clone)]
pub struct DomSurface {
    element: web_sys::HtmlElement,
}

impl DomSurface {
    pub fn new(element: web_sys::HtmlElement) -> Self {
        Self { element }
    }

    /// Look up the editor element by id.
    pub fn from_id(id: &str) -> Result<Self, PlatformError> {
        let element = gloo_utils::document()
            .get_element_by_id(id)
            .ok_or_else(|| format!("element not found: {id}"))?
            .dyn_into::<web_sys::HtmlElement>()
            .map_err(|_| "editor element is not an HtmlElement")?;
        Ok(Self { element })
    }

    pub fn element(&self) -> &web_sys::HtmlElement {
        &self.element
    }
}

impl EditorSurface for DomSurface {
    fn markup(&self) -> String {
        self.element.inner_html()
    }

    fn set_markup(&mut self, markup: &str) -> Result<(), PlatformError> {
        self.element.set_inner_html(markup);
        Ok(())
    }

    fn plain_text(&self) -> String {
        self.element.inner_text()
    }

    fn capture_cursor(&self) -> Option<CursorOffset> {
        let selection = gloo_utils::window().get_selection().ok()??;
        if selection.range_count() == 0 {
            return None;
        }
        let range = selection.get_range_at(0).ok()?;
        let container = range.start_container().ok()?;
        if !self.element.contains(Some(&container)) {
            return None;
        }

        // Everything from the start of the element up to the selection start.
        let before = gloo_utils::document().create_range().ok()?;
        before.select_node_contents(&self.element).ok()?;
        before
            .set_end(&container, range.start_offset().ok()?)
            .ok()?;
        let offset = String::from(before.to_string()).chars().count();
        tracing::trace!(target: "glossa::cursor", offset, "captured dom cursor");
        Some(CursorOffset::new(offset))
    }

    fn restore_cursor(&mut self, offset: CursorOffset) -> Result<(), PlatformError> {
        let Some((node, utf16_offset)) = find_text_node_at_offset(&self.element, offset.char_offset)?
        else {
            return Ok(());
        };

        let document = gloo_utils::document();
        let range = document
            .create_range()
            .map_err(|e| format!("create_range failed: {:?}", e))?;
        range
            .set_start(&node, utf16_offset)
            .map_err(|e| format!("set_start failed: {:?}", e))?;
        range.collapse_with_to_start(true);

        let selection = gloo_utils::window()
            .get_selection()
            .map_err(|e| format!("get_selection failed: {:?}", e))?
            .ok_or("no selection object")?;
        selection
            .remove_all_ranges()
            .map_err(|e| format!("remove_all_ranges failed: {:?}", e))?;
        selection
            .add_range(&range)
            .map_err(|e| format!("add_range failed: {:?}", e))?;
        Ok(())
    }

    fn exec_command(&mut self, command: &FormatCommand) -> Result<(), PlatformError> {
        let document = gloo_utils::document()
            .dyn_into::<web_sys::HtmlDocument>()
            .map_err(|_| "document is not an HtmlDocument")?;
        let name = command.command_name();
        // Toolbar clicks must not leave the command without a target.
        if let Err(e) = self.element.focus() {
            tracing::debug!(command = name, error = ?e, "could not focus editor before execCommand");
        }
        let applied = match command.value() {
            Some(value) => document.exec_command_with_show_ui_and_value(name, false, &value),
            None => document.exec_command(name),
        }
        .map_err(|e| format!("execCommand({name}) failed: {:?}", e))?;
        if !applied {
            tracing::debug!(command = name, "execCommand was not applied");
        }
        Ok(())
    }
}

/// Find the text node holding the `char_offset`-th character of `container`.
///
/// Returns the node and the UTF-16 offset inside it. Offsets past the end
/// land at the end of the last text node; `None` if there is no text at all.
pub fn find_text_node_at_offset(
    container: &web_sys::HtmlElement,
    char_offset: usize,
) -> Result<Option<(web_sys::Node, u32)>, PlatformError> {
    let walker = gloo_utils::document()
        .create_tree_walker_with_what_to_show(container, SHOW_TEXT)
        .map_err(|e| format!("create_tree_walker failed: {:?}", e))?;

    let mut running = 0;
    let mut last: Option<(web_sys::Node, u32)> = None;

    while let Ok(Some(node)) = walker.next_node() {
        let text = node.text_content().unwrap_or_default();
        let len = text.chars().count();
        if running + len >= char_offset {
            let utf16 = utf16_len(text.chars().take(char_offset - running));
            return Ok(Some((node, utf16)));
        }
        running += len;
        let end = utf16_len(text.chars());
        last = Some((node, end));
    }

    if last.is_some() {
        tracing::debug!(
            target: "glossa::cursor",
            requested = char_offset,
            total = running,
            "offset past end of content, collapsing to end"
        );
    }
    Ok(last)
}

fn utf16_len(chars: impl Iterator<Item = char>) -> u32 {
    chars.map(|c| c.len_utf16() as u32).sum()
}
