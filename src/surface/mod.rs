//! Editable surfaces and the adapters that read and write them
//!
//! The engine never talks to a browser directly. A host hands it
//! [`HostElement`] handles; each element exposes at most one of two editing
//! surfaces:
//!
//! - [`TextControl`] for `<textarea>` and text-like `<input>` elements
//! - [`RichTextHost`] for `contenteditable` regions, modelled as an ordered
//!   list of text nodes
//!
//! An element is classified once per trigger session into a [`SurfaceKind`]
//! and every later operation dispatches on that tag. All offsets are char
//! offsets, never byte offsets.

mod generic;
mod memory;
mod plain;
mod rich;

pub use generic::GenericAdapter;
pub use memory::{MemoryElement, MemoryRichText, MemoryTextControl};
pub use plain::PlainTextAdapter;
pub use rich::{flat_offset, point_for_offset, RichTextAdapter};

use serde::{Deserialize, Serialize};

/// Stable identity of a host element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// Client rectangle in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Native notifications synthesized after a programmatic edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticEvent {
    Input,
    Change,
}

/// A position inside a rich text surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoint {
    /// Index into `RichTextHost::text_nodes`
    pub node: usize,
    /// Char offset within that node
    pub offset: usize,
}

impl NodePoint {
    pub fn new(node: usize, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The value/selection model of a textarea or text input
pub trait TextControl {
    fn value(&self) -> String;
    fn set_value(&mut self, value: String);
    /// Selection as (start, end) char offsets, start <= end
    fn selection(&self) -> (usize, usize);
    fn set_selection(&mut self, start: usize, end: usize);
}

/// The text-node model of a contenteditable region
pub trait RichTextHost {
    fn text_nodes(&self) -> Vec<String>;
    /// Replace every child; the host may split the text into several nodes
    fn replace_children(&mut self, nodes: Vec<String>);
    /// Selection as (start, end) points in document order
    fn selection(&self) -> Option<(NodePoint, NodePoint)>;
    fn set_selection(&mut self, start: NodePoint, end: NodePoint);
}

/// A handle to one element on the host page
pub trait HostElement {
    fn id(&self) -> ElementId;
    /// Lowercase tag name (`textarea`, `input`, `div`, ...)
    fn tag_name(&self) -> &str;
    /// Lowercase `type` attribute for inputs
    fn input_type(&self) -> Option<&str>;
    fn is_content_editable(&self) -> bool;
    /// False once the element has been removed from the document
    fn is_connected(&self) -> bool;
    fn bounding_rect(&self) -> Rect;
    /// Client rect of the collapsed selection, when the host can measure it
    fn caret_rect(&self) -> Option<Rect>;
    fn focus(&mut self);
    fn dispatch(&mut self, event: SyntheticEvent);

    fn text_control(&self) -> Option<&dyn TextControl>;
    fn text_control_mut(&mut self) -> Option<&mut dyn TextControl>;
    fn rich_text(&self) -> Option<&dyn RichTextHost>;
    fn rich_text_mut(&mut self) -> Option<&mut dyn RichTextHost>;
}

/// Input `type` values that behave like free text
const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "email", "tel", "password"];

/// Capability tag assigned to an element at session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfaceKind {
    PlainText,
    RichText,
    Unsupported,
}

impl SurfaceKind {
    pub fn classify(element: &dyn HostElement) -> Self {
        if element.is_content_editable() {
            return if element.rich_text().is_some() {
                SurfaceKind::RichText
            } else {
                SurfaceKind::Unsupported
            };
        }

        let text_capable = match element.tag_name() {
            "textarea" => true,
            "input" => element
                .input_type()
                .map(|t| TEXT_INPUT_TYPES.contains(&t))
                .unwrap_or(true),
            _ => false,
        };

        if text_capable && element.text_control().is_some() {
            SurfaceKind::PlainText
        } else {
            SurfaceKind::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        self != SurfaceKind::Unsupported
    }
}

/// Read and write access to an editable surface
///
/// Every operation degrades to `false`/empty on an element the adapter
/// cannot handle. Callers log and move on.
pub trait PlatformAdapter {
    /// Full text of the element
    fn get_text(&self, element: &dyn HostElement) -> String;

    /// Insert `text` at the cursor, replacing any selected range
    fn insert_text(&self, element: &mut dyn HostElement, text: &str) -> bool;

    /// Replace the whole text and collapse the caret at `cursor_offset`
    fn replace_text_and_set_cursor(
        &self,
        element: &mut dyn HostElement,
        new_text: &str,
        cursor_offset: usize,
    ) -> bool;

    /// Notify the host page that its content changed
    fn trigger_input_event(&self, element: &mut dyn HostElement) -> bool;

    /// Char offset of the selection start
    fn cursor_offset(&self, element: &dyn HostElement) -> Option<usize>;
}

/// Number of chars in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of char offset `idx`, clamped to the end of `text`
pub fn byte_index(text: &str, idx: usize) -> usize {
    text.char_indices()
        .nth(idx)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Chars `[start, end)` of `text`, clamped
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let start_b = byte_index(text, start);
    let end_b = byte_index(text, end.max(start));
    &text[start_b..end_b]
}

/// Replace chars `[start, end)` with `insert`
pub fn splice_chars(text: &str, start: usize, end: usize, insert: &str) -> String {
    let start_b = byte_index(text, start);
    let end_b = byte_index(text, end.max(start));
    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..start_b]);
    out.push_str(insert);
    out.push_str(&text[end_b..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_plain_controls() {
        let textarea = MemoryElement::textarea(1, "");
        assert_eq!(SurfaceKind::classify(&textarea), SurfaceKind::PlainText);

        let search = MemoryElement::input(2, Some("search"), "");
        assert_eq!(SurfaceKind::classify(&search), SurfaceKind::PlainText);

        let untyped = MemoryElement::input(3, None, "");
        assert_eq!(SurfaceKind::classify(&untyped), SurfaceKind::PlainText);
    }

    #[test]
    fn test_classify_rejects_non_text_inputs() {
        let checkbox = MemoryElement::input(1, Some("checkbox"), "");
        assert_eq!(SurfaceKind::classify(&checkbox), SurfaceKind::Unsupported);

        let number = MemoryElement::input(2, Some("number"), "");
        assert_eq!(SurfaceKind::classify(&number), SurfaceKind::Unsupported);

        let div = MemoryElement::inert(3, "div");
        assert_eq!(SurfaceKind::classify(&div), SurfaceKind::Unsupported);
    }

    #[test]
    fn test_classify_content_editable() {
        let editor = MemoryElement::rich(1, &["hello"]);
        assert_eq!(SurfaceKind::classify(&editor), SurfaceKind::RichText);
    }

    #[test]
    fn test_char_helpers_handle_multibyte() {
        let text = "你好/世界";
        assert_eq!(char_len(text), 5);
        assert_eq!(char_slice(text, 3, 5), "世界");
        assert_eq!(char_slice(text, 3, 99), "世界");
        assert_eq!(splice_chars(text, 2, 5, "!"), "你好!");
    }
}
