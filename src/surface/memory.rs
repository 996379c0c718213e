//! In-memory host elements
//!
//! Back the headless simulator and the test suites. They behave like a
//! browser's textarea/contenteditable for everything the engine touches and
//! record every synthesized event.

use super::{
    char_len, flat_offset, point_for_offset, splice_chars, ElementId, HostElement, NodePoint,
    Rect, RichTextHost, SyntheticEvent, TextControl,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTextControl {
    value: String,
    selection: (usize, usize),
}

impl MemoryTextControl {
    /// Control holding `value` with the caret at the end
    pub fn new(value: &str) -> Self {
        let end = char_len(value);
        Self {
            value: value.to_string(),
            selection: (end, end),
        }
    }
}

impl TextControl for MemoryTextControl {
    fn value(&self) -> String {
        self.value.clone()
    }

    fn set_value(&mut self, value: String) {
        // Browsers move the caret to the end on a programmatic value change
        let end = char_len(&value);
        self.value = value;
        self.selection = (end, end);
    }

    fn selection(&self) -> (usize, usize) {
        self.selection
    }

    fn set_selection(&mut self, start: usize, end: usize) {
        let len = char_len(&self.value);
        let start = start.min(len);
        let end = end.min(len).max(start);
        self.selection = (start, end);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryRichText {
    nodes: Vec<String>,
    selection: Option<(NodePoint, NodePoint)>,
    /// Split replaced content into one node per line, like a paragraph-based editor
    split_lines: bool,
}

impl MemoryRichText {
    /// Editor with the given text nodes and the caret at the end
    pub fn new(nodes: &[&str]) -> Self {
        let nodes: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        let end = point_for_offset(&nodes, usize::MAX);
        Self {
            selection: end.map(|p| (p, p)),
            nodes,
            split_lines: false,
        }
    }

    pub fn with_line_nodes(mut self) -> Self {
        self.split_lines = true;
        self
    }
}

impl RichTextHost for MemoryRichText {
    fn text_nodes(&self) -> Vec<String> {
        self.nodes.clone()
    }

    fn replace_children(&mut self, nodes: Vec<String>) {
        self.nodes = if self.split_lines {
            nodes
                .iter()
                .flat_map(|n| n.split_inclusive('\n').map(str::to_string))
                .collect()
        } else {
            nodes
        };
        self.selection = None;
    }

    fn selection(&self) -> Option<(NodePoint, NodePoint)> {
        self.selection
    }

    fn set_selection(&mut self, start: NodePoint, end: NodePoint) {
        self.selection = Some((start, end));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Plain(MemoryTextControl),
    Rich(MemoryRichText),
    Inert,
}

/// A host element living entirely in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryElement {
    id: ElementId,
    tag: String,
    input_type: Option<String>,
    content_editable: bool,
    connected: bool,
    rect: Rect,
    caret_rect: Option<Rect>,
    focus_count: usize,
    events: Vec<SyntheticEvent>,
    body: Body,
}

impl MemoryElement {
    fn with_body(id: u64, tag: &str, body: Body) -> Self {
        Self {
            id: ElementId(id),
            tag: tag.to_string(),
            input_type: None,
            content_editable: matches!(body, Body::Rich(_)),
            connected: true,
            rect: Rect::new(100.0, 100.0, 400.0, 120.0),
            caret_rect: None,
            focus_count: 0,
            events: Vec::new(),
            body,
        }
    }

    pub fn textarea(id: u64, value: &str) -> Self {
        Self::with_body(id, "textarea", Body::Plain(MemoryTextControl::new(value)))
    }

    pub fn input(id: u64, input_type: Option<&str>, value: &str) -> Self {
        let mut element = Self::with_body(id, "input", Body::Plain(MemoryTextControl::new(value)));
        element.input_type = input_type.map(str::to_ascii_lowercase);
        element
    }

    pub fn rich(id: u64, nodes: &[&str]) -> Self {
        Self::with_body(id, "div", Body::Rich(MemoryRichText::new(nodes)))
    }

    pub fn rich_with(id: u64, host: MemoryRichText) -> Self {
        Self::with_body(id, "div", Body::Rich(host))
    }

    /// An element with no editing surface
    pub fn inert(id: u64, tag: &str) -> Self {
        Self::with_body(id, tag, Body::Inert)
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_caret_rect(mut self, rect: Rect) -> Self {
        self.caret_rect = Some(rect);
        self
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn events(&self) -> &[SyntheticEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count
    }

    /// Flat text of the surface (empty for inert elements)
    pub fn text(&self) -> String {
        match &self.body {
            Body::Plain(control) => control.value(),
            Body::Rich(host) => host.text_nodes().concat(),
            Body::Inert => String::new(),
        }
    }

    /// Flat caret offset (selection start)
    pub fn cursor(&self) -> Option<usize> {
        match &self.body {
            Body::Plain(control) => Some(control.selection().0),
            Body::Rich(host) => host
                .selection()
                .map(|(start, _)| flat_offset(&host.text_nodes(), start)),
            Body::Inert => None,
        }
    }

    /// Move the caret to a flat offset, as a click or arrow key would
    pub fn set_cursor(&mut self, offset: usize) {
        match &mut self.body {
            Body::Plain(control) => control.set_selection(offset, offset),
            Body::Rich(host) => {
                if let Some(point) = point_for_offset(&host.text_nodes(), offset) {
                    host.set_selection(point, point);
                }
            }
            Body::Inert => {}
        }
    }

    /// Simulate the user typing `text` at the caret
    pub fn type_text(&mut self, text: &str) {
        let cursor = self.cursor().unwrap_or(0);
        self.edit_at(cursor, cursor, text);
    }

    /// Simulate one Backspace at the caret
    pub fn backspace(&mut self) {
        let cursor = self.cursor().unwrap_or(0);
        if cursor > 0 {
            self.edit_at(cursor - 1, cursor, "");
        }
    }

    fn edit_at(&mut self, start: usize, end: usize, insert: &str) {
        let new_text = splice_chars(&self.text(), start, end, insert);
        let caret = start + char_len(insert);
        match &mut self.body {
            Body::Plain(control) => {
                control.set_value(new_text);
                control.set_selection(caret, caret);
            }
            Body::Rich(host) => {
                host.replace_children(vec![new_text]);
                if let Some(point) = point_for_offset(&host.text_nodes(), caret) {
                    host.set_selection(point, point);
                }
            }
            Body::Inert => {}
        }
    }
}

impl HostElement for MemoryElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn input_type(&self) -> Option<&str> {
        self.input_type.as_deref()
    }

    fn is_content_editable(&self) -> bool {
        self.content_editable
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn bounding_rect(&self) -> Rect {
        self.rect
    }

    fn caret_rect(&self) -> Option<Rect> {
        self.caret_rect
    }

    fn focus(&mut self) {
        self.focus_count += 1;
    }

    fn dispatch(&mut self, event: SyntheticEvent) {
        self.events.push(event);
    }

    fn text_control(&self) -> Option<&dyn TextControl> {
        match &self.body {
            Body::Plain(control) => Some(control),
            _ => None,
        }
    }

    fn text_control_mut(&mut self) -> Option<&mut dyn TextControl> {
        match &mut self.body {
            Body::Plain(control) => Some(control),
            _ => None,
        }
    }

    fn rich_text(&self) -> Option<&dyn RichTextHost> {
        match &self.body {
            Body::Rich(host) => Some(host),
            _ => None,
        }
    }

    fn rich_text_mut(&mut self) -> Option<&mut dyn RichTextHost> {
        match &mut self.body {
            Body::Rich(host) => Some(host),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_moves_caret() {
        let mut el = MemoryElement::textarea(1, "Hi ");
        el.type_text("/wor");
        assert_eq!(el.text(), "Hi /wor");
        assert_eq!(el.cursor(), Some(7));
        el.backspace();
        assert_eq!(el.text(), "Hi /wo");
        assert_eq!(el.cursor(), Some(6));
    }

    #[test]
    fn test_typing_in_middle_of_rich_text() {
        let mut el = MemoryElement::rich(1, &["ab", "cd"]);
        el.set_cursor(2);
        el.type_text("/x");
        assert_eq!(el.text(), "ab/xcd");
        assert_eq!(el.cursor(), Some(4));
    }

    #[test]
    fn test_line_nodes_split_on_replace() {
        let mut host = MemoryRichText::new(&[""]).with_line_nodes();
        host.replace_children(vec!["one\ntwo\nthree".to_string()]);
        assert_eq!(host.text_nodes(), vec!["one\n", "two\n", "three"]);
    }

    #[test]
    fn test_selection_is_clamped() {
        let mut control = MemoryTextControl::new("abc");
        control.set_selection(10, 2);
        assert_eq!(control.selection(), (3, 3));
    }
}
