//! contenteditable surfaces
//!
//! Text lives in an ordered list of text nodes. The adapter works on the flat
//! concatenation and maps flat offsets back to `(node, offset)` points after
//! every replacement, since the host may re-split the text into new nodes.

use tracing::{debug, warn};

use super::{
    char_len, splice_chars, HostElement, NodePoint, PlatformAdapter, SyntheticEvent,
};

/// Flat char offset of a node point
pub fn flat_offset(nodes: &[String], point: NodePoint) -> usize {
    let before: usize = nodes.iter().take(point.node).map(|n| char_len(n)).sum();
    let within = nodes
        .get(point.node)
        .map(|n| point.offset.min(char_len(n)))
        .unwrap_or(0);
    before + within
}

/// Node point for a flat char offset
///
/// Offsets past the end clamp to the end of the last text node. An offset
/// that lands exactly on a node boundary resolves to the end of the earlier
/// node. Returns `None` only when there are no text nodes at all.
pub fn point_for_offset(nodes: &[String], offset: usize) -> Option<NodePoint> {
    let last = nodes.len().checked_sub(1)?;
    let mut remaining = offset;
    for (index, node) in nodes.iter().enumerate() {
        let len = char_len(node);
        if remaining <= len {
            return Some(NodePoint::new(index, remaining));
        }
        remaining -= len;
    }
    Some(NodePoint::new(last, char_len(&nodes[last])))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RichTextAdapter;

impl RichTextAdapter {
    fn flat_selection(element: &dyn HostElement) -> Option<(usize, usize)> {
        let host = element.rich_text()?;
        let nodes = host.text_nodes();
        match host.selection() {
            Some((start, end)) => {
                let a = flat_offset(&nodes, start);
                let b = flat_offset(&nodes, end);
                Some((a.min(b), a.max(b)))
            }
            // No selection inside the editor: treat the caret as being at the end
            None => {
                let end = nodes.iter().map(|n| char_len(n)).sum();
                Some((end, end))
            }
        }
    }
}

impl PlatformAdapter for RichTextAdapter {
    fn get_text(&self, element: &dyn HostElement) -> String {
        match element.rich_text() {
            Some(host) => host.text_nodes().concat(),
            None => {
                debug!(element = %element.id(), "get_text on element without rich text");
                String::new()
            }
        }
    }

    fn insert_text(&self, element: &mut dyn HostElement, text: &str) -> bool {
        let Some((start, end)) = Self::flat_selection(element) else {
            warn!(element = %element.id(), "insert_text on unsupported element");
            return false;
        };
        let current = self.get_text(element);
        let updated = splice_chars(&current, start, end, text);
        self.replace_text_and_set_cursor(element, &updated, start + char_len(text))
    }

    fn replace_text_and_set_cursor(
        &self,
        element: &mut dyn HostElement,
        new_text: &str,
        cursor_offset: usize,
    ) -> bool {
        let id = element.id();
        let Some(host) = element.rich_text_mut() else {
            warn!(element = %id, "replace_text_and_set_cursor on unsupported element");
            return false;
        };

        host.replace_children(vec![new_text.to_string()]);

        // Re-walk the nodes the host actually created
        let nodes = host.text_nodes();
        match point_for_offset(&nodes, cursor_offset) {
            Some(point) => {
                host.set_selection(point, point);
                true
            }
            None => {
                warn!(element = %id, "Editor has no text nodes after replacement");
                false
            }
        }
    }

    fn trigger_input_event(&self, element: &mut dyn HostElement) -> bool {
        if element.rich_text().is_none() {
            return false;
        }
        // Some frameworks only listen to one of the two
        element.dispatch(SyntheticEvent::Input);
        element.dispatch(SyntheticEvent::Change);
        true
    }

    fn cursor_offset(&self, element: &dyn HostElement) -> Option<usize> {
        Self::flat_selection(element).map(|(start, _)| start)
    }
}
