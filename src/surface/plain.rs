//! textarea / input surfaces

use tracing::{debug, warn};

use super::{char_len, splice_chars, HostElement, PlatformAdapter, SyntheticEvent};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextAdapter;

impl PlatformAdapter for PlainTextAdapter {
    fn get_text(&self, element: &dyn HostElement) -> String {
        match element.text_control() {
            Some(control) => control.value(),
            None => {
                debug!(element = %element.id(), "get_text on element without text control");
                String::new()
            }
        }
    }

    fn insert_text(&self, element: &mut dyn HostElement, text: &str) -> bool {
        let id = element.id();
        let Some(control) = element.text_control_mut() else {
            warn!(element = %id, "insert_text on unsupported element");
            return false;
        };
        let (start, end) = control.selection();
        let updated = splice_chars(&control.value(), start, end, text);
        let caret = start + char_len(text);
        control.set_value(updated);
        control.set_selection(caret, caret);
        true
    }

    fn replace_text_and_set_cursor(
        &self,
        element: &mut dyn HostElement,
        new_text: &str,
        cursor_offset: usize,
    ) -> bool {
        let id = element.id();
        let Some(control) = element.text_control_mut() else {
            warn!(element = %id, "replace_text_and_set_cursor on unsupported element");
            return false;
        };
        let caret = cursor_offset.min(char_len(new_text));
        control.set_value(new_text.to_string());
        control.set_selection(caret, caret);
        true
    }

    fn trigger_input_event(&self, element: &mut dyn HostElement) -> bool {
        if element.text_control().is_none() {
            return false;
        }
        element.dispatch(SyntheticEvent::Input);
        true
    }

    fn cursor_offset(&self, element: &dyn HostElement) -> Option<usize> {
        element.text_control().map(|c| c.selection().0)
    }
}
