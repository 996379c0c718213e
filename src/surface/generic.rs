//! Adapter that picks a concrete surface adapter per element

use tracing::warn;

use super::{HostElement, PlainTextAdapter, PlatformAdapter, RichTextAdapter, SurfaceKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericAdapter {
    plain: PlainTextAdapter,
    rich: RichTextAdapter,
}

impl GenericAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concrete adapter for an already-classified surface
    pub fn for_kind(&self, kind: SurfaceKind) -> Option<&dyn PlatformAdapter> {
        match kind {
            SurfaceKind::PlainText => Some(&self.plain),
            SurfaceKind::RichText => Some(&self.rich),
            SurfaceKind::Unsupported => None,
        }
    }

    fn resolve(&self, element: &dyn HostElement, op: &'static str) -> Option<&dyn PlatformAdapter> {
        let adapter = self.for_kind(SurfaceKind::classify(element));
        if adapter.is_none() {
            warn!(element = %element.id(), tag = element.tag_name(), op, "Unsupported surface");
        }
        adapter
    }
}

impl PlatformAdapter for GenericAdapter {
    fn get_text(&self, element: &dyn HostElement) -> String {
        self.resolve(element, "get_text")
            .map(|a| a.get_text(element))
            .unwrap_or_default()
    }

    fn insert_text(&self, element: &mut dyn HostElement, text: &str) -> bool {
        match self.resolve(element, "insert_text") {
            Some(adapter) => adapter.insert_text(element, text),
            None => false,
        }
    }

    fn replace_text_and_set_cursor(
        &self,
        element: &mut dyn HostElement,
        new_text: &str,
        cursor_offset: usize,
    ) -> bool {
        match self.resolve(element, "replace_text_and_set_cursor") {
            Some(adapter) => adapter.replace_text_and_set_cursor(element, new_text, cursor_offset),
            None => false,
        }
    }

    fn trigger_input_event(&self, element: &mut dyn HostElement) -> bool {
        match self.resolve(element, "trigger_input_event") {
            Some(adapter) => adapter.trigger_input_event(element),
            None => false,
        }
    }

    fn cursor_offset(&self, element: &dyn HostElement) -> Option<usize> {
        self.resolve(element, "cursor_offset")?.cursor_offset(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MemoryElement, SyntheticEvent};

    #[test]
    fn test_dispatches_by_surface() {
        let adapter = GenericAdapter::new();

        let mut plain = MemoryElement::textarea(1, "a");
        assert!(adapter.insert_text(&mut plain, "b"));
        assert!(adapter.trigger_input_event(&mut plain));
        assert_eq!(plain.text(), "ab");
        assert_eq!(plain.events(), &[SyntheticEvent::Input]);

        let mut rich = MemoryElement::rich(2, &["a"]);
        assert!(adapter.insert_text(&mut rich, "b"));
        assert!(adapter.trigger_input_event(&mut rich));
        assert_eq!(rich.text(), "ab");
        assert_eq!(rich.events().len(), 2);
    }

    #[test]
    fn test_unsupported_returns_false() {
        let adapter = GenericAdapter::new();
        let mut checkbox = MemoryElement::input(1, Some("checkbox"), "on");
        assert_eq!(adapter.get_text(&checkbox), "");
        assert!(!adapter.insert_text(&mut checkbox, "x"));
        assert!(!adapter.replace_text_and_set_cursor(&mut checkbox, "x", 1));
        assert!(!adapter.trigger_input_event(&mut checkbox));
        assert_eq!(adapter.cursor_offset(&checkbox), None);
        assert_eq!(checkbox.text(), "on");
    }

    #[test]
    fn test_for_kind() {
        let adapter = GenericAdapter::new();
        assert!(adapter.for_kind(SurfaceKind::PlainText).is_some());
        assert!(adapter.for_kind(SurfaceKind::Unsupported).is_none());
    }
}
