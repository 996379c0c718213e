//! Overlay state machine: results, keyboard navigation, commit, teardown

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OverlayConfig;
use crate::error::ResultExt;
use crate::prompt::PromptRecord;
use crate::search::{SearchOutcome, SearchStatus};
use crate::store::PromptStore;
use crate::surface::{
    char_len, char_slice, splice_chars, ElementId, HostElement, PlatformAdapter, SurfaceKind,
};
use crate::trigger::{CloseReason, TriggerSession};

use super::position::{caret_anchor, compute_position, OverlayPosition, Viewport};
use super::scope::{ListenerRegistry, ObserverScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
}

/// Keys the overlay reacts to, named as in `KeyboardEvent.key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Tab,
    Enter,
    Escape,
    #[serde(other)]
    Other,
}

impl Key {
    pub fn parse(name: &str) -> Self {
        match name {
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Tab" => Key::Tab,
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// What a key press means while the overlay is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Not ours; the page handles the key
    Ignored,
    Navigated(usize),
    Commit(usize),
    Close(CloseReason),
}

impl KeyAction {
    /// Whether the host should suppress the page's default handling
    ///
    /// Horizontal arrows close the overlay but still move the caret.
    pub fn consumes_event(&self) -> bool {
        match self {
            KeyAction::Ignored => false,
            KeyAction::Close(reason) => *reason != CloseReason::HorizontalArrow,
            KeyAction::Navigated(_) | KeyAction::Commit(_) => true,
        }
    }
}

/// Snapshot handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    pub is_open: bool,
    pub element: Option<ElementId>,
    pub results: Vec<PromptRecord>,
    pub active_index: usize,
    pub status: SearchStatus,
    /// "search failed" text, distinct from an empty result
    pub error: Option<String>,
    pub position: Option<OverlayPosition>,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub prompt_id: String,
    pub element: ElementId,
    pub new_text: String,
    pub cursor: usize,
    /// Char span now occupied by the prompt content
    pub inserted: Range<usize>,
}

/// `text` with `span` replaced by `content`, and the caret just after it
pub fn compose_commit(text: &str, span: Range<usize>, content: &str) -> (String, usize) {
    let new_text = splice_chars(text, span.start, span.end, content);
    (new_text, span.start + char_len(content))
}

#[derive(Debug)]
pub struct OverlayController {
    config: OverlayConfig,
    registry: ListenerRegistry,
    scope: Option<ObserverScope>,
    element: Option<ElementId>,
    results: Vec<PromptRecord>,
    active_index: usize,
    status: SearchStatus,
    error: Option<String>,
    position: Option<OverlayPosition>,
}

impl OverlayController {
    pub fn new(config: OverlayConfig, registry: ListenerRegistry) -> Self {
        Self {
            config,
            registry,
            scope: None,
            element: None,
            results: Vec::new(),
            active_index: 0,
            status: SearchStatus::Idle,
            error: None,
            position: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.element.is_some()
    }

    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    pub fn results(&self) -> &[PromptRecord] {
        &self.results
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn selected(&self) -> Option<&PromptRecord> {
        self.results.get(self.active_index)
    }

    pub fn position(&self) -> Option<OverlayPosition> {
        self.position
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Show the overlay anchored to `element`, in the loading state
    pub fn open(&mut self, element: &dyn HostElement, surface: SurfaceKind, viewport: Viewport) {
        let id = element.id();
        if self.element != Some(id) {
            self.teardown();
            self.scope = Some(ObserverScope::acquire(&self.registry, id));
            self.element = Some(id);
            info!(element = %id, ?surface, "Overlay opened");
        }
        self.status = SearchStatus::Loading;
        self.reposition(element, surface, viewport);
    }

    /// Recompute the caret-relative position
    pub fn reposition(&mut self, element: &dyn HostElement, surface: SurfaceKind, viewport: Viewport) {
        if self.element != Some(element.id()) {
            return;
        }
        let anchor = caret_anchor(element, surface);
        let position = compute_position(anchor, element.bounding_rect(), viewport, &self.config);
        debug!(left = position.left, y = position.y, placement = ?position.placement, "Overlay positioned");
        self.position = Some(position);
    }

    pub fn show_loading(&mut self) {
        if self.is_open() {
            self.status = SearchStatus::Loading;
        }
    }

    /// Replace the list with a settled search
    pub fn show_outcome(&mut self, outcome: &SearchOutcome) {
        if !self.is_open() {
            return;
        }
        self.results = outcome.results.clone();
        self.active_index = 0;
        self.error = outcome.error.clone();
        self.status = if outcome.failed() {
            SearchStatus::Failed
        } else {
            SearchStatus::Ready
        };
    }

    /// Move the highlight, clamped to the list; `None` while closed or empty
    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        if !self.is_open() || self.results.is_empty() {
            return None;
        }
        let last = self.results.len() - 1;
        self.active_index = match direction {
            Direction::Up => self.active_index.saturating_sub(1),
            Direction::Down => (self.active_index + 1).min(last),
        };
        Some(self.active_index)
    }

    pub fn handle_key(&mut self, key: Key) -> KeyAction {
        if !self.is_open() {
            return KeyAction::Ignored;
        }
        match key {
            Key::ArrowUp => KeyAction::Navigated(self.navigate(Direction::Up).unwrap_or(0)),
            Key::ArrowDown => KeyAction::Navigated(self.navigate(Direction::Down).unwrap_or(0)),
            Key::Tab | Key::Enter if self.selected().is_some() => {
                KeyAction::Commit(self.active_index)
            }
            Key::Escape => KeyAction::Close(CloseReason::Escape),
            Key::ArrowLeft | Key::ArrowRight => KeyAction::Close(CloseReason::HorizontalArrow),
            _ => KeyAction::Ignored,
        }
    }

    /// Replace the trigger span with result `index`, count the use, close,
    /// and hand focus back to the element
    ///
    /// Returns `None` without touching the page when the element no longer
    /// holds the "/" the session was anchored to.
    pub fn commit(
        &mut self,
        index: usize,
        session: &TriggerSession,
        element: &mut dyn HostElement,
        adapter: &dyn PlatformAdapter,
        store: &dyn PromptStore,
    ) -> Option<CommitResult> {
        let Some(record) = self.results.get(index).cloned() else {
            warn!(index, results = self.results.len(), "Commit index out of range");
            return None;
        };
        if element.id() != session.element || !element.is_connected() {
            warn!(element = %element.id(), "Commit target is gone");
            return None;
        }

        let text = adapter.get_text(element);
        let span = session.replaced_span();
        if char_slice(&text, span.start, span.start + 1) != "/" {
            warn!(
                trigger_offset = span.start,
                "Trigger character moved before commit"
            );
            return None;
        }

        let (new_text, cursor) = compose_commit(&text, span.clone(), &record.content);
        if !adapter.replace_text_and_set_cursor(element, &new_text, cursor) {
            warn!(element = %element.id(), "Replacement rejected by surface");
            return None;
        }
        adapter.trigger_input_event(element);
        store.increment_use(&record.id).log_err();

        self.teardown();
        element.focus();

        info!(prompt_id = %record.id, cursor, "Prompt inserted");
        Some(CommitResult {
            prompt_id: record.id,
            element: session.element,
            new_text,
            cursor,
            inserted: span.start..cursor,
        })
    }

    /// Close and release listeners; false when already closed
    pub fn teardown(&mut self) -> bool {
        let Some(element) = self.element.take() else {
            return false;
        };
        if let Some(mut scope) = self.scope.take() {
            scope.release();
        }
        self.results.clear();
        self.active_index = 0;
        self.status = SearchStatus::Idle;
        self.error = None;
        self.position = None;
        debug!(%element, "Overlay torn down");
        true
    }

    pub fn view(&self) -> OverlayView {
        OverlayView {
            is_open: self.is_open(),
            element: self.element,
            results: self.results.clone(),
            active_index: self.active_index,
            status: self.status,
            error: self.error.clone(),
            position: self.position,
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
