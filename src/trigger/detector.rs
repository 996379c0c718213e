//! "/" trigger detection
//!
//! One detector serves the whole document, mirroring a document-level input
//! listener. It owns at most one [`TriggerSession`] at a time.
//!
//! ```text
//!   Idle --"/" within reach--> Armed --term edits--> Armed
//!     ^                          |
//!     +------- close(reason) ----+
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::ShortcutConfig;
use crate::surface::ElementId;

use super::session::{CloseReason, DismissMemory, InputSnapshot, TriggerSession};
use super::throttle::Throttle;

/// A change in the detector's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerTransition {
    Armed(TriggerSession),
    /// Term or anchor changed while armed
    Updated(TriggerSession),
    Closed {
        element: ElementId,
        trigger_offset: usize,
        reason: CloseReason,
    },
}

/// Prompt content a commit placed at `span`
#[derive(Debug, Clone)]
struct InsertedText {
    span: Range<usize>,
    content: String,
}

impl InsertedText {
    /// Still sitting where the commit put it, untouched
    fn is_intact(&self, chars: &[char]) -> bool {
        chars
            .get(self.span.clone())
            .is_some_and(|found| found.iter().copied().eq(self.content.chars()))
    }
}

#[derive(Debug)]
pub struct TriggerDetector {
    max_distance: usize,
    throttle: Throttle<InputSnapshot>,
    session: Option<TriggerSession>,
    dismissed: DismissMemory,
    /// Text just inserted by a commit, per element
    inserted: HashMap<ElementId, InsertedText>,
    composing: Option<InputSnapshot>,
}

/// Char offset of the last "/" in `chars[from..to]`
fn last_slash(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let to = to.min(chars.len());
    if from >= to {
        return None;
    }
    chars[from..to]
        .iter()
        .rposition(|c| *c == '/')
        .map(|i| from + i)
}

impl TriggerDetector {
    pub fn new(config: &ShortcutConfig) -> Self {
        Self {
            max_distance: config.max_trigger_distance,
            throttle: Throttle::new(config.throttle()),
            session: None,
            dismissed: DismissMemory::default(),
            inserted: HashMap::new(),
            composing: None,
        }
    }

    pub fn session(&self) -> Option<&TriggerSession> {
        self.session.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.session.is_some()
    }

    /// Earliest instant at which `tick` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    /// Feed an input event through the throttle
    pub fn handle_input(&mut self, snapshot: InputSnapshot, now: Instant) -> Vec<TriggerTransition> {
        if snapshot.is_composing {
            // Wait for the composition to finish before reading the text
            self.composing = Some(snapshot);
            return Vec::new();
        }
        self.composing = None;

        match self.throttle.submit(snapshot, now) {
            Some(snapshot) => self.evaluate(snapshot),
            None => Vec::new(),
        }
    }

    /// IME composition committed; run detection on the final text
    pub fn end_composition(&mut self, now: Instant) -> Vec<TriggerTransition> {
        match self.composing.take() {
            Some(mut snapshot) => {
                snapshot.is_composing = false;
                self.handle_input(snapshot, now)
            }
            None => Vec::new(),
        }
    }

    /// Run the trailing detection pass when its window has closed
    pub fn tick(&mut self, now: Instant) -> Vec<TriggerTransition> {
        match self.throttle.poll(now) {
            Some(snapshot) => self.evaluate(snapshot),
            None => Vec::new(),
        }
    }

    /// Focus moved to `element`
    pub fn handle_focus(&mut self, element: ElementId) -> Option<TriggerTransition> {
        match &self.session {
            Some(session) if session.element != element => self.close(CloseReason::FocusChanged),
            _ => None,
        }
    }

    /// The element was removed from the document
    pub fn handle_element_removed(&mut self, element: ElementId) -> Option<TriggerTransition> {
        self.dismissed.forget(element);
        self.inserted.remove(&element);
        match &self.session {
            Some(session) if session.element == element => {
                self.close(CloseReason::ElementRemoved)
            }
            _ => None,
        }
    }

    /// End the active session
    pub fn close(&mut self, reason: CloseReason) -> Option<TriggerTransition> {
        let session = self.session.take()?;
        self.throttle.cancel();
        self.composing = None;
        if reason.is_manual() {
            self.dismissed.remember(session.element, session.trigger_offset);
        }
        info!(
            element = %session.element,
            trigger_offset = session.trigger_offset,
            reason = ?reason,
            "Trigger session closed"
        );
        Some(TriggerTransition::Closed {
            element: session.element,
            trigger_offset: session.trigger_offset,
            reason,
        })
    }

    /// Record a search outcome on the active session
    pub fn record_search_outcome(&mut self, has_match: bool) {
        if let Some(session) = self.session.as_mut() {
            if has_match {
                session.no_match_streak = 0;
            } else {
                session.no_match_streak += 1;
            }
        }
    }

    /// Remember text inserted by a commit so its slashes don't arm
    ///
    /// `content` is what now occupies `span`. Once the element's text no
    /// longer holds it there, the guard is dropped.
    pub fn mark_inserted(&mut self, element: ElementId, span: Range<usize>, content: &str) {
        self.inserted.insert(
            element,
            InsertedText {
                span,
                content: content.to_string(),
            },
        );
    }

    fn evaluate(&mut self, snapshot: InputSnapshot) -> Vec<TriggerTransition> {
        if !snapshot.surface.is_supported() {
            return Vec::new();
        }

        let mut transitions = Vec::new();
        if let Some(session) = &self.session {
            if session.element == snapshot.element {
                transitions.extend(self.update_armed(&snapshot));
                return transitions;
            }
            // Typing in another element implies focus moved
            transitions.extend(self.close(CloseReason::FocusChanged));
        }
        transitions.extend(self.try_arm(&snapshot));
        transitions
    }

    fn try_arm(&mut self, snapshot: &InputSnapshot) -> Option<TriggerTransition> {
        let chars: Vec<char> = snapshot.text.chars().collect();
        let cursor = snapshot.cursor.min(chars.len());

        let Some(slash) = last_slash(&chars, 0, cursor) else {
            // Every "/" is gone, so any later "/" counts as new
            self.dismissed.forget(snapshot.element);
            self.inserted.remove(&snapshot.element);
            return None;
        };

        if cursor - slash > self.max_distance {
            return None;
        }

        if self.dismissed.blocks(snapshot.element, slash) {
            debug!(element = %snapshot.element, offset = slash, "Slash was dismissed, not re-arming");
            return None;
        }
        self.dismissed.forget(snapshot.element);

        if let Some(inserted) = self.inserted.get(&snapshot.element) {
            if slash < inserted.span.end && inserted.is_intact(&chars) {
                debug!(element = %snapshot.element, offset = slash, "Slash precedes end of inserted prompt");
                return None;
            }
        }
        self.inserted.remove(&snapshot.element);

        let term: String = chars[slash + 1..cursor].iter().collect();
        let session = TriggerSession::new(snapshot, slash, term);
        info!(
            element = %session.element,
            trigger_offset = slash,
            surface = ?session.surface,
            "Trigger armed"
        );
        self.session = Some(session.clone());
        Some(TriggerTransition::Armed(session))
    }

    fn update_armed(&mut self, snapshot: &InputSnapshot) -> Option<TriggerTransition> {
        let chars: Vec<char> = snapshot.text.chars().collect();
        let cursor = snapshot.cursor.min(chars.len());
        let offset = self.session.as_ref()?.trigger_offset;

        if chars.get(offset) != Some(&'/') {
            return self.close(CloseReason::SlashDeleted);
        }
        if cursor <= offset {
            return self.close(CloseReason::CursorMoved);
        }
        if cursor - offset > self.max_distance {
            return self.close(CloseReason::TooFar);
        }

        // The latest "/" before the caret wins
        let anchor = last_slash(&chars, offset + 1, cursor).unwrap_or(offset);
        let term: String = chars[anchor + 1..cursor].iter().collect();

        let session = self.session.as_mut()?;
        if session.trigger_offset == anchor && session.search_term == term && session.cursor == cursor {
            return None;
        }
        if session.trigger_offset != anchor {
            debug!(from = session.trigger_offset, to = anchor, "Trigger re-anchored");
            session.no_match_streak = 0;
        }
        session.trigger_offset = anchor;
        session.search_term = term;
        session.cursor = cursor;
        Some(TriggerTransition::Updated(session.clone()))
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
