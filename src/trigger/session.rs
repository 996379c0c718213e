//! Trigger session state

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::surface::{char_len, ElementId, SurfaceKind};

/// What the detector sees of an element after an input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSnapshot {
    pub element: ElementId,
    pub surface: SurfaceKind,
    pub text: String,
    /// Char offset of the caret
    pub cursor: usize,
    /// True while an IME composition is in progress
    pub is_composing: bool,
}

/// A live "/" sequence in one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSession {
    pub element: ElementId,
    /// Classified once when the session arms
    pub surface: SurfaceKind,
    /// Char offset of the "/"
    pub trigger_offset: usize,
    /// Text between the "/" and the caret
    pub search_term: String,
    pub cursor: usize,
    /// Consecutive searches that produced nothing usable
    pub no_match_streak: u32,
}

impl TriggerSession {
    pub(crate) fn new(snapshot: &InputSnapshot, trigger_offset: usize, search_term: String) -> Self {
        Self {
            element: snapshot.element,
            surface: snapshot.surface,
            trigger_offset,
            search_term,
            cursor: snapshot.cursor,
            no_match_streak: 0,
        }
    }

    /// Char span replaced on commit: the "/" plus the term
    pub fn replaced_span(&self) -> Range<usize> {
        self.trigger_offset..self.trigger_offset + 1 + char_len(&self.search_term)
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// The "/" at the trigger offset is gone
    SlashDeleted,
    /// Caret moved to or before the trigger
    CursorMoved,
    /// Caret drifted too far from the trigger
    TooFar,
    FocusChanged,
    Escape,
    ClickOutside,
    /// ArrowLeft / ArrowRight while the overlay is open
    HorizontalArrow,
    /// Unproductive long term with no matches
    NoMatch,
    /// Explicit `dismiss()` from the UI
    Dismissed,
    Committed,
    ElementRemoved,
}

impl CloseReason {
    /// Manual closes block re-arming at the same offset
    pub fn is_manual(self) -> bool {
        matches!(
            self,
            CloseReason::Escape
                | CloseReason::ClickOutside
                | CloseReason::HorizontalArrow
                | CloseReason::NoMatch
                | CloseReason::Dismissed
        )
    }
}

/// Trigger offsets the user has dismissed, per element
#[derive(Debug, Clone, Default)]
pub struct DismissMemory {
    offsets: HashMap<ElementId, usize>,
}

impl DismissMemory {
    pub fn remember(&mut self, element: ElementId, offset: usize) {
        self.offsets.insert(element, offset);
    }

    /// True when a "/" at `offset` was dismissed and must not re-arm
    pub fn blocks(&self, element: ElementId, offset: usize) -> bool {
        self.offsets.get(&element) == Some(&offset)
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.offsets.contains_key(&element)
    }

    pub fn forget(&mut self, element: ElementId) {
        self.offsets.remove(&element);
    }
}
