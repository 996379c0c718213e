//! The shortcut engine: one instance per document
//!
//! Wires the trigger detector, search coordinator, closing heuristic, and
//! overlay controller together behind the entry points a host calls from its
//! event listeners. The engine is sans-IO: every timed entry point takes the
//! current `Instant`, and searches are queued as tickets that the host either
//! runs synchronously with [`ShortcutEngine::run_pending_searches`] or hands
//! to its own transport and settles later with
//! [`ShortcutEngine::resolve_search`].
//!
//! State changes are published to subscribers as [`ShortcutEvent`]s.

use std::sync::Arc;
use std::time::Instant;

use async_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, ShortcutConfig};
use crate::error::{ResultExt, StoreError};
use crate::overlay::{
    CommitResult, Direction, Key, KeyAction, ListenerRegistry, OverlayController, OverlayPosition,
    OverlayView, Viewport,
};
use crate::prompt::{now_millis, PromptRecord};
use crate::search::{SearchCoordinator, SearchOutcome, SearchTicket};
use crate::store::{PromptStore, StorageMode};
use crate::surface::{char_len, char_slice, ElementId, GenericAdapter, HostElement, SurfaceKind};
use crate::trigger::{
    ClosingHeuristic, CloseReason, InputSnapshot, TriggerDetector, TriggerSession,
    TriggerTransition,
};

/// Queue depth per subscriber
const EVENT_CAPACITY: usize = 256;

/// Session state published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShortcutEvent {
    Opened {
        element: ElementId,
        #[serde(rename = "triggerOffset")]
        trigger_offset: usize,
        #[serde(default)]
        position: Option<OverlayPosition>,
    },
    /// A search for `term` was issued
    Loading { generation: u64, term: String },
    Results {
        generation: u64,
        term: String,
        results: Vec<PromptRecord>,
        #[serde(default)]
        error: Option<String>,
    },
    ActiveIndex { index: usize },
    Committed {
        #[serde(rename = "promptId")]
        prompt_id: String,
        element: ElementId,
        cursor: usize,
    },
    Closed {
        element: ElementId,
        reason: CloseReason,
    },
}

pub struct ShortcutEngine {
    detector: TriggerDetector,
    coordinator: SearchCoordinator,
    heuristic: ClosingHeuristic,
    overlay: OverlayController,
    adapter: GenericAdapter,
    store: Arc<dyn PromptStore>,
    viewport: Viewport,
    pending: Vec<SearchTicket>,
    subscribers: Vec<Sender<ShortcutEvent>>,
}

impl std::fmt::Debug for ShortcutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcutEngine")
            .field("session", &self.detector.session())
            .field("overlay_open", &self.overlay.is_open())
            .field("pending", &self.pending.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl ShortcutEngine {
    pub fn new(config: &Config, store: Arc<dyn PromptStore>) -> Self {
        let shortcut = config.get_shortcut();
        let mode = if config.get_storage().offline {
            StorageMode::Offline
        } else {
            StorageMode::Connected
        };
        let mut engine = Self::with_parts(
            &shortcut,
            mode,
            OverlayController::new(config.get_overlay(), ListenerRegistry::new()),
            store,
        );
        if mode == StorageMode::Offline {
            engine.refresh_snapshot().log_err();
        }
        engine
    }

    fn with_parts(
        shortcut: &ShortcutConfig,
        mode: StorageMode,
        overlay: OverlayController,
        store: Arc<dyn PromptStore>,
    ) -> Self {
        Self {
            detector: TriggerDetector::new(shortcut),
            coordinator: SearchCoordinator::new(shortcut.result_limit, mode),
            heuristic: ClosingHeuristic::new(shortcut),
            overlay,
            adapter: GenericAdapter::new(),
            store,
            viewport: Viewport::default(),
            pending: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session(&self) -> Option<&TriggerSession> {
        self.detector.session()
    }

    pub fn is_open(&self) -> bool {
        self.overlay.is_open()
    }

    pub fn view(&self) -> OverlayView {
        self.overlay.view()
    }

    pub fn registry(&self) -> &ListenerRegistry {
        self.overlay.registry()
    }

    pub fn store(&self) -> &Arc<dyn PromptStore> {
        &self.store
    }

    pub fn latest_outcome(&self) -> Option<&SearchOutcome> {
        self.coordinator.latest()
    }

    /// Earliest instant at which [`ShortcutEngine::tick`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.detector.next_deadline(), self.heuristic.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn set_storage_mode(&mut self, mode: StorageMode) {
        info!(?mode, "Storage mode changed");
        self.coordinator.set_mode(mode);
    }

    /// Reload the offline search snapshot from the store
    pub fn refresh_snapshot(&mut self) -> Result<(), StoreError> {
        self.coordinator.refresh_snapshot(self.store.as_ref())
    }

    /// Receive every event published from now on
    pub fn subscribe(&mut self) -> Receiver<ShortcutEvent> {
        let (tx, rx) = async_channel::bounded(EVENT_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: ShortcutEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber queue full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Subscriber dropped");
                false
            }
        });
    }

    // ------------------------------------------------------------------
    // Host events
    // ------------------------------------------------------------------

    /// An `input` event fired on `element`
    pub fn handle_input(&mut self, element: &dyn HostElement, is_composing: bool, now: Instant) {
        let snapshot = self.snapshot(element, is_composing);
        let transitions = self.detector.handle_input(snapshot, now);
        self.apply(transitions, Some(element));
    }

    /// `compositionend` fired; `element` holds the committed text
    pub fn end_composition(&mut self, element: &dyn HostElement, now: Instant) {
        let transitions = self.detector.end_composition(now);
        self.apply(transitions, Some(element));
    }

    /// Focus moved to `element`
    pub fn handle_focus(&mut self, element: ElementId) {
        if let Some(transition) = self.detector.handle_focus(element) {
            self.apply(vec![transition], None);
        }
    }

    /// A key went down while `element` had focus
    ///
    /// The host calls `preventDefault` when the returned action
    /// [consumes the event](KeyAction::consumes_event).
    pub fn handle_key(&mut self, key: Key, element: &mut dyn HostElement) -> KeyAction {
        let action = self.overlay.handle_key(key);
        match action {
            KeyAction::Ignored => {}
            KeyAction::Navigated(index) => self.emit(ShortcutEvent::ActiveIndex { index }),
            KeyAction::Commit(index) => {
                self.select_result(index, element);
            }
            KeyAction::Close(reason) => self.close(reason),
        }
        action
    }

    /// A mouse press landed outside the overlay and the element
    pub fn handle_click_outside(&mut self) {
        if self.overlay.is_open() {
            self.close(CloseReason::ClickOutside);
        }
    }

    /// `element` left the document
    pub fn handle_element_removed(&mut self, element: ElementId) {
        if let Some(transition) = self.detector.handle_element_removed(element) {
            self.apply(vec![transition], None);
        } else if self.overlay.element() == Some(element) {
            // Overlay outlived its session; should not happen but never leak listeners
            self.overlay.teardown();
        }
    }

    /// Run timers: the trailing throttle pass and the closing heuristic
    ///
    /// `element` is the element that last received input, used to position
    /// an overlay the trailing pass opens.
    pub fn tick(&mut self, element: Option<&dyn HostElement>, now: Instant) {
        let transitions = self.detector.tick(now);
        self.apply(transitions, element);

        let close = match self.detector.session() {
            Some(session) => {
                self.heuristic
                    .poll(now, &session.search_term, self.coordinator.latest())
            }
            None => {
                self.heuristic.cancel();
                false
            }
        };
        if close {
            info!("Closing unproductive trigger session");
            self.close(CloseReason::NoMatch);
        }
    }

    // ------------------------------------------------------------------
    // Searches
    // ------------------------------------------------------------------

    /// Tickets issued but not yet resolved, oldest first
    pub fn pending_searches(&self) -> &[SearchTicket] {
        &self.pending
    }

    /// Hand the queued tickets to an asynchronous transport
    pub fn take_pending_searches(&mut self) -> Vec<SearchTicket> {
        std::mem::take(&mut self.pending)
    }

    /// Execute every queued ticket against the store and apply the results
    pub fn run_pending_searches(&mut self, now: Instant) {
        let now_ms = now_millis();
        for ticket in self.take_pending_searches() {
            let result = self
                .coordinator
                .execute(self.store.as_ref(), &ticket, now_ms);
            self.resolve_search(ticket, result, now);
        }
    }

    /// Apply a search response; false when it was superseded
    pub fn resolve_search(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<PromptRecord>, StoreError>,
        now: Instant,
    ) -> bool {
        let Some(outcome) = self.coordinator.resolve(ticket, result).cloned() else {
            return false;
        };
        let Some(term) = self.detector.session().map(|s| s.search_term.clone()) else {
            return false;
        };

        self.detector.record_search_outcome(!outcome.is_empty());
        self.overlay.show_outcome(&outcome);
        self.heuristic.observe(&term, &outcome, now);
        debug!(
            generation = outcome.generation,
            results = outcome.results.len(),
            confidence = ?outcome.confidence,
            "Search resolved"
        );
        self.emit(ShortcutEvent::Results {
            generation: outcome.generation,
            term: outcome.term,
            results: outcome.results,
            error: outcome.error,
        });
        true
    }

    // ------------------------------------------------------------------
    // Commands from the overlay UI
    // ------------------------------------------------------------------

    /// Insert result `index` into `element` and close
    ///
    /// An out-of-range index does nothing. A commit the page no longer
    /// allows (the "/" moved or the element is gone) closes the session
    /// without touching the text.
    pub fn select_result(
        &mut self,
        index: usize,
        element: &mut dyn HostElement,
    ) -> Option<CommitResult> {
        let session = self.detector.session()?.clone();
        if index >= self.overlay.results().len() {
            debug!(index, "Ignoring selection outside the result list");
            return None;
        }
        let Some(adapter) = self.adapter.for_kind(session.surface) else {
            self.close(CloseReason::Dismissed);
            return None;
        };

        let committed =
            self.overlay
                .commit(index, &session, element, adapter, self.store.as_ref());
        match committed {
            Some(result) => {
                self.emit(ShortcutEvent::Committed {
                    prompt_id: result.prompt_id.clone(),
                    element: result.element,
                    cursor: result.cursor,
                });
                self.close(CloseReason::Committed);
                let content = char_slice(
                    &result.new_text,
                    result.inserted.start,
                    result.inserted.end,
                );
                self.detector
                    .mark_inserted(result.element, result.inserted.clone(), content);
                Some(result)
            }
            None => {
                let reason = if element.is_connected() {
                    CloseReason::SlashDeleted
                } else {
                    CloseReason::ElementRemoved
                };
                self.close(reason);
                None
            }
        }
    }

    /// Close the overlay; calling it again is a no-op
    pub fn dismiss(&mut self) {
        self.close(CloseReason::Dismissed);
    }

    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        let index = self.overlay.navigate(direction)?;
        self.emit(ShortcutEvent::ActiveIndex { index });
        Some(index)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn snapshot(&self, element: &dyn HostElement, is_composing: bool) -> InputSnapshot {
        let surface = SurfaceKind::classify(element);
        let (text, cursor) = match self.adapter.for_kind(surface) {
            Some(adapter) => {
                let text = adapter.get_text(element);
                let cursor = adapter
                    .cursor_offset(element)
                    .unwrap_or_else(|| char_len(&text));
                (text, cursor)
            }
            None => (String::new(), 0),
        };
        InputSnapshot {
            element: element.id(),
            surface,
            text,
            cursor,
            is_composing,
        }
    }

    fn close(&mut self, reason: CloseReason) {
        match self.detector.close(reason) {
            Some(transition) => self.apply(vec![transition], None),
            None => {
                // No session, but make sure nothing stays registered
                self.overlay.teardown();
            }
        }
    }

    fn apply(&mut self, transitions: Vec<TriggerTransition>, element: Option<&dyn HostElement>) {
        for transition in transitions {
            match transition {
                TriggerTransition::Armed(session) => {
                    let position = match element.filter(|e| e.id() == session.element) {
                        Some(host) => {
                            self.overlay.open(host, session.surface, self.viewport);
                            self.overlay.position()
                        }
                        None => {
                            warn!(element = %session.element, "Armed without its element, closing");
                            self.close(CloseReason::FocusChanged);
                            continue;
                        }
                    };
                    self.emit(ShortcutEvent::Opened {
                        element: session.element,
                        trigger_offset: session.trigger_offset,
                        position,
                    });
                    self.issue_search(&session);
                }
                TriggerTransition::Updated(session) => {
                    if let Some(host) = element.filter(|e| e.id() == session.element) {
                        self.overlay.reposition(host, session.surface, self.viewport);
                    }
                    self.issue_search(&session);
                }
                TriggerTransition::Closed {
                    element, reason, ..
                } => {
                    self.overlay.teardown();
                    self.coordinator.reset();
                    self.heuristic.cancel();
                    self.pending.clear();
                    self.emit(ShortcutEvent::Closed { element, reason });
                }
            }
        }
    }

    fn issue_search(&mut self, session: &TriggerSession) {
        let ticket = self.coordinator.begin(&session.search_term);
        self.overlay.show_loading();
        self.emit(ShortcutEvent::Loading {
            generation: ticket.generation,
            term: ticket.term.clone(),
        });
        self.pending.push(ticket);
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
