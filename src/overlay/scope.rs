//! Listener bookkeeping for an open overlay
//!
//! While the overlay is visible the host must route a few extra notifications
//! to the engine: document-level key presses (captured before the page sees
//! them), clicks anywhere on the page, and removal of the anchored element.
//! The [`ListenerRegistry`] is the shared record of what is currently
//! attached; an [`ObserverScope`] owns one overlay's registrations and
//! releases each of them exactly once.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::surface::ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerKind {
    /// Document keydown, capture phase
    KeyDown,
    /// Document mousedown, for click-outside detection
    MouseDown,
    /// Subtree observer watching for the anchored element's removal
    ElementRemoval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerHandle(u64);

#[derive(Debug, Default)]
struct RegistryState {
    next_handle: u64,
    active: BTreeMap<ListenerHandle, (ElementId, ListenerKind)>,
    /// Removals of handles that were not attached
    stray_removals: u64,
}

/// Shared table of attached listeners
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, element: ElementId, kind: ListenerKind) -> ListenerHandle {
        let mut state = self.inner.lock();
        state.next_handle += 1;
        let handle = ListenerHandle(state.next_handle);
        state.active.insert(handle, (element, kind));
        handle
    }

    /// Detach a listener; false when it was not attached
    pub fn remove(&self, handle: ListenerHandle) -> bool {
        let mut state = self.inner.lock();
        if state.active.remove(&handle).is_some() {
            true
        } else {
            state.stray_removals += 1;
            warn!(handle = handle.0, "Listener removed twice");
            false
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    pub fn is_listening(&self, kind: ListenerKind) -> bool {
        self.inner.lock().active.values().any(|(_, k)| *k == kind)
    }

    /// Kinds attached on behalf of `element`
    pub fn active_for(&self, element: ElementId) -> Vec<ListenerKind> {
        self.inner
            .lock()
            .active
            .values()
            .filter(|(id, _)| *id == element)
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub fn stray_removals(&self) -> u64 {
        self.inner.lock().stray_removals
    }
}

/// The listeners one overlay instance holds
#[derive(Debug)]
pub struct ObserverScope {
    registry: ListenerRegistry,
    element: ElementId,
    handles: Vec<ListenerHandle>,
}

impl ObserverScope {
    pub fn acquire(registry: &ListenerRegistry, element: ElementId) -> Self {
        let handles = [
            ListenerKind::KeyDown,
            ListenerKind::MouseDown,
            ListenerKind::ElementRemoval,
        ]
        .into_iter()
        .map(|kind| registry.add(element, kind))
        .collect();
        debug!(%element, "Overlay listeners attached");
        Self {
            registry: registry.clone(),
            element,
            handles,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn is_released(&self) -> bool {
        self.handles.is_empty()
    }

    /// Detach everything; later calls do nothing
    pub fn release(&mut self) -> bool {
        if self.handles.is_empty() {
            return false;
        }
        for handle in self.handles.drain(..) {
            self.registry.remove(handle);
        }
        debug!(element = %self.element, "Overlay listeners released");
        true
    }
}

impl Drop for ObserverScope {
    fn drop(&mut self) {
        self.release();
    }
}
