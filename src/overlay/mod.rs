//! The transient result list shown next to the caret
//!
//! Rendering belongs to the host. This module owns the state a renderer
//! consumes (open flag, results, highlight, position) and the lifecycle of
//! the listeners an open overlay needs.

mod controller;
mod position;
mod scope;

pub use controller::{
    compose_commit, CommitResult, Direction, Key, KeyAction, OverlayController, OverlayView,
};
pub use position::{caret_anchor, compute_position, OverlayPosition, Placement, Viewport};
pub use scope::{ListenerHandle, ListenerKind, ListenerRegistry, ObserverScope};
