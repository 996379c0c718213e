//! Trailing-edge throttle driven by explicit timestamps
//!
//! The first value in an idle window runs immediately. Values submitted while
//! the window is open replace each other; the last one is released by
//! [`Throttle::poll`] once the window closes, and that release opens a new
//! window of its own.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Throttle<T> {
    window: Duration,
    window_start: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            pending: None,
        }
    }

    fn window_open(&self, now: Instant) -> bool {
        self.window_start
            .is_some_and(|start| now.saturating_duration_since(start) < self.window)
    }

    /// Returns the value back if it should run right now
    pub fn submit(&mut self, value: T, now: Instant) -> Option<T> {
        if self.window_open(now) {
            self.pending = Some(value);
            return None;
        }
        // A stale pending value from a window nobody polled is superseded
        self.pending = None;
        self.window_start = Some(now);
        Some(value)
    }

    /// Release the trailing value once its window has closed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_none() || self.window_open(now) {
            return None;
        }
        self.window_start = Some(now);
        self.pending.take()
    }

    /// When the pending value becomes due
    pub fn deadline(&self) -> Option<Instant> {
        match (&self.pending, self.window_start) {
            (Some(_), Some(start)) => Some(start + self.window),
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending value and reset the window
    pub fn cancel(&mut self) {
        self.pending = None;
        self.window_start = None;
    }
}
