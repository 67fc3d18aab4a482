//! Per-instance debounce and busy-indicator timers.
//!
//! Both are driven by explicit `Instant`s from the caller's tick so the
//! timing never leaks into the data transformations.

use std::time::{Duration, Instant};

/// Coalesces a burst of values, releasing the latest one after a quiet window
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace any pending value and restart the quiet window
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    /// Release the pending value once its window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Release the pending value immediately
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Drop the pending value; returns whether anything was pending
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }
}

/// A "recompute in progress" flag that stays up for a minimum time
#[derive(Debug, Clone)]
pub struct BusyIndicator {
    min_visible: Duration,
    shown_since: Option<Instant>,
}

impl BusyIndicator {
    pub fn new(min_visible: Duration) -> Self {
        Self {
            min_visible,
            shown_since: None,
        }
    }

    /// Show the indicator; an already visible indicator keeps its start time
    pub fn raise(&mut self, now: Instant) {
        self.shown_since.get_or_insert(now);
    }

    /// Hide the indicator if it has been visible long enough
    pub fn try_clear(&mut self, now: Instant) -> bool {
        match self.shown_since {
            Some(since) if now.saturating_duration_since(since) >= self.min_visible => {
                self.shown_since = None;
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    pub fn clear(&mut self) {
        self.shown_since = None;
    }

    pub fn is_active(&self) -> bool {
        self.shown_since.is_some()
    }
}
