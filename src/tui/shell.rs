//! Top-level view state: loading, one of the two views, or a short settle
//! period while switching between them.

use crate::core::ViewMode;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Loading,
    Grid,
    Pivot,
    Transitioning { target: ViewMode, until: Instant },
}

#[derive(Debug, Clone)]
pub struct ViewShell {
    state: ShellState,
    settle_delay: Duration,
}

impl Default for ViewShell {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl ViewShell {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            state: ShellState::Loading,
            settle_delay,
        }
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == ShellState::Loading
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, ShellState::Transitioning { .. })
    }

    /// Back to the loading state, e.g. when a new source is requested
    pub fn reset(&mut self) {
        self.state = ShellState::Loading;
    }

    /// Records arrived; the grid is shown first
    pub fn loaded(&mut self) {
        if self.is_loading() {
            self.state = ShellState::Grid;
        }
    }

    /// The load failed; show the grid over an empty data set
    pub fn load_failed(&mut self) {
        if self.is_loading() {
            self.state = ShellState::Grid;
        }
    }

    /// Start switching to the other view
    ///
    /// Ignored while loading or already transitioning. Returns whether a
    /// transition started.
    pub fn toggle(&mut self, now: Instant) -> bool {
        let from = match self.state {
            ShellState::Grid => ViewMode::Grid,
            ShellState::Pivot => ViewMode::Pivot,
            _ => return false,
        };
        let target = from.other();
        debug!("Switching from {} to {}", from, target);
        self.state = ShellState::Transitioning {
            target,
            until: now + self.settle_delay,
        };
        true
    }

    /// Finish a due transition; returns the view that became active
    pub fn tick(&mut self, now: Instant) -> Option<ViewMode> {
        match self.state {
            ShellState::Transitioning { target, until } if now >= until => {
                self.state = match target {
                    ViewMode::Grid => ShellState::Grid,
                    ViewMode::Pivot => ShellState::Pivot,
                };
                Some(target)
            }
            _ => None,
        }
    }

    pub fn shows_content(&self) -> bool {
        self.active_view().is_some()
    }

    pub fn active_view(&self) -> Option<ViewMode> {
        match self.state {
            ShellState::Grid => Some(ViewMode::Grid),
            ShellState::Pivot => Some(ViewMode::Pivot),
            _ => None,
        }
    }

    /// View being switched to, if a transition is running
    pub fn pending_view(&self) -> Option<ViewMode> {
        match self.state {
            ShellState::Transitioning { target, .. } => Some(target),
            _ => None,
        }
    }
}
