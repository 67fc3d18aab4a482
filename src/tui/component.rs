use crate::tui::action::Action;
use color_eyre::Result;
use ratatui::{layout::Rect, Frame};
use std::time::Instant;

/// Base trait for the viewer's interactive panes
pub trait Component {
    /// Handle an action
    ///
    /// Returns Ok(true) if the action was handled and consumed.
    /// Returns Ok(false) if the action was not handled and should propagate.
    fn handle_action(&mut self, action: Action, now: Instant) -> Result<bool>;

    /// Render the component within the given area
    fn render(&mut self, frame: &mut Frame, area: Rect);

    /// Actions this component reacts to, for the help line
    fn supported_actions(&self) -> &[Action];

    /// Get component name for debugging/logging
    fn name(&self) -> &str;

    /// Advance timers (called on every tick)
    fn update(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    /// Whether a debounced recompute is in flight
    fn is_busy(&self) -> bool {
        false
    }

    /// Release pending timers before the component is dropped
    fn teardown(&mut self) {}
}

/// Components that can receive keyboard focus
pub trait Focusable: Component {
    fn is_focused(&self) -> bool;

    fn set_focused(&mut self, focused: bool);
}
