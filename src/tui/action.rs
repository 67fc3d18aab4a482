use serde::{Deserialize, Serialize};
use std::fmt;

/// All possible actions in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Action {
    // Navigation
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PageUp,
    PageDown,
    Home,
    End,
    GoToTop,
    GoToBottom,

    // Filter / Sort
    FocusFilter,
    ClearFilter,
    SortColumn,

    // View
    ToggleView,
    ToggleHelp,

    // Pivot
    NextRowAttribute,
    NextColAttribute,
    StackRowAttribute,
    StackColAttribute,
    NextAggregator,
    NextValueField,
    NextRenderer,
    ResetPivot,

    // Application
    Quit,
    Confirm,
    Cancel,
}

impl Action {
    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Action::MoveUp => "Move cursor up",
            Action::MoveDown => "Move cursor down",
            Action::MoveLeft => "Move cursor left",
            Action::MoveRight => "Move cursor right",
            Action::PageUp => "Page up",
            Action::PageDown => "Page down",
            Action::Home => "Go to first column",
            Action::End => "Go to last column",
            Action::GoToTop => "Go to first row",
            Action::GoToBottom => "Go to last row",
            Action::FocusFilter => "Edit filter",
            Action::ClearFilter => "Clear filter",
            Action::SortColumn => "Sort by current column",
            Action::ToggleView => "Switch table/pivot view",
            Action::ToggleHelp => "Toggle help",
            Action::NextRowAttribute => "Cycle pivot row attribute",
            Action::NextColAttribute => "Cycle pivot column attribute",
            Action::StackRowAttribute => "Add another pivot row attribute",
            Action::StackColAttribute => "Add another pivot column attribute",
            Action::NextAggregator => "Cycle aggregator",
            Action::NextValueField => "Cycle aggregated field",
            Action::NextRenderer => "Cycle renderer",
            Action::ResetPivot => "Reset pivot",
            Action::Quit => "Quit application",
            Action::Confirm => "Confirm",
            Action::Cancel => "Cancel",
        }
    }

    /// Short label for the help line
    pub fn short_label(&self) -> &'static str {
        match self {
            Action::FocusFilter => "Filter",
            Action::ClearFilter => "Clear",
            Action::SortColumn => "Sort",
            Action::ToggleView => "Switch view",
            Action::ToggleHelp => "Help",
            Action::NextRowAttribute => "Rows",
            Action::NextColAttribute => "Cols",
            Action::StackRowAttribute => "+Row",
            Action::StackColAttribute => "+Col",
            Action::NextAggregator => "Aggregator",
            Action::NextValueField => "Value",
            Action::NextRenderer => "Renderer",
            Action::ResetPivot => "Reset",
            Action::Quit => "Quit",
            _ => self.description(),
        }
    }

    /// Get category for grouping in help screen
    pub fn category(&self) -> ActionCategory {
        match self {
            Action::MoveUp
            | Action::MoveDown
            | Action::MoveLeft
            | Action::MoveRight
            | Action::PageUp
            | Action::PageDown
            | Action::Home
            | Action::End
            | Action::GoToTop
            | Action::GoToBottom => ActionCategory::Navigation,

            Action::FocusFilter | Action::ClearFilter | Action::SortColumn => {
                ActionCategory::DataOps
            }

            Action::ToggleView | Action::ToggleHelp => ActionCategory::View,

            Action::NextRowAttribute
            | Action::NextColAttribute
            | Action::StackRowAttribute
            | Action::StackColAttribute
            | Action::NextAggregator
            | Action::NextValueField
            | Action::NextRenderer
            | Action::ResetPivot => ActionCategory::Pivot,

            Action::Quit | Action::Confirm | Action::Cancel => ActionCategory::Application,
        }
    }

    /// Get all possible actions (for validation)
    pub fn all() -> Vec<Action> {
        vec![
            Action::MoveUp,
            Action::MoveDown,
            Action::MoveLeft,
            Action::MoveRight,
            Action::PageUp,
            Action::PageDown,
            Action::Home,
            Action::End,
            Action::GoToTop,
            Action::GoToBottom,
            Action::FocusFilter,
            Action::ClearFilter,
            Action::SortColumn,
            Action::ToggleView,
            Action::ToggleHelp,
            Action::NextRowAttribute,
            Action::NextColAttribute,
            Action::StackRowAttribute,
            Action::StackColAttribute,
            Action::NextAggregator,
            Action::NextValueField,
            Action::NextRenderer,
            Action::ResetPivot,
            Action::Quit,
            Action::Confirm,
            Action::Cancel,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Navigation,
    DataOps,
    View,
    Pivot,
    Application,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCategory::Navigation => write!(f, "Navigation"),
            ActionCategory::DataOps => write!(f, "Filter & Sort"),
            ActionCategory::View => write!(f, "View"),
            ActionCategory::Pivot => write!(f, "Pivot"),
            ActionCategory::Application => write!(f, "Application"),
        }
    }
}
