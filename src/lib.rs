#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_match)]
#![allow(clippy::collapsible_else_if)]

pub mod config;
pub mod core;
pub mod errors;
pub mod logging;
pub mod services;
pub mod tui;

// Re-export commonly used types
pub use config::Config;
pub use crate::core::{DataSource, Dataset, Record, SortDirection, SortSpec, Value, ViewMode};
pub use services::{LoadError, PivotConfig, QueryState};
pub use tui::{Action, ActionCategory, App};
