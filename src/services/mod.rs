pub mod columns;
pub mod debounce;
pub mod enrich;
pub mod filter_sort;
pub mod loader;
pub mod pivot;

pub use debounce::{BusyIndicator, Debouncer};
pub use filter_sort::QueryState;
pub use loader::{LoadError, LoadEvent, LoadTask};
pub use pivot::{Aggregator, PivotConfig, PivotTable, Renderer};
