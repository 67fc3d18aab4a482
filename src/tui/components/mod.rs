pub mod data_grid;
pub mod filter_bar;
pub mod overlay;
pub mod pivot_view;

pub use data_grid::DataGrid;
pub use filter_bar::FilterBar;
pub use overlay::{centered_rect, LoadingOverlay};
pub use pivot_view::PivotView;
