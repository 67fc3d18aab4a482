use crate::core::{ColumnDescriptor, Dataset, Record, SortSpec};
use crate::services::filter_sort::visible_indices;
use crate::services::QueryState;
use crate::tui::components::FilterBar;
use crate::tui::{Action, Component, Focusable, Theme};
use color_eyre::Result;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Width used for columns without a fixed width
const AUTO_MIN_WIDTH: u16 = 10;
const AUTO_MAX_WIDTH: u16 = 30;

/// Position in the grid (row, column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

/// Viewport into the visible rows
#[derive(Debug, Clone)]
pub struct Viewport {
    pub top: usize,    // First visible row
    pub left: usize,   // First visible column
    pub height: usize, // Visible rows
    pub width: usize,  // Visible columns
}

/// Filterable, sortable grid over the loaded records
pub struct DataGrid {
    dataset: Arc<Dataset>,
    columns: Vec<ColumnDescriptor>,
    query: QueryState,
    visible: Vec<usize>,
    visible_revision: Option<u64>,
    cursor: Position,
    viewport: Viewport,
    focused: bool,
    editing_filter: bool,
    spinner_frame: usize,
    theme: Theme,
    supported_actions: Vec<Action>,
}

impl DataGrid {
    pub fn new(
        dataset: Arc<Dataset>,
        columns: Vec<ColumnDescriptor>,
        query: QueryState,
        theme: Theme,
    ) -> Self {
        let mut grid = Self {
            dataset,
            columns,
            query,
            visible: Vec::new(),
            visible_revision: None,
            cursor: Position::default(),
            viewport: Viewport {
                top: 0,
                left: 0,
                height: 20, // Will be updated based on terminal size
                width: 1,
            },
            focused: false,
            editing_filter: false,
            spinner_frame: 0,
            theme,
            supported_actions: vec![
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
                Action::Confirm,
                Action::Cancel,
            ],
        };
        grid.refresh();
        grid
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Rows currently shown, in display order
    pub fn visible_rows(&self) -> impl Iterator<Item = &Record> {
        let records = self.dataset.records();
        self.visible.iter().map(move |&i| &records[i])
    }

    pub fn is_editing_filter(&self) -> bool {
        self.editing_filter
    }

    pub fn focus_filter(&mut self) {
        self.editing_filter = true;
    }

    /// Leave the filter input; the pending filter still applies on its own
    pub fn blur_filter(&mut self) {
        self.editing_filter = false;
    }

    pub fn type_char(&mut self, c: char, now: Instant) -> bool {
        let accepted = self.query.push_char(c, now);
        self.refresh();
        accepted
    }

    pub fn backspace(&mut self, now: Instant) -> bool {
        let accepted = self.query.pop_char(now);
        self.refresh();
        accepted
    }

    pub fn set_filter(&mut self, text: &str, now: Instant) -> bool {
        let accepted = self.query.set_filter(text, now);
        self.refresh();
        accepted
    }

    pub fn clear_filter(&mut self, now: Instant) {
        self.query.clear_filter(now);
        self.refresh();
    }

    /// Apply the typed filter without waiting for the debounce
    pub fn commit_filter(&mut self) {
        self.query.flush();
        self.refresh();
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.query.set_sort(sort);
        self.refresh();
    }

    /// Sort by the column under the cursor
    pub fn sort_current_column(&mut self) {
        if let Some(column) = self.columns.get(self.cursor.col) {
            let field = column.field.clone();
            self.query.toggle_sort(&field);
            debug!("Sorting by {}", field);
            self.refresh();
        }
    }

    /// Recompute visible rows when the query changed since the last pass
    fn refresh(&mut self) {
        let revision = self.query.revision();
        if self.visible_revision == Some(revision) {
            return;
        }
        self.visible = visible_indices(
            self.dataset.records(),
            self.query.applied_filter(),
            self.query.sort(),
        );
        self.visible_revision = Some(revision);
        self.clamp_cursor();
    }

    fn clamp_cursor(&mut self) {
        self.cursor.row = self.cursor.row.min(self.visible.len().saturating_sub(1));
        self.cursor.col = self.cursor.col.min(self.columns.len().saturating_sub(1));
        self.ensure_cursor_visible();
    }

    fn column_width(&self, col: usize) -> u16 {
        let column = &self.columns[col];
        column.width.unwrap_or_else(|| {
            (column.label.chars().count() as u16 + 2).clamp(AUTO_MIN_WIDTH, AUTO_MAX_WIDTH)
        })
    }

    /// Update viewport based on terminal area
    fn update_viewport(&mut self, area: Rect) {
        // Account for borders and header
        self.viewport.height = (area.height.saturating_sub(3) as usize).max(1);

        let available = area.width.saturating_sub(2);
        if self.cursor.col < self.viewport.left {
            self.viewport.left = self.cursor.col;
        }
        loop {
            self.viewport.width = self.fitting_columns(self.viewport.left, available);
            if self.cursor.col < self.viewport.left + self.viewport.width
                || self.viewport.left >= self.cursor.col
            {
                break;
            }
            self.viewport.left += 1;
        }
        self.ensure_cursor_visible();
    }

    /// Number of columns starting at `left` that fit in `available` cells
    fn fitting_columns(&self, left: usize, available: u16) -> usize {
        let mut used: u16 = 0;
        let mut count = 0;
        for col in left..self.columns.len() {
            let width = self.column_width(col).saturating_add(1);
            if count > 0 && used.saturating_add(width) > available {
                break;
            }
            used = used.saturating_add(width);
            count += 1;
        }
        count.max(1)
    }

    /// Ensure cursor is within viewport
    fn ensure_cursor_visible(&mut self) {
        if self.cursor.row < self.viewport.top {
            self.viewport.top = self.cursor.row;
        } else if self.cursor.row >= self.viewport.top + self.viewport.height {
            self.viewport.top = self.cursor.row.saturating_sub(self.viewport.height - 1);
        }

        if self.cursor.col < self.viewport.left {
            self.viewport.left = self.cursor.col;
        } else if self.cursor.col >= self.viewport.left + self.viewport.width {
            self.viewport.left = self.cursor.col.saturating_sub(self.viewport.width - 1);
        }
    }

    fn move_up(&mut self) {
        if self.cursor.row > 0 {
            self.cursor.row -= 1;
            self.ensure_cursor_visible();
        }
    }

    fn move_down(&mut self) {
        if self.cursor.row + 1 < self.visible.len() {
            self.cursor.row += 1;
            self.ensure_cursor_visible();
        }
    }

    fn move_left(&mut self) {
        if self.cursor.col > 0 {
            self.cursor.col -= 1;
            self.ensure_cursor_visible();
        }
    }

    fn move_right(&mut self) {
        if self.cursor.col + 1 < self.columns.len() {
            self.cursor.col += 1;
            self.ensure_cursor_visible();
        }
    }

    fn page_up(&mut self) {
        self.cursor.row = self.cursor.row.saturating_sub(self.viewport.height);
        self.ensure_cursor_visible();
    }

    fn page_down(&mut self) {
        if !self.visible.is_empty() {
            self.cursor.row = (self.cursor.row + self.viewport.height).min(self.visible.len() - 1);
            self.ensure_cursor_visible();
        }
    }

    fn go_to_top(&mut self) {
        self.cursor.row = 0;
        self.ensure_cursor_visible();
    }

    fn go_to_bottom(&mut self) {
        self.cursor.row = self.visible.len().saturating_sub(1);
        self.ensure_cursor_visible();
    }

    fn go_home(&mut self) {
        self.cursor.col = 0;
        self.ensure_cursor_visible();
    }

    fn go_end(&mut self) {
        self.cursor.col = self.columns.len().saturating_sub(1);
        self.ensure_cursor_visible();
    }

    fn header_row(&self, range: std::ops::Range<usize>) -> Row<'static> {
        let sort = self.query.sort();
        let cells: Vec<Cell> = range
            .map(|col| {
                let column = &self.columns[col];
                let mut label = column.label.clone();
                if sort.key.as_deref() == Some(column.field.as_str()) {
                    label.push(' ');
                    label.push_str(sort.direction.arrow());
                }
                let style = if col == self.cursor.col {
                    self.theme.header_style().add_modifier(Modifier::UNDERLINED)
                } else {
                    self.theme.header_style()
                };
                Cell::from(label).style(style)
            })
            .collect();
        Row::new(cells)
    }

    fn title(&self) -> String {
        let row = if self.visible.is_empty() {
            0
        } else {
            self.cursor.row + 1
        };
        let mut title = format!(" Table View [{}/{}]", row, self.visible.len());
        if self.visible.len() != self.dataset.len() {
            title.push_str(&format!(" of {}", self.dataset.len()));
        }
        title.push(' ');
        title
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect) {
        self.update_viewport(area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .title_style(self.theme.title_style())
            .border_style(if self.focused && !self.editing_filter {
                self.theme.focused_border_style()
            } else {
                self.theme.border_style()
            });

        if self.columns.is_empty() || self.visible.is_empty() {
            let message = if self.dataset.is_empty() {
                "No records loaded"
            } else {
                "No rows match the filter"
            };
            frame.render_widget(
                Paragraph::new(message)
                    .style(self.theme.muted_style())
                    .block(block),
                area,
            );
            return;
        }

        let left = self.viewport.left;
        let right = (left + self.viewport.width).min(self.columns.len());
        let header = self.header_row(left..right);

        let records = self.dataset.records();
        let end = (self.viewport.top + self.viewport.height).min(self.visible.len());
        let rows: Vec<Row> = (self.viewport.top..end)
            .enumerate()
            .map(|(offset, index)| {
                let record = &records[self.visible[index]];
                let cells: Vec<Cell> = self.columns[left..right]
                    .iter()
                    .map(|column| {
                        Cell::from(
                            record
                                .get(&column.field)
                                .map(|v| v.to_string())
                                .unwrap_or_default(),
                        )
                    })
                    .collect();

                // Highlight selected row
                let style = if index == self.cursor.row {
                    self.theme.selected_style()
                } else if offset % 2 == 1 {
                    self.theme.alt_row_style()
                } else {
                    self.theme.normal_style()
                };
                Row::new(cells).style(style)
            })
            .collect();

        let widths: Vec<Constraint> = (left..right)
            .map(|col| Constraint::Length(self.column_width(col)))
            .collect();

        let table = Table::new(rows, widths).header(header).block(block);
        frame.render_widget(table, area);
    }
}

impl Component for DataGrid {
    fn handle_action(&mut self, action: Action, now: Instant) -> Result<bool> {
        if self.editing_filter {
            match action {
                Action::Confirm => {
                    self.commit_filter();
                    self.blur_filter();
                    return Ok(true);
                }
                Action::Cancel => {
                    self.blur_filter();
                    return Ok(true);
                }
                _ => {}
            }
        }

        match action {
            Action::MoveUp => self.move_up(),
            Action::MoveDown => self.move_down(),
            Action::MoveLeft => self.move_left(),
            Action::MoveRight => self.move_right(),
            Action::PageUp => self.page_up(),
            Action::PageDown => self.page_down(),
            Action::GoToTop => self.go_to_top(),
            Action::GoToBottom => self.go_to_bottom(),
            Action::Home => self.go_home(),
            Action::End => self.go_end(),
            Action::FocusFilter => self.focus_filter(),
            Action::ClearFilter => self.clear_filter(now),
            Action::SortColumn => self.sort_current_column(),
            // Other actions not handled
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let busy = self.query.is_busy() || self.query.is_pending();
        if busy {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }
        let bar = FilterBar::new(self.query.filter(), &self.theme)
            .focused(self.focused && self.editing_filter)
            .busy(busy, self.spinner_frame);
        frame.render_widget(bar, chunks[0]);

        self.render_table(frame, chunks[1]);
    }

    fn supported_actions(&self) -> &[Action] {
        &self.supported_actions
    }

    fn name(&self) -> &str {
        "DataGrid"
    }

    fn update(&mut self, now: Instant) -> Result<()> {
        self.query.tick(now);
        self.refresh();
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.query.is_busy() || self.query.is_pending()
    }

    fn teardown(&mut self) {
        self.query.cancel();
    }
}

impl Focusable for DataGrid {
    fn is_focused(&self) -> bool {
        self.focused
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SortDirection;
    use crate::services::columns::derive_columns;
    use crate::services::loader::parse_csv;
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};
    use std::collections::HashMap;
    use std::time::Duration;

    fn create_test_grid() -> DataGrid {
        let dataset = parse_csv(
            "id,created_dt,legal_name,amount\n\
             1,2024-03-01,Acme Freight,5\n\
             2,2024-01-15,Bolt Logistics,abc\n\
             3,2024-02-10,Acme Hauling,15\n",
        )
        .unwrap();
        let columns = derive_columns(dataset.headers(), &HashMap::new());
        DataGrid::new(
            Arc::new(dataset),
            columns,
            QueryState::default(),
            Theme::default(),
        )
    }

    fn ids(grid: &DataGrid) -> Vec<String> {
        grid.visible_rows()
            .map(|r| r.get("id").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_default_sort_by_created_dt() {
        let grid = create_test_grid();
        assert_eq!(ids(&grid), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_cursor_movement() {
        let mut grid = create_test_grid();
        let now = Instant::now();

        assert_eq!(grid.cursor(), Position { row: 0, col: 0 });

        grid.handle_action(Action::MoveDown, now).unwrap();
        assert_eq!(grid.cursor().row, 1);

        grid.handle_action(Action::MoveRight, now).unwrap();
        assert_eq!(grid.cursor().col, 1);

        grid.handle_action(Action::MoveUp, now).unwrap();
        assert_eq!(grid.cursor().row, 0);

        grid.handle_action(Action::MoveLeft, now).unwrap();
        assert_eq!(grid.cursor().col, 0);
    }

    #[test]
    fn test_go_to_edges() {
        let mut grid = create_test_grid();
        let now = Instant::now();

        grid.handle_action(Action::GoToBottom, now).unwrap();
        assert_eq!(grid.cursor().row, 2);
        grid.handle_action(Action::GoToTop, now).unwrap();
        assert_eq!(grid.cursor().row, 0);

        grid.handle_action(Action::End, now).unwrap();
        assert_eq!(grid.cursor().col, 3);
        grid.handle_action(Action::Home, now).unwrap();
        assert_eq!(grid.cursor().col, 0);
    }

    #[test]
    fn test_filter_applies_after_debounce() {
        let mut grid = create_test_grid();
        let start = Instant::now();

        grid.handle_action(Action::FocusFilter, start).unwrap();
        assert!(grid.is_editing_filter());
        for c in "acme".chars() {
            grid.type_char(c, start);
        }
        assert_eq!(grid.visible_len(), 3);
        assert!(grid.is_busy());

        grid.update(start + Duration::from_millis(300)).unwrap();
        assert_eq!(ids(&grid), vec!["3", "1"]);
    }

    #[test]
    fn test_confirm_commits_filter() {
        let mut grid = create_test_grid();
        let now = Instant::now();

        grid.focus_filter();
        grid.set_filter("bolt", now);
        grid.handle_action(Action::Confirm, now).unwrap();

        assert!(!grid.is_editing_filter());
        assert_eq!(ids(&grid), vec!["2"]);
    }

    #[test]
    fn test_sort_current_column_toggles() {
        let mut grid = create_test_grid();
        let now = Instant::now();

        grid.handle_action(Action::End, now).unwrap();
        grid.handle_action(Action::SortColumn, now).unwrap();
        assert_eq!(
            grid.query().sort(),
            &SortSpec::new("amount", SortDirection::Ascending)
        );
        assert_eq!(ids(&grid), vec!["1", "3", "2"]);

        grid.handle_action(Action::SortColumn, now).unwrap();
        assert_eq!(ids(&grid), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_clear_filter_restores_default_sort() {
        let mut grid = create_test_grid();
        let now = Instant::now();

        grid.set_filter("acme", now);
        grid.commit_filter();
        grid.set_sort(SortSpec::new("id", SortDirection::Descending));
        assert_eq!(ids(&grid), vec!["3", "1"]);

        grid.handle_action(Action::ClearFilter, now).unwrap();
        grid.commit_filter();
        assert_eq!(grid.query().sort(), &SortSpec::default());
        assert_eq!(ids(&grid), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_cursor_clamped_when_rows_shrink() {
        let mut grid = create_test_grid();
        let now = Instant::now();

        grid.handle_action(Action::GoToBottom, now).unwrap();
        grid.set_filter("bolt", now);
        grid.commit_filter();
        assert_eq!(grid.cursor().row, 0);
    }

    #[test]
    fn test_teardown_drops_pending_filter() {
        let mut grid = create_test_grid();
        let start = Instant::now();

        grid.set_filter("bolt", start);
        grid.teardown();
        grid.update(start + Duration::from_secs(1)).unwrap();
        assert_eq!(grid.visible_len(), 3);
        assert!(!grid.is_busy());
    }

    #[test]
    fn test_render_header_and_title() {
        let mut grid = create_test_grid();
        grid.set_focused(true);

        let backend = TestBackend::new(120, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| grid.render(frame, frame.area()))
            .unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Table View [1/3]"));
        assert!(content.contains("LEGAL NAME"));
        assert!(content.contains("CREATED DT ▲"));
        assert!(content.contains("Bolt Logistics"));
    }

    #[test]
    fn test_supported_actions() {
        let grid = create_test_grid();
        let actions = grid.supported_actions();
        assert!(actions.contains(&Action::MoveUp));
        assert!(actions.contains(&Action::SortColumn));
        assert!(!actions.contains(&Action::NextAggregator));
    }
}
