use crate::core::Dataset;
use crate::services::pivot::{attributes, key_label, pivot};
use crate::services::{Debouncer, PivotConfig, PivotTable, Renderer};
use crate::tui::{Action, Component, Focusable, Theme};
use color_eyre::Result;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_PIVOT_DEBOUNCE: Duration = Duration::from_millis(300);

const LABEL_WIDTH: u16 = 24;
const CELL_WIDTH: u16 = 12;

/// Pivot table over the date-enriched records
pub struct PivotView {
    dataset: Arc<Dataset>,
    attributes: Vec<String>,
    draft: PivotConfig,
    applied: PivotConfig,
    debounce: Debouncer<PivotConfig>,
    table: PivotTable,
    scroll: usize,
    page: usize,
    focused: bool,
    theme: Theme,
    supported_actions: Vec<Action>,
}

impl PivotView {
    pub fn new(dataset: Arc<Dataset>, debounce_window: Duration, theme: Theme) -> Self {
        let attributes = attributes(dataset.headers());
        let applied = PivotConfig::default();
        let table = pivot(dataset.records(), &applied);
        Self {
            dataset,
            attributes,
            draft: applied.clone(),
            applied,
            debounce: Debouncer::new(debounce_window),
            table,
            scroll: 0,
            page: 10,
            focused: false,
            theme,
            supported_actions: vec![
                Action::MoveUp,
                Action::MoveDown,
                Action::PageUp,
                Action::PageDown,
                Action::GoToTop,
                Action::GoToBottom,
                Action::NextRowAttribute,
                Action::NextColAttribute,
                Action::StackRowAttribute,
                Action::StackColAttribute,
                Action::NextAggregator,
                Action::NextValueField,
                Action::NextRenderer,
                Action::ResetPivot,
            ],
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Configuration the table was last computed with
    pub fn config(&self) -> &PivotConfig {
        &self.applied
    }

    /// Configuration as edited, possibly not applied yet
    pub fn draft(&self) -> &PivotConfig {
        &self.draft
    }

    pub fn table(&self) -> &PivotTable {
        &self.table
    }

    /// Replace the configuration; recomputed once the debounce window passes
    pub fn set_config(&mut self, config: PivotConfig, now: Instant) {
        self.draft = config.clone();
        self.debounce.push(config, now);
    }

    fn edit(&mut self, now: Instant, change: impl FnOnce(&mut PivotConfig, &[String])) {
        let mut config = self.draft.clone();
        change(&mut config, &self.attributes);
        self.set_config(config, now);
    }

    fn apply(&mut self, config: PivotConfig) {
        debug!(
            "Recomputing pivot rows={:?} cols={:?} aggregator={}",
            config.rows, config.cols, config.aggregator
        );
        self.table = pivot(self.dataset.records(), &config);
        self.applied = config;
        self.scroll = self.scroll.min(self.table.row_keys.len().saturating_sub(1));
    }

    fn render_controls(&self, frame: &mut Frame, area: Rect) {
        let label = |name: &'static str, value: String| {
            vec![
                Span::styled(format!("{}: ", name), self.theme.muted_style()),
                Span::styled(value, self.theme.normal_style()),
                Span::raw("  "),
            ]
        };
        let list = |items: &[String]| {
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(", ")
            }
        };

        let mut spans = Vec::new();
        spans.extend(label("Rows", list(&self.draft.rows)));
        spans.extend(label("Cols", list(&self.draft.cols)));
        spans.extend(label("Aggregator", self.draft.aggregator.to_string()));
        if self.draft.aggregator.needs_value() {
            spans.extend(label(
                "Value",
                self.draft.value_field.clone().unwrap_or_else(|| "-".to_string()),
            ));
        }
        spans.extend(label("Renderer", self.draft.renderer.to_string()));

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(Span::styled(" Pivot Table ", self.theme.title_style()));
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn format(&self, value: Option<f64>) -> String {
        value
            .map(|v| self.table.aggregator.format(v))
            .unwrap_or_default()
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect, heatmap: bool) {
        self.page = (area.height.saturating_sub(4) as usize).max(1);
        let table = &self.table;
        let max = table.max_cell().unwrap_or(0.0);

        let mut header_cells = vec![Cell::from(key_label(&self.applied.rows))];
        header_cells.extend(table.col_keys.iter().map(|k| Cell::from(key_label(k))));
        header_cells.push(Cell::from("Totals"));
        let header = Row::new(header_cells).style(self.theme.header_style());

        let end = (self.scroll + self.page).min(table.row_keys.len());
        let mut rows: Vec<Row> = (self.scroll..end)
            .map(|r| {
                let mut cells = vec![Cell::from(key_label(&table.row_keys[r]))];
                cells.extend((0..table.col_keys.len()).map(|c| {
                    let value = table.value(r, c);
                    let style = match value {
                        Some(v) if heatmap && max > 0.0 => self.theme.heat_style(v / max),
                        _ => self.theme.normal_style(),
                    };
                    Cell::from(self.format(value)).style(style)
                }));
                cells.push(
                    Cell::from(self.format(table.row_totals[r])).style(self.theme.total_style()),
                );
                Row::new(cells)
            })
            .collect();

        let mut totals = vec![Cell::from("Totals")];
        totals.extend(table.col_totals.iter().map(|t| Cell::from(self.format(*t))));
        totals.push(Cell::from(self.format(table.grand_total)));
        rows.push(Row::new(totals).style(self.theme.total_style()));

        let mut widths = vec![Constraint::Length(LABEL_WIDTH)];
        widths.extend(
            std::iter::repeat(Constraint::Length(CELL_WIDTH)).take(table.col_keys.len() + 1),
        );

        let title = format!(
            " {} [{}/{}] ",
            self.applied.aggregator,
            if table.is_empty() { 0 } else { self.scroll + 1 },
            table.row_keys.len()
        );
        let widget = Table::new(rows, widths).header(header).block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(if self.focused {
                    self.theme.focused_border_style()
                } else {
                    self.theme.border_style()
                }),
        );
        frame.render_widget(widget, area);
    }

    fn render_bar_chart(&mut self, frame: &mut Frame, area: Rect) {
        let table = &self.table;
        let bars: Vec<Bar> = table
            .row_keys
            .iter()
            .zip(&table.row_totals)
            .skip(self.scroll)
            .map(|(key, total)| {
                let value = total.unwrap_or(0.0).max(0.0);
                Bar::default()
                    .label(Line::from(key_label(key)))
                    .value(value.round() as u64)
                    .text_value(self.format(*total))
            })
            .collect();

        let chart = BarChart::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(
                        " {} by {} ",
                        self.applied.aggregator,
                        key_label(&self.applied.rows)
                    ))
                    .border_style(self.theme.border_style()),
            )
            .direction(Direction::Horizontal)
            .bar_width(1)
            .bar_gap(0)
            .bar_style(Style::default().fg(self.theme.border_focused))
            .value_style(self.theme.selected_style())
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }
}

impl Component for PivotView {
    fn handle_action(&mut self, action: Action, now: Instant) -> Result<bool> {
        match action {
            Action::MoveUp => self.scroll = self.scroll.saturating_sub(1),
            Action::MoveDown => {
                if self.scroll + 1 < self.table.row_keys.len() {
                    self.scroll += 1;
                }
            }
            Action::PageUp => self.scroll = self.scroll.saturating_sub(self.page),
            Action::PageDown => {
                let last = self.table.row_keys.len().saturating_sub(1);
                self.scroll = (self.scroll + self.page).min(last);
            }
            Action::GoToTop => self.scroll = 0,
            Action::GoToBottom => self.scroll = self.table.row_keys.len().saturating_sub(1),
            Action::NextRowAttribute => {
                self.edit(now, |config, attrs| config.rows = cycle_attribute(&config.rows, attrs))
            }
            Action::NextColAttribute => {
                self.edit(now, |config, attrs| config.cols = cycle_attribute(&config.cols, attrs))
            }
            Action::StackRowAttribute => {
                self.edit(now, |config, attrs| config.rows = stack_attribute(&config.rows, attrs))
            }
            Action::StackColAttribute => {
                self.edit(now, |config, attrs| config.cols = stack_attribute(&config.cols, attrs))
            }
            Action::NextAggregator => self.edit(now, |config, attrs| {
                config.aggregator = config.aggregator.next();
                if config.aggregator.needs_value() && config.value_field.is_none() {
                    config.value_field = attrs.first().cloned();
                }
            }),
            Action::NextValueField => self.edit(now, |config, attrs| {
                config.value_field = next_value_field(config.value_field.as_deref(), attrs);
            }),
            Action::NextRenderer => self.edit(now, |config, _| {
                config.renderer = config.renderer.next();
            }),
            Action::ResetPivot => self.set_config(PivotConfig::default(), now),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        self.render_controls(frame, chunks[0]);

        if self.dataset.is_empty() {
            frame.render_widget(
                Paragraph::new("No records loaded")
                    .style(self.theme.muted_style())
                    .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
            return;
        }

        match self.applied.renderer {
            Renderer::Table => self.render_table(frame, chunks[1], false),
            Renderer::Heatmap => self.render_table(frame, chunks[1], true),
            Renderer::BarChart => self.render_bar_chart(frame, chunks[1]),
        }
    }

    fn supported_actions(&self) -> &[Action] {
        &self.supported_actions
    }

    fn name(&self) -> &str {
        "PivotView"
    }

    fn update(&mut self, now: Instant) -> Result<()> {
        if let Some(config) = self.debounce.poll(now) {
            self.apply(config);
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.debounce.is_pending()
    }

    fn teardown(&mut self) {
        if self.debounce.cancel() {
            debug!("Cancelled pending pivot update");
        }
    }
}

impl Focusable for PivotView {
    fn is_focused(&self) -> bool {
        self.focused
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

/// Cycle the innermost attribute through those not already stacked before it;
/// past the last one the innermost attribute is dropped
fn cycle_attribute(current: &[String], attributes: &[String]) -> Vec<String> {
    let (outer, last) = match current.split_last() {
        Some((last, outer)) => (outer, Some(last)),
        None => (current, None),
    };
    let candidates: Vec<&String> = attributes.iter().filter(|a| !outer.contains(a)).collect();
    let next = match last {
        None => 0,
        Some(last) => candidates.iter().position(|a| *a == last).map_or(0, |pos| pos + 1),
    };

    let mut stacked = outer.to_vec();
    stacked.extend(candidates.get(next).map(|a| (*a).clone()));
    stacked
}

/// Append the first attribute not yet used; once every attribute is used, clear
fn stack_attribute(current: &[String], attributes: &[String]) -> Vec<String> {
    match attributes.iter().find(|a| !current.contains(a)) {
        Some(next) => {
            let mut stacked = current.to_vec();
            stacked.push(next.clone());
            stacked
        }
        None => Vec::new(),
    }
}

fn next_value_field(current: Option<&str>, attributes: &[String]) -> Option<String> {
    if attributes.is_empty() {
        return None;
    }
    let next = current
        .and_then(|c| attributes.iter().position(|a| a == c))
        .map_or(0, |pos| (pos + 1) % attributes.len());
    attributes.get(next).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::enrich::enrich_dataset;
    use crate::services::Aggregator;
    use crate::services::loader::parse_csv;
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};

    fn create_test_view() -> PivotView {
        let dataset = parse_csv(
            "entity_type,date,power_units\n\
             CARRIER,2024-01-10,10\n\
             BROKER,2024-01-22,0\n\
             CARRIER,2024-02-03,4\n",
        )
        .unwrap();
        PivotView::new(
            Arc::new(enrich_dataset(&dataset)),
            DEFAULT_PIVOT_DEBOUNCE,
            Theme::default(),
        )
    }

    #[test]
    fn test_attributes_include_derived_fields() {
        let view = create_test_view();
        assert_eq!(
            view.attributes(),
            &["entity_type", "date", "power_units", "Year", "Month", "Week"]
        );
    }

    #[test]
    fn test_changes_are_debounced() {
        let mut view = create_test_view();
        let start = Instant::now();

        view.handle_action(Action::NextRowAttribute, start).unwrap();
        assert_eq!(view.draft().rows, vec!["entity_type"]);
        assert!(view.config().rows.is_empty());
        assert!(view.is_busy());

        view.update(start + Duration::from_millis(299)).unwrap();
        assert!(view.config().rows.is_empty());

        view.update(start + Duration::from_millis(300)).unwrap();
        assert!(!view.is_busy());
        assert_eq!(view.config().rows, vec!["entity_type"]);
        assert_eq!(view.table().row_totals, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_burst_applies_latest_config() {
        let mut view = create_test_view();
        let start = Instant::now();

        for step in 0..4 {
            view.handle_action(Action::NextRowAttribute, start + Duration::from_millis(step * 100))
                .unwrap();
        }
        view.update(start + Duration::from_millis(700)).unwrap();
        assert_eq!(view.config().rows, vec!["Year"]);
        assert_eq!(view.table().row_keys, vec![vec!["2024".to_string()]]);
    }

    #[test]
    fn test_aggregator_picks_value_field() {
        let mut view = create_test_view();
        let now = Instant::now();

        view.handle_action(Action::NextAggregator, now).unwrap();
        assert_eq!(view.draft().aggregator, Aggregator::CountUniqueValues);
        assert_eq!(view.draft().value_field.as_deref(), Some("entity_type"));

        view.handle_action(Action::NextValueField, now).unwrap();
        view.handle_action(Action::NextValueField, now).unwrap();
        view.handle_action(Action::NextAggregator, now).unwrap();
        view.update(now + DEFAULT_PIVOT_DEBOUNCE).unwrap();
        assert_eq!(view.config().aggregator, Aggregator::Sum);
        assert_eq!(view.table().grand_total, Some(14.0));
    }

    #[test]
    fn test_reset_and_teardown() {
        let mut view = create_test_view();
        let now = Instant::now();

        view.handle_action(Action::NextColAttribute, now).unwrap();
        view.handle_action(Action::ResetPivot, now).unwrap();
        assert_eq!(view.draft(), &PivotConfig::default());

        view.handle_action(Action::NextRowAttribute, now).unwrap();
        view.teardown();
        view.update(now + Duration::from_secs(1)).unwrap();
        assert_eq!(view.config(), &PivotConfig::default());
    }

    #[test]
    fn test_cycle_attribute_wraps_to_none() {
        let attrs = vec!["a".to_string(), "b".to_string()];
        assert_eq!(cycle_attribute(&[], &attrs), vec!["a"]);
        assert_eq!(cycle_attribute(&["a".to_string()], &attrs), vec!["b"]);
        assert!(cycle_attribute(&["b".to_string()], &attrs).is_empty());
        assert_eq!(next_value_field(Some("b"), &attrs).as_deref(), Some("a"));
        assert_eq!(next_value_field(None, &[]), None);
    }

    #[test]
    fn test_stacked_attributes() {
        let attrs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let stacked = stack_attribute(&["a".to_string()], &attrs);
        assert_eq!(stacked, vec!["a", "b"]);
        // Cycling moves only the innermost attribute and skips outer ones
        assert_eq!(cycle_attribute(&stacked, &attrs), vec!["a", "c"]);
        assert_eq!(cycle_attribute(&["b".to_string(), "c".to_string()], &attrs), vec!["b"]);
        assert_eq!(cycle_attribute(&["b".to_string()], &attrs), vec!["c"]);
        assert!(stack_attribute(&attrs, &attrs).is_empty());
    }

    #[test]
    fn test_stack_row_attributes_groups_by_both() {
        let mut view = create_test_view();
        let now = Instant::now();

        view.handle_action(Action::StackRowAttribute, now).unwrap();
        view.handle_action(Action::StackRowAttribute, now).unwrap();
        assert_eq!(view.draft().rows, vec!["entity_type", "date"]);

        view.update(now + DEFAULT_PIVOT_DEBOUNCE).unwrap();
        assert_eq!(view.table().row_keys.len(), 3);
        assert_eq!(
            view.table().row_keys[0],
            vec!["BROKER".to_string(), "2024-01-22".to_string()]
        );
        assert_eq!(next_value_field(None, &[]), None);
    }

    #[test]
    fn test_render_heatmap_and_bar_chart() {
        let mut view = create_test_view();
        let now = Instant::now();
        view.handle_action(Action::NextRowAttribute, now).unwrap();
        view.handle_action(Action::NextRenderer, now).unwrap();
        view.update(now + DEFAULT_PIVOT_DEBOUNCE).unwrap();
        assert_eq!(view.config().renderer, Renderer::Heatmap);

        let backend = TestBackend::new(100, 15);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| view.render(frame, frame.area())).unwrap();
        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("CARRIER"));
        assert!(content.contains("Totals"));

        view.handle_action(Action::NextRenderer, now).unwrap();
        view.update(now + DEFAULT_PIVOT_DEBOUNCE * 2).unwrap();
        assert_eq!(view.config().renderer, Renderer::BarChart);
        terminal.draw(|frame| view.render(frame, frame.area())).unwrap();
    }
}
