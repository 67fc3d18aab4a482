use crate::config::Config;
use crate::core::{CsvImportOptions, DataSource, Dataset, ViewMode};
use crate::services::columns::derive_columns;
use crate::services::enrich::enrich_dataset;
use crate::services::loader::spawn_load;
use crate::services::{LoadEvent, LoadTask, QueryState};
use crate::tui::components::{centered_rect, DataGrid, LoadingOverlay, PivotView};
use crate::tui::shell::ViewShell;
use crate::tui::{Action, ActionCategory, Component, Focusable, KeyBindings, Theme};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Application state
///
/// Owns the view shell, the mounted view and the in-flight load, and routes
/// key events to actions.
pub struct App {
    config: Config,

    shell: ViewShell,

    /// Records of the last completed load
    dataset: Arc<Dataset>,

    /// Date-enriched copy of `dataset`, built on first use
    enriched: Option<Arc<Dataset>>,

    /// Mounted view; only one exists at a time
    grid: Option<DataGrid>,
    pivot: Option<PivotView>,

    load_task: Option<LoadTask>,
    load_error: Option<String>,

    keybindings: KeyBindings,
    theme: Theme,

    show_help: bool,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> Self {
        let keybindings = config.keybindings();
        for problem in keybindings.validate() {
            warn!("Keybinding problem: {}", problem);
        }
        let theme = config.theme();
        let shell = ViewShell::new(config.view_settle());

        Self {
            config,
            shell,
            dataset: Arc::new(Dataset::empty()),
            enriched: None,
            grid: None,
            pivot: None,
            load_task: None,
            load_error: None,
            keybindings,
            theme,
            show_help: false,
            should_quit: false,
        }
    }

    /// Begin loading `source` in the background
    ///
    /// A load already in flight is cancelled.
    pub fn start_load(&mut self, runtime: &Handle, source: DataSource) {
        self.unmount();
        self.shell.reset();
        self.load_error = None;
        let options = self.config.csv_options().unwrap_or_else(|e| {
            warn!("{}; using default CSV settings", e);
            CsvImportOptions::default()
        });
        self.load_task = Some(spawn_load(runtime, source, options));
    }

    /// Apply the outcome of a background load
    pub fn on_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Loaded(dataset) => {
                self.install(dataset);
                self.shell.loaded();
            }
            LoadEvent::Failed(err) => {
                self.load_error = Some(err.to_string());
                self.install(Dataset::empty());
                self.shell.load_failed();
            }
        }
        self.mount(ViewMode::Grid);
    }

    fn install(&mut self, dataset: Dataset) {
        self.dataset = Arc::new(dataset);
        self.enriched = None;
    }

    fn enriched(&mut self) -> Arc<Dataset> {
        if let Some(enriched) = &self.enriched {
            return Arc::clone(enriched);
        }
        let enriched = Arc::new(enrich_dataset(&self.dataset));
        debug!("Enriched {} records for the pivot view", enriched.len());
        self.enriched = Some(Arc::clone(&enriched));
        enriched
    }

    /// Create a fresh instance of `mode`'s view
    fn mount(&mut self, mode: ViewMode) {
        self.unmount();
        match mode {
            ViewMode::Grid => {
                let columns = derive_columns(self.dataset.headers(), &self.config.column_widths);
                let query = QueryState::new(self.config.filter_debounce(), self.config.busy_min());
                let mut grid = DataGrid::new(
                    Arc::clone(&self.dataset),
                    columns,
                    query,
                    self.theme.clone(),
                );
                grid.set_focused(true);
                self.grid = Some(grid);
            }
            ViewMode::Pivot => {
                let dataset = self.enriched();
                let mut pivot =
                    PivotView::new(dataset, self.config.pivot_debounce(), self.theme.clone());
                pivot.set_focused(true);
                self.pivot = Some(pivot);
            }
        }
        debug!("Mounted {}", mode);
    }

    /// Drop the mounted view, cancelling its pending work
    fn unmount(&mut self) {
        if let Some(mut grid) = self.grid.take() {
            grid.teardown();
        }
        if let Some(mut pivot) = self.pivot.take() {
            pivot.teardown();
        }
    }

    fn active_component(&mut self) -> Option<&mut dyn Component> {
        match (self.grid.as_mut(), self.pivot.as_mut()) {
            (Some(grid), _) => Some(grid as &mut dyn Component),
            (None, Some(pivot)) => Some(pivot as &mut dyn Component),
            (None, None) => None,
        }
    }

    /// Handle a key event
    pub fn handle_key_event(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        // Only handle key press events, ignore release/repeat
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        // Filter input takes raw characters while it has focus
        if let Some(grid) = self.grid.as_mut().filter(|g| g.is_editing_filter()) {
            match key.code {
                KeyCode::Char(c)
                    if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    if !grid.type_char(c, now) {
                        debug!("Filter is at its maximum length");
                    }
                    return Ok(());
                }
                KeyCode::Backspace => {
                    grid.backspace(now);
                    return Ok(());
                }
                KeyCode::Enter => {
                    grid.handle_action(Action::Confirm, now)?;
                    return Ok(());
                }
                KeyCode::Esc => {
                    grid.handle_action(Action::Cancel, now)?;
                    return Ok(());
                }
                _ => {}
            }
        }

        // Translate key to action
        if let Some(action) = self.keybindings.get_action(&key) {
            self.handle_action(action, now)?;
        }
        Ok(())
    }

    /// Handle an action at application level, then route it to the view
    pub fn handle_action(&mut self, action: Action, now: Instant) -> Result<()> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                return Ok(());
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                return Ok(());
            }
            Action::Cancel if self.show_help => {
                self.show_help = false;
                return Ok(());
            }
            Action::ToggleView => {
                if self.shell.toggle(now) {
                    self.unmount();
                }
                return Ok(());
            }
            _ => {}
        }

        if self.shell.shows_content() {
            if let Some(component) = self.active_component() {
                component.handle_action(action, now)?;
            }
        }
        Ok(())
    }

    /// Update app state (called on every tick)
    pub fn update(&mut self, now: Instant) -> Result<()> {
        if let Some(task) = self.load_task.as_mut() {
            // The outcome is sent before the task ends
            let finished = task.is_finished();
            let event = task.try_next().or_else(|| {
                finished.then(|| {
                    warn!("Load task finished without a result");
                    LoadEvent::Loaded(Dataset::empty())
                })
            });
            if let Some(event) = event {
                self.load_task = None;
                self.on_load_event(event);
            }
        }

        if let Some(mode) = self.shell.tick(now) {
            info!("Switched to {}", mode);
            self.mount(mode);
        }

        if let Some(component) = self.active_component() {
            component.update(now)?;
        }
        Ok(())
    }

    /// Cancel the load and any pending debounce
    pub fn shutdown(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.cancel();
        }
        self.unmount();
    }

    /// Check if the app should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn shell(&self) -> &ViewShell {
        &self.shell
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn grid(&self) -> Option<&DataGrid> {
        self.grid.as_ref()
    }

    pub fn pivot(&self) -> Option<&PivotView> {
        self.pivot.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.load_task.is_some()
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn keybindings(&self) -> &KeyBindings {
        &self.keybindings
    }

    /// Render the app
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_header(frame, chunks[0]);

        let body = chunks[1];
        if let Some(grid) = self.grid.as_mut() {
            grid.render(frame, body);
        } else if let Some(pivot) = self.pivot.as_mut() {
            pivot.render(frame, body);
            if pivot.is_busy() {
                frame.render_widget(LoadingOverlay::new("Updating pivot...", &self.theme), body);
            }
        }

        if !self.shell.shows_content() {
            let message = match self.shell.pending_view() {
                Some(ViewMode::Pivot) => "Building pivot table...",
                Some(ViewMode::Grid) => "Loading table...",
                None => "Loading records...",
            };
            frame.render_widget(LoadingOverlay::new(message, &self.theme), body);
        }

        self.render_status(frame, chunks[2]);

        if self.show_help {
            self.render_help(frame, centered_rect(60, 70, area));
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mode = self.shell.active_view().or(self.shell.pending_view());
        let toggle = mode.unwrap_or_default().toggle_label();
        let keys = self.keybindings.get_keys_for_action(Action::ToggleView);
        let key = keys.first().map(String::as_str).unwrap_or("?");

        let mut spans = vec![Span::styled("FMSCA", self.theme.title_style())];
        if let Some(mode) = mode {
            spans.push(Span::styled(format!("  {}", mode), self.theme.muted_style()));
        }
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("[{}] {}", key, toggle), self.theme.header_style()));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some(err) = &self.load_error {
            Line::from(Span::styled(format!("Load failed: {}", err), self.theme.error_style()))
        } else {
            let actions: &[Action] = match (&self.grid, &self.pivot) {
                (Some(grid), _) => grid.supported_actions(),
                (None, Some(pivot)) => pivot.supported_actions(),
                _ => &[],
            };
            let hints: Vec<String> = actions
                .iter()
                .filter(|a| a.category() != ActionCategory::Navigation)
                .chain([Action::ToggleHelp, Action::Quit].iter())
                .filter_map(|a| {
                    self.keybindings
                        .get_keys_for_action(*a)
                        .first()
                        .map(|k| format!("{}: {}", k, a.short_label()))
                })
                .collect();
            Line::from(Span::styled(hints.join("  "), self.theme.muted_style()))
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let categories = [
            ActionCategory::Navigation,
            ActionCategory::DataOps,
            ActionCategory::View,
            ActionCategory::Pivot,
            ActionCategory::Application,
        ];
        let mut lines = Vec::new();
        for category in categories {
            lines.push(Line::from(Span::styled(
                category.to_string(),
                self.theme.header_style(),
            )));
            for action in Action::all().into_iter().filter(|a| a.category() == category) {
                let keys = self.keybindings.get_keys_for_action(action).join(", ");
                lines.push(Line::from(vec![
                    Span::styled(format!("  {:<20}", keys), self.theme.normal_style()),
                    Span::styled(action.description(), self.theme.muted_style()),
                ]));
            }
        }

        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: false }).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Help ")
                    .border_style(self.theme.focused_border_style()),
            ),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::loader::parse_csv;
    use crate::services::LoadError;
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn loaded_app() -> App {
        let mut app = App::new(Config::default());
        let dataset = parse_csv(
            "id,created_dt,legal_name,date\n\
             1,2024-03-01,Acme Freight,2024-03-01\n\
             2,2024-01-15,Bolt Logistics,2024-01-15\n",
        )
        .unwrap();
        app.on_load_event(LoadEvent::Loaded(dataset));
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_app_creation() {
        let app = App::new(Config::default());
        assert!(!app.should_quit());
        assert!(app.shell().is_loading());
        assert!(app.grid().is_none());
    }

    #[test]
    fn test_loaded_shows_grid() {
        let app = loaded_app();
        assert_eq!(app.shell().active_view(), Some(ViewMode::Grid));
        assert_eq!(app.grid().unwrap().visible_len(), 2);
        assert!(app.grid().unwrap().is_focused());
    }

    #[test]
    fn test_failed_load_shows_empty_grid() {
        let mut app = App::new(Config::default());
        app.on_load_event(LoadEvent::Failed(LoadError::Parse {
            message: "bad quote".to_string(),
        }));

        assert_eq!(app.shell().active_view(), Some(ViewMode::Grid));
        assert!(app.dataset().is_empty());
        assert!(app.load_error().unwrap().contains("bad quote"));
    }

    #[test]
    fn test_quit_action() {
        let mut app = loaded_app();
        app.handle_key_event(key(KeyCode::Char('q')), Instant::now())
            .unwrap();
        assert!(app.should_quit());
    }

    #[test]
    fn test_toggle_view_settles_into_pivot() {
        let mut app = loaded_app();
        let start = Instant::now();

        app.handle_key_event(key(KeyCode::Tab), start).unwrap();
        assert!(app.grid().is_none());
        assert!(app.pivot().is_none());
        assert!(!app.shell().shows_content());

        app.update(start + Duration::from_millis(200)).unwrap();
        assert!(app.pivot().is_none());

        app.update(start + Duration::from_millis(500)).unwrap();
        let pivot = app.pivot().unwrap();
        assert!(pivot.attributes().contains(&"Month".to_string()));
        assert!(app.grid().is_none());
    }

    #[test]
    fn test_views_are_recreated_on_toggle() {
        let mut app = loaded_app();
        let start = Instant::now();

        app.handle_key_event(key(KeyCode::Char('/')), start).unwrap();
        for c in "acme".chars() {
            app.handle_key_event(key(KeyCode::Char(c)), start).unwrap();
        }
        app.handle_key_event(key(KeyCode::Enter), start).unwrap();
        assert_eq!(app.grid().unwrap().visible_len(), 1);

        // Round trip through the pivot view
        app.handle_action(Action::ToggleView, start).unwrap();
        app.update(start + Duration::from_millis(500)).unwrap();
        app.handle_action(Action::ToggleView, start + Duration::from_millis(600))
            .unwrap();
        app.update(start + Duration::from_millis(1100)).unwrap();

        let grid = app.grid().unwrap();
        assert_eq!(grid.query().filter(), "");
        assert_eq!(grid.visible_len(), 2);
    }

    #[test]
    fn test_filter_typing_does_not_trigger_bindings() {
        let mut app = loaded_app();
        let now = Instant::now();

        app.handle_key_event(key(KeyCode::Char('/')), now).unwrap();
        app.handle_key_event(key(KeyCode::Char('q')), now).unwrap();
        assert!(!app.should_quit());
        assert_eq!(app.grid().unwrap().query().filter(), "q");

        app.handle_key_event(key(KeyCode::Backspace), now).unwrap();
        app.handle_key_event(key(KeyCode::Esc), now).unwrap();
        assert!(!app.grid().unwrap().is_editing_filter());
    }

    #[test]
    fn test_actions_ignored_while_loading() {
        let mut app = App::new(Config::default());
        let now = Instant::now();
        app.handle_action(Action::ToggleView, now).unwrap();
        app.handle_action(Action::MoveDown, now).unwrap();
        assert!(app.shell().is_loading());
    }

    #[test]
    fn test_help_toggle() {
        let mut app = loaded_app();
        let now = Instant::now();
        app.handle_key_event(key(KeyCode::Char('?')), now).unwrap();
        assert!(app.show_help);
        app.handle_key_event(key(KeyCode::Esc), now).unwrap();
        assert!(!app.show_help);
    }

    #[test]
    fn test_shutdown_cancels_pending_work() {
        let mut app = loaded_app();
        let start = Instant::now();
        app.handle_key_event(key(KeyCode::Char('/')), start).unwrap();
        app.handle_key_event(key(KeyCode::Char('z')), start).unwrap();
        app.shutdown();
        assert!(app.grid().is_none());
        app.update(start + Duration::from_secs(1)).unwrap();
        assert!(!app.is_loading());
    }

    #[test]
    fn test_render_loading_and_grid() {
        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();

        let mut app = App::new(Config::default());
        terminal.draw(|frame| app.render(frame)).unwrap();
        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Loading records..."));

        let mut app = loaded_app();
        terminal.draw(|frame| app.render(frame)).unwrap();
        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("FMSCA"));
        assert!(content.contains("Pivot Table"));
        assert!(content.contains("Acme Freight"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FMSCA.csv");
        std::fs::write(&path, "id,legal_name\n1,Acme\n2,Bolt\n").unwrap();

        let mut app = App::new(Config::default());
        app.start_load(&Handle::current(), DataSource::File(path));
        assert!(app.is_loading());

        for _ in 0..100 {
            app.update(Instant::now()).unwrap();
            if !app.is_loading() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(app.dataset().len(), 2);
        assert_eq!(app.shell().active_view(), Some(ViewMode::Grid));
    }
}
