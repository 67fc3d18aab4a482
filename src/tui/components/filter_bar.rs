use crate::services::filter_sort::MAX_FILTER_LEN;
use crate::tui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// One-line filter input drawn above the grid
pub struct FilterBar<'a> {
    text: &'a str,
    focused: bool,
    busy: bool,
    frame: usize,
    theme: &'a Theme,
}

impl<'a> FilterBar<'a> {
    pub fn new(text: &'a str, theme: &'a Theme) -> Self {
        Self {
            text,
            focused: false,
            busy: false,
            frame: 0,
            theme,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Show the spinner; `frame` picks the spinner glyph
    pub fn busy(mut self, busy: bool, frame: usize) -> Self {
        self.busy = busy;
        self.frame = frame;
        self
    }

    fn counter(&self) -> String {
        format!("{}/{}", self.text.chars().count(), MAX_FILTER_LEN)
    }
}

impl Widget for FilterBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            self.theme.focused_border_style()
        } else {
            self.theme.border_style()
        };

        let mut spans = Vec::new();
        if self.text.is_empty() && !self.focused {
            spans.push(Span::styled("Press / to filter", self.theme.muted_style()));
        } else {
            spans.push(Span::styled(self.text, self.theme.normal_style()));
            if self.focused {
                spans.push(Span::styled("_", self.theme.focused_border_style()));
            }
        }

        let mut title = vec![Span::styled(" Filter ", self.theme.title_style())];
        if self.busy {
            title.push(Span::styled(
                format!("{} ", SPINNER[self.frame % SPINNER.len()]),
                self.theme.busy_style(),
            ));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Line::from(title))
            .title_bottom(
                Line::from(Span::styled(self.counter(), self.theme.muted_style())).right_aligned(),
            );

        Paragraph::new(Line::from(spans)).block(block).render(area, buf);
    }
}
