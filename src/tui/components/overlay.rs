use crate::tui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::Style,
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

/// Dimmed backdrop with a centered progress message
pub struct LoadingOverlay<'a> {
    message: &'a str,
    theme: &'a Theme,
}

impl<'a> LoadingOverlay<'a> {
    pub fn new(message: &'a str, theme: &'a Theme) -> Self {
        Self { message, theme }
    }
}

impl Widget for LoadingOverlay<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Style::default().fg(self.theme.muted).bg(self.theme.background));

        let width = (self.message.chars().count() as u16 + 6).min(area.width);
        let popup = centered_fixed(width, 3, area);
        Clear.render(popup, buf);
        Paragraph::new(self.message)
            .alignment(Alignment::Center)
            .style(self.theme.busy_style())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(self.theme.focused_border_style()),
            )
            .render(popup, buf);
    }
}

/// Helper to create centered rectangle
pub fn centered_rect(percent_w: u16, percent_h: u16, area: Rect) -> Rect {
    let width = (area.width * percent_w) / 100;
    let height = (area.height * percent_h) / 100;
    centered_fixed(width, height, area)
}

fn centered_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect {
        x,
        y,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 50);
        assert_eq!(centered_rect(60, 50, area), Rect::new(20, 12, 60, 25));
        assert_eq!(centered_fixed(200, 3, Rect::new(0, 0, 10, 10)).width, 10);
    }

    #[test]
    fn test_overlay_draws_message() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 40, 9);
        let mut buf = Buffer::empty(area);
        LoadingOverlay::new("Loading...", &theme).render(area, &mut buf);

        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Loading..."));
    }
}
