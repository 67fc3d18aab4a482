use ratatui::style::{Color, Modifier, Style};
use serde::{Deserialize, Serialize};

/// Theme selection from config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

/// Color scheme for the viewer
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,

    // General UI colors
    pub background: Color,
    pub foreground: Color,
    pub border: Color,
    pub border_focused: Color,
    pub title: Color,

    // Table colors
    pub header_fg: Color,
    pub header_bg: Color,
    pub selected_fg: Color,
    pub selected_bg: Color,
    pub row_alt_bg: Color, // For zebra striping
    pub total_fg: Color,

    // Heatmap scale endpoints
    pub heat_low: (u8, u8, u8),
    pub heat_high: (u8, u8, u8),

    // Status colors
    pub busy: Color,
    pub muted: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn from_name(name: ThemeName) -> Self {
        match name {
            ThemeName::Dark => Self::dark(),
            ThemeName::Light => Self::light(),
        }
    }

    pub fn dark() -> Self {
        Self {
            name: "Default Dark".to_string(),
            background: Color::Reset,
            foreground: Color::Gray,
            border: Color::DarkGray,
            border_focused: Color::Cyan,
            title: Color::White,
            header_fg: Color::Cyan,
            header_bg: Color::Reset,
            selected_fg: Color::Black,
            selected_bg: Color::Cyan,
            row_alt_bg: Color::Rgb(25, 25, 35),
            total_fg: Color::Yellow,
            heat_low: (30, 40, 60),
            heat_high: (200, 60, 60),
            busy: Color::Yellow,
            muted: Color::DarkGray,
            error: Color::Red,
        }
    }

    pub fn light() -> Self {
        Self {
            name: "Light".to_string(),
            background: Color::White,
            foreground: Color::Black,
            border: Color::Gray,
            border_focused: Color::Blue,
            title: Color::Black,
            header_fg: Color::Blue,
            header_bg: Color::Rgb(240, 240, 240),
            selected_fg: Color::White,
            selected_bg: Color::Blue,
            row_alt_bg: Color::Rgb(250, 250, 250),
            total_fg: Color::Rgb(160, 90, 0),
            heat_low: (255, 245, 235),
            heat_high: (230, 90, 60),
            busy: Color::Rgb(200, 150, 0),
            muted: Color::Gray,
            error: Color::Red,
        }
    }

    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.header_fg)
            .bg(self.header_bg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected_style(&self) -> Style {
        Style::default()
            .fg(self.selected_fg)
            .bg(self.selected_bg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn normal_style(&self) -> Style {
        Style::default().fg(self.foreground).bg(self.background)
    }

    pub fn alt_row_style(&self) -> Style {
        Style::default().fg(self.foreground).bg(self.row_alt_bg)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn focused_border_style(&self) -> Style {
        Style::default().fg(self.border_focused)
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub fn total_style(&self) -> Style {
        Style::default().fg(self.total_fg).add_modifier(Modifier::BOLD)
    }

    pub fn busy_style(&self) -> Style {
        Style::default().fg(self.busy).add_modifier(Modifier::BOLD)
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    /// Background for a heatmap cell; `intensity` is clamped to 0..=1
    pub fn heat_style(&self, intensity: f64) -> Style {
        let t = intensity.clamp(0.0, 1.0);
        let mix = |lo: u8, hi: u8| (lo as f64 + (hi as f64 - lo as f64) * t).round() as u8;
        let (lr, lg, lb) = self.heat_low;
        let (hr, hg, hb) = self.heat_high;
        Style::default()
            .fg(self.foreground)
            .bg(Color::Rgb(mix(lr, hr), mix(lg, hg), mix(lb, hb)))
    }
}
