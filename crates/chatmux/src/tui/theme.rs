use ratatui::style::{Color, Modifier, Style};

pub const SIDEBAR_WIDTH: u16 = 25;
/// Input box: one border row plus two text rows.
pub const INPUT_HEIGHT: u16 = 3;
/// Pane title row.
pub const TITLE_HEIGHT: u16 = 1;

/// Immutable styling table built once at startup.
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,
    pub border: Color,
    pub muted: Color,
    pub unread: Color,
    pub own_message: Color,
    pub their_message: Color,
    pub live: Color,
    pub degraded: Color,
    pub error: Color,
    pub vertical_divider: &'static str,
    pub horizontal_divider: &'static str,
    pub unread_marker: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Cyan,
            border: Color::Indexed(240),
            muted: Color::DarkGray,
            unread: Color::Indexed(220),
            own_message: Color::Indexed(39),
            their_message: Color::Reset,
            live: Color::Green,
            degraded: Color::Yellow,
            error: Color::Red,
            vertical_divider: "│",
            horizontal_divider: "─",
            unread_marker: "● ",
        }
    }
}

impl Theme {
    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.accent)
        } else {
            Style::default().fg(self.border)
        }
    }

    pub fn title_style(&self, focused: bool) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        if focused {
            style.fg(self.accent)
        } else {
            style
        }
    }

    pub fn selected_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn message_style(&self, from_me: bool) -> Style {
        if from_me {
            Style::default().fg(self.own_message)
        } else {
            Style::default().fg(self.their_message)
        }
    }
}
