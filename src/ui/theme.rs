//! Colors used by the terminal front-end

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    // Panes
    pub pane_border_active: Color,
    pub pane_border_inactive: Color,
    pub pane_header: Color,
    pub pane_header_bg: Color,
    pub pane_background: Color,
    pub remote_pane_background: Color,
    pub file_normal: Color,
    pub file_directory: Color,
    pub file_selected: Color,
    pub cursor_bg: Color,
    pub cursor_fg: Color,

    // Status bar
    pub status_bg: Color,
    pub status_fg: Color,
    pub status_error_bg: Color,
    pub status_error_fg: Color,
    pub key_hint_bg: Color,
    pub key_hint_fg: Color,

    // Dialogs
    pub dialog_bg: Color,
    pub dialog_border: Color,
    pub dialog_danger_bg: Color,
    pub dialog_danger_border: Color,
    pub dialog_title: Color,
    pub dialog_text: Color,
    pub dialog_error: Color,
    pub dialog_input_bg: Color,
    pub dialog_input_fg: Color,
    pub dialog_help: Color,
    pub progress_done: Color,
    pub progress_todo: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        let teal = Color::Rgb(0, 150, 136);
        let gold = Color::Rgb(200, 170, 100);
        let charcoal = Color::Rgb(58, 58, 58);
        let light = Color::Rgb(220, 220, 220);

        Self {
            pane_border_active: teal,
            pane_border_inactive: Color::Rgb(160, 160, 160),
            pane_header: gold,
            pane_header_bg: Color::Rgb(95, 135, 135),
            pane_background: charcoal,
            remote_pane_background: Color::Rgb(50, 58, 70),
            file_normal: light,
            file_directory: Color::Rgb(171, 175, 135),
            file_selected: Color::Rgb(255, 220, 80),
            cursor_bg: Color::Rgb(0, 95, 95),
            cursor_fg: light,

            status_bg: Color::Rgb(40, 44, 52),
            status_fg: Color::Rgb(171, 178, 191),
            status_error_bg: Color::Rgb(140, 40, 40),
            status_error_fg: Color::White,
            key_hint_bg: teal,
            key_hint_fg: Color::Black,

            dialog_bg: Color::Rgb(48, 52, 62),
            dialog_border: teal,
            dialog_danger_bg: Color::Rgb(80, 40, 40),
            dialog_danger_border: Color::Rgb(200, 80, 80),
            dialog_title: gold,
            dialog_text: light,
            dialog_error: Color::Rgb(255, 120, 120),
            dialog_input_bg: Color::Rgb(0, 95, 95),
            dialog_input_fg: Color::White,
            dialog_help: Color::Rgb(140, 140, 140),
            progress_done: teal,
            progress_todo: Color::Rgb(76, 82, 99),
        }
    }

    pub fn cursor(&self) -> Style {
        Style::default().bg(self.cursor_bg).fg(self.cursor_fg)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.dialog_title)
            .add_modifier(Modifier::BOLD)
    }
}
