//! Status line and function key bar

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use commander::controller::status::{StatusLevel, StatusLine};
use commander::fs::path::redact_credentials;
use commander::state::PaneState;
use commander::utils::{format_date, format_size};

use super::Theme;
use super::panel::truncate_name;

/// Shows the current status message, or details of the focused item when
/// there is none
pub struct StatusBar<'a> {
    status: &'a StatusLine,
    pane: &'a PaneState,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(status: &'a StatusLine, pane: &'a PaneState, theme: &'a Theme) -> Self {
        Self { status, pane, theme }
    }

    fn focused_info(&self) -> String {
        let Some(item) = self.pane.focused_item() else {
            return String::new();
        };
        if item.is_parent() {
            return format!(" {}", redact_credentials(&self.pane.current_path));
        }
        let size = if item.is_directory {
            "<DIR>".to_string()
        } else {
            format_size(item.size)
        };
        format!(" {}  {}  {}", item.name, size, format_date(item.modified))
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }
        let (text, style) = match self.status.current() {
            Some(message) if message.level == StatusLevel::Error => (
                format!(" {}", message.text),
                Style::default()
                    .bg(self.theme.status_error_bg)
                    .fg(self.theme.status_error_fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Some(message) => (
                format!(" {}", message.text),
                Style::default().bg(self.theme.status_bg).fg(self.theme.pane_header),
            ),
            None => (
                self.focused_info(),
                Style::default().bg(self.theme.status_bg).fg(self.theme.status_fg),
            ),
        };

        for x in area.x..area.x + area.width {
            buf[(x, area.y)].set_char(' ').set_style(style);
        }
        buf.set_string(area.x, area.y, truncate_name(&text, area.width as usize), style);
    }
}

const KEY_HINTS: &[(&str, &str)] = &[
    ("F2", "Rename"),
    ("F3", "Size"),
    ("F5", "Copy"),
    ("F6", "Move"),
    ("F7", "Mkdir"),
    ("F8", "Delete"),
    ("F9", "Compare"),
    ("^Z", "Zip"),
    ("/", "Filter"),
    ("q", "Quit"),
];

/// Bottom row of key hints
pub struct KeyBar<'a> {
    theme: &'a Theme,
}

impl<'a> KeyBar<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

impl Widget for KeyBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 || area.width == 0 {
            return;
        }
        let key_style = Style::default()
            .bg(self.theme.status_bg)
            .fg(self.theme.status_fg)
            .add_modifier(Modifier::BOLD);
        let label_style = Style::default()
            .bg(self.theme.key_hint_bg)
            .fg(self.theme.key_hint_fg);

        let slot = (area.width / KEY_HINTS.len() as u16).max(1);
        for (i, (key, label)) in KEY_HINTS.iter().enumerate() {
            let x = area.x + i as u16 * slot;
            if x >= area.x + area.width {
                break;
            }
            let width = slot.min(area.x + area.width - x) as usize;
            buf.set_string(x, area.y, truncate_name(key, width), key_style);
            let label_x = x + key.chars().count() as u16;
            let label_width = width.saturating_sub(key.chars().count());
            if label_width > 0 {
                let label = format!("{:<w$}", truncate_name(label, label_width), w = label_width);
                buf.set_string(label_x, area.y, label, label_style);
            }
        }
    }
}
