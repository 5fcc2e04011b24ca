//! Drawing primitives shared by the dialogs

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Clear, Widget},
};

use super::Theme;
use super::panel::truncate_name;

/// Styles of one dialog, derived from the theme and its frame colors
pub struct DialogStyles {
    pub border: Style,
    pub title: Style,
    pub text: Style,
    pub error: Style,
    pub input: Style,
    pub help: Style,
    pub bar_done: Style,
    pub bar_todo: Style,
}

impl DialogStyles {
    pub fn new(theme: &Theme, bg: Color, border: Color) -> Self {
        Self {
            border: Style::default().fg(border).bg(bg),
            title: theme.title().bg(bg),
            text: Style::default().fg(theme.dialog_text).bg(bg),
            error: Style::default().fg(theme.dialog_error).bg(bg),
            input: Style::default().fg(theme.dialog_input_fg).bg(theme.dialog_input_bg),
            help: Style::default().fg(theme.dialog_help).bg(bg),
            bar_done: Style::default().fg(theme.progress_done).bg(bg),
            bar_todo: Style::default().fg(theme.progress_todo).bg(bg),
        }
    }

    pub fn regular(theme: &Theme) -> Self {
        Self::new(theme, theme.dialog_bg, theme.dialog_border)
    }

    pub fn danger(theme: &Theme) -> Self {
        Self::new(theme, theme.dialog_danger_bg, theme.dialog_danger_border)
    }
}

/// Centered rectangle of the requested size, shrunk to fit the screen
pub fn center_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height);
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

/// Clear `area`, draw a titled frame and return the inner content area
pub fn draw_frame(area: Rect, buf: &mut Buffer, title: &str, styles: &DialogStyles) -> Rect {
    Clear.render(area, buf);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles.border)
        .style(styles.border)
        .title(Span::styled(format!(" {} ", title), styles.title))
        .title_alignment(ratatui::layout::Alignment::Center);
    let inner = block.inner(area);
    block.render(area, buf);
    Rect {
        x: inner.x + 1,
        width: inner.width.saturating_sub(2),
        ..inner
    }
}

/// One line of text at `row` of `inner`, truncated to fit
pub fn draw_line(inner: Rect, buf: &mut Buffer, row: u16, text: &str, style: Style) {
    if row >= inner.height {
        return;
    }
    buf.set_string(inner.x, inner.y + row, truncate_name(text, inner.width as usize), style);
}

/// Text input box; long text is shown by its tail so the cursor stays visible.
/// The cursor is drawn only for the focused field.
pub fn draw_input(inner: Rect, buf: &mut Buffer, row: u16, text: &str, cursor: Option<usize>, style: Style) {
    if row >= inner.height || inner.width < 2 {
        return;
    }
    let y = inner.y + row;
    let width = inner.width as usize;
    for x in inner.x..inner.x + inner.width {
        buf[(x, y)].set_char(' ').set_style(style);
    }
    let anchor = cursor.unwrap_or(0);
    let skip = (anchor + 1).saturating_sub(width);
    let visible: String = text.chars().skip(skip).take(width).collect();
    buf.set_string(inner.x, y, &visible, style);
    if let Some(cursor) = cursor {
        let cursor_x = inner.x + (cursor - skip) as u16;
        buf[(cursor_x, y)].set_style(style.add_modifier(Modifier::REVERSED));
    }
}

/// Horizontal progress bar filled to `percentage` (0..=100)
pub fn draw_progress_bar(inner: Rect, buf: &mut Buffer, row: u16, percentage: f64, styles: &DialogStyles) {
    if row >= inner.height {
        return;
    }
    let label = format!(" {:>3.0}%", percentage.clamp(0.0, 100.0));
    let bar_width = (inner.width as usize).saturating_sub(label.len());
    let filled = filled_cells(percentage, bar_width);
    let y = inner.y + row;
    buf.set_string(inner.x, y, "█".repeat(filled), styles.bar_done);
    buf.set_string(inner.x + filled as u16, y, "░".repeat(bar_width - filled), styles.bar_todo);
    buf.set_string(inner.x + bar_width as u16, y, label, styles.text);
}

fn filled_cells(percentage: f64, width: usize) -> usize {
    ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize
}

/// Key help on the last row of the dialog
pub fn draw_help(inner: Rect, buf: &mut Buffer, text: &str, styles: &DialogStyles) {
    if inner.height == 0 {
        return;
    }
    let width = text.chars().count() as u16;
    let x = inner.x + inner.width.saturating_sub(width) / 2;
    buf.set_string(x, inner.y + inner.height - 1, text, styles.help);
}
