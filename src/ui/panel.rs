//! Pane widget for displaying a directory listing

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, StatefulWidget, Widget},
};

use commander::fs::FileItem;
use commander::fs::path::{PathKind, path_kind, redact_credentials};
use commander::fs::sort::SortDirection;
use commander::state::{LoadState, PaneState};
use commander::utils::{format_date, format_size, format_size_short};

use super::Theme;

/// Height of the footer area (separator line + footer text line)
const FOOTER_HEIGHT: u16 = 2;

/// Scroll position of a pane, kept by the front-end between frames
#[derive(Clone, Copy, Debug, Default)]
pub struct PaneView {
    pub scroll_offset: usize,
    /// Rows available for items at the last render
    pub visible_height: usize,
}

impl PaneView {
    /// Keep `position` inside the visible window
    fn follow(&mut self, position: usize, rows: usize) {
        self.visible_height = rows;
        if rows == 0 {
            return;
        }
        if position < self.scroll_offset {
            self.scroll_offset = position;
        } else if position >= self.scroll_offset + rows {
            self.scroll_offset = position + 1 - rows;
        }
    }
}

pub struct PaneWidget<'a> {
    pane: &'a PaneState,
    is_active: bool,
    theme: &'a Theme,
}

impl<'a> PaneWidget<'a> {
    pub fn new(pane: &'a PaneState, is_active: bool, theme: &'a Theme) -> Self {
        Self {
            pane,
            is_active,
            theme,
        }
    }

    /// Format the pane path (replacing $HOME with ~, hiding passwords)
    fn format_path(&self) -> String {
        let path = redact_credentials(&self.pane.current_path);
        let display = match std::env::var("HOME") {
            Ok(home) => abbreviate_home(&path, &home),
            Err(_) => path,
        };
        format!(" {} ", display)
    }

    fn format_sort(&self) -> String {
        let arrow = match self.pane.sort_direction {
            SortDirection::Asc => '↑',
            SortDirection::Desc => '↓',
        };
        format!(" [{}{}] ", self.pane.sort_by.label(), arrow)
    }

    fn footer(&self) -> String {
        let pane = self.pane;
        let filter = if pane.filter_active && !pane.filter.is_empty() {
            format!("  filter: {}", pane.filter)
        } else {
            String::new()
        };
        let selected = pane.selected_items();
        if selected.is_empty() {
            format!(
                " {} files, {} dirs  {}{} ",
                pane.file_count(),
                pane.dir_count(),
                format_size(pane.total_size()),
                filter
            )
        } else {
            format!(
                " {} selected  {}{} ",
                selected.len(),
                format_size(pane.selected_size()),
                filter
            )
        }
    }

    fn render_message(&self, text: &str, style: Style, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let text = truncate_name(text, area.width as usize);
        buf.set_string(area.x + 1, area.y + area.height / 2, text, style);
    }

    fn render_items(&self, view: &mut PaneView, area: Rect, buf: &mut Buffer) {
        if area.height < 2 || area.width < 20 {
            return;
        }
        let size_width: usize = 7;
        let date_width: usize = 16;
        let name_width = (area.width as usize).saturating_sub(size_width + date_width + 2).max(8);

        let header = format!(
            "{:<name_w$} {:>size_w$} {:>date_w$}",
            "Name",
            "Size",
            "Modified",
            name_w = name_width,
            size_w = size_width,
            date_w = date_width,
        );
        buf.set_string(
            area.x,
            area.y,
            &header,
            Style::default()
                .fg(self.theme.pane_header)
                .add_modifier(Modifier::BOLD),
        );

        let rows = area.height.saturating_sub(1) as usize;
        let projection = self.pane.projection();
        let focus = PaneState::position_in(&projection, self.pane.focused_index).unwrap_or(0);
        view.follow(focus, rows);

        for (row, (position, &index)) in projection
            .iter()
            .enumerate()
            .skip(view.scroll_offset)
            .take(rows)
            .enumerate()
        {
            let item = &self.pane.items[index];
            let style = self.item_style(item, position == focus, self.pane.is_selected(index));
            let name = if item.is_directory && !item.is_parent() {
                format!("/{}", item.name)
            } else {
                item.name.clone()
            };
            let size = if item.is_directory {
                if item.is_parent() { "UP" } else { "<DIR>" }.to_string()
            } else {
                format_size_short(item.size)
            };
            let line = format!(
                "{:<name_w$} {:>size_w$} {:>date_w$}",
                truncate_name(&name, name_width),
                size,
                format_date(item.modified),
                name_w = name_width,
                size_w = size_width,
                date_w = date_width,
            );
            buf.set_string(area.x, area.y + 1 + row as u16, &line, style);
        }
    }

    fn item_style(&self, item: &FileItem, is_cursor: bool, is_marked: bool) -> Style {
        let theme = self.theme;
        let fg = if item.is_directory {
            theme.file_directory
        } else {
            theme.file_normal
        };
        let mut style = match (is_marked, is_cursor && self.is_active) {
            (true, true) => Style::default()
                .bg(theme.cursor_bg)
                .fg(theme.file_selected)
                .add_modifier(Modifier::BOLD),
            (true, false) => Style::default()
                .fg(theme.file_selected)
                .add_modifier(Modifier::BOLD),
            (false, true) => theme.cursor(),
            (false, false) => Style::default().fg(fg),
        };
        if item.is_directory {
            style = style.add_modifier(Modifier::BOLD);
        }
        style
    }
}

impl StatefulWidget for PaneWidget<'_> {
    type State = PaneView;

    fn render(self, area: Rect, buf: &mut Buffer, view: &mut Self::State) {
        let theme = self.theme;
        let pane_bg = match path_kind(&self.pane.current_path) {
            PathKind::Local => theme.pane_background,
            PathKind::Ftp | PathKind::Smb => theme.remote_pane_background,
        };
        let border_fg = if self.is_active {
            theme.pane_border_active
        } else {
            theme.pane_border_inactive
        };
        let path_style = if self.is_active {
            Style::default()
                .fg(ratatui::style::Color::White)
                .bg(theme.pane_header_bg)
        } else {
            Style::default().fg(theme.file_normal).bg(pane_bg)
        };
        let title = Line::from(vec![
            Span::styled(self.format_path(), path_style),
            Span::styled(self.format_sort(), Style::default().fg(theme.pane_header).bg(pane_bg)),
        ]);

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_fg).bg(pane_bg))
            .style(Style::default().bg(pane_bg));
        let inner = block.inner(area);
        block.render(area, buf);

        let content = Rect {
            height: inner.height.saturating_sub(FOOTER_HEIGHT),
            ..inner
        };
        match &self.pane.load_state {
            LoadState::Loading if self.pane.items.is_empty() => {
                self.render_message("Loading…", Style::default().fg(theme.file_normal), content, buf)
            }
            LoadState::Error(message) => {
                self.render_message(message, Style::default().fg(theme.dialog_error), content, buf)
            }
            LoadState::SmbAuthRequired { .. } if self.pane.items.is_empty() => self.render_message(
                "Credentials required",
                Style::default().fg(theme.dialog_error),
                content,
                buf,
            ),
            _ => self.render_items(view, content, buf),
        }

        if inner.height < FOOTER_HEIGHT {
            return;
        }
        let separator_y = inner.y + inner.height - FOOTER_HEIGHT;
        let footer_style = Style::default().fg(theme.file_normal).bg(pane_bg);
        for x in inner.x..inner.x + inner.width {
            buf[(x, separator_y)]
                .set_char('─')
                .set_style(Style::default().fg(theme.pane_border_inactive).bg(pane_bg));
        }
        let footer = truncate_name(&self.footer(), inner.width as usize);
        buf.set_string(inner.x, separator_y + 1, footer, footer_style);
    }
}

/// Truncate a name to fit within max_width (keeps the beginning)
/// Replace a leading home directory with `~`, only at a path component boundary
fn abbreviate_home(path: &str, home: &str) -> String {
    let home = home.trim_end_matches('/');
    if home.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(home) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{}", rest),
        _ => path.to_string(),
    }
}

pub fn truncate_name(name: &str, max_width: usize) -> String {
    if name.chars().count() <= max_width {
        name.to_string()
    } else if max_width <= 3 {
        name.chars().take(max_width).collect()
    } else {
        let mut result: String = name.chars().take(max_width - 1).collect();
        result.push('…');
        result
    }
}
