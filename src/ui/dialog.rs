//! Modal dialogs: commander dialogs (operation progress, compare, size,
//! SMB login) and the front-end's own prompts

use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use commander::compare::{CompareDialog, CompareEntry};
use commander::config::FavoritePath;
use commander::controller::{Dialog, OperationDialog, SmbAuthDialog};
use commander::dir_size::SizeDialog;
use commander::fs::path::redact_credentials;
use commander::utils::format_size;

use super::Theme;
use super::dialog_helpers::{
    DialogStyles, center_rect, draw_frame, draw_help, draw_input, draw_line, draw_progress_bar,
};
use crate::app::{Prompt, SmbForm};

/// Renders whichever commander dialog is open
pub struct CommanderDialog<'a> {
    dialog: &'a Dialog,
    smb_form: Option<&'a SmbForm>,
    theme: &'a Theme,
}

impl<'a> CommanderDialog<'a> {
    pub fn new(dialog: &'a Dialog, smb_form: Option<&'a SmbForm>, theme: &'a Theme) -> Self {
        Self {
            dialog,
            smb_form,
            theme,
        }
    }
}

impl Widget for CommanderDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.dialog {
            Dialog::Operation(d) => render_operation(d, self.theme, area, buf),
            Dialog::Compare(d) => render_compare(d, self.theme, area, buf),
            Dialog::DirectorySize(d) => render_size(d, self.theme, area, buf),
            Dialog::SmbAuth(d) => {
                let empty = SmbForm::default();
                render_smb(d, self.smb_form.unwrap_or(&empty), self.theme, area, buf)
            }
        }
    }
}

fn render_operation(dialog: &OperationDialog, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let styles = DialogStyles::regular(theme);
    let rect = center_rect(area, 60, 8);
    let inner = draw_frame(rect, buf, dialog.kind.title(), &styles);

    draw_line(
        inner,
        buf,
        0,
        &format!("{} {} item(s)…", dialog.kind.title(), dialog.count),
        styles.text,
    );
    match &dialog.progress {
        Some(p) => {
            draw_line(inner, buf, 2, &p.file_name, styles.text);
            draw_progress_bar(inner, buf, 3, p.percentage, &styles);
        }
        None => draw_line(inner, buf, 2, "Preparing…", styles.help),
    }
    draw_help(inner, buf, "Esc cancel", &styles);
}

fn entry_line(marker: &str, entry: &CompareEntry) -> String {
    let size = |s: Option<u64>| s.map(format_size).unwrap_or_else(|| "-".to_string());
    if entry.is_directory {
        format!("{} {}/", marker, entry.relative_path)
    } else {
        format!(
            "{} {}  {} | {}",
            marker,
            entry.relative_path,
            size(entry.left_size),
            size(entry.right_size)
        )
    }
}

fn render_compare(dialog: &CompareDialog, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let styles = DialogStyles::regular(theme);
    let rect = center_rect(area, 90, area.height.saturating_sub(4).max(10));
    let title = if dialog.request.recursive {
        "Compare (recursive)"
    } else {
        "Compare"
    };
    let inner = draw_frame(rect, buf, title, &styles);

    draw_line(
        inner,
        buf,
        0,
        &format!(
            "{}  ⇄  {}",
            redact_credentials(&dialog.request.left_path),
            redact_credentials(&dialog.request.right_path)
        ),
        styles.text,
    );
    draw_line(inner, buf, 1, &dialog.status_text(), styles.title);
    if dialog.waiting {
        if let Some(p) = &dialog.progress
            && p.total > 0
        {
            draw_progress_bar(inner, buf, 3, p.percentage, &styles);
        }
    } else {
        let result = &dialog.result;
        let lines = result
            .only_in_left
            .iter()
            .map(|e| (entry_line("<", e), styles.text))
            .chain(result.only_in_right.iter().map(|e| (entry_line(">", e), styles.text)))
            .chain(result.different.iter().map(|e| (entry_line("≠", e), styles.error)));
        let rows = inner.height.saturating_sub(4);
        for (row, (line, style)) in lines.take(rows as usize).enumerate() {
            draw_line(inner, buf, 3 + row as u16, &line, style);
        }
    }
    draw_help(inner, buf, "r toggle recursive   Esc close", &styles);
}

fn render_size(dialog: &SizeDialog, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let styles = DialogStyles::regular(theme);
    let rect = center_rect(area, 60, 9);
    let inner = draw_frame(rect, buf, "Size", &styles);
    let totals = &dialog.totals;

    draw_line(inner, buf, 0, &dialog.name, styles.title);
    draw_line(
        inner,
        buf,
        2,
        &format!("{} ({} bytes)", format_size(totals.total_size), totals.total_size),
        styles.text,
    );
    draw_line(
        inner,
        buf,
        3,
        &format!("{} files, {} directories", totals.file_count, totals.directory_count),
        styles.text,
    );
    if dialog.is_computing() {
        let current = dialog.current_file.as_deref().unwrap_or("Counting…");
        draw_line(inner, buf, 4, current, styles.help);
    }
    draw_help(inner, buf, "Esc close", &styles);
}

fn render_smb(dialog: &SmbAuthDialog, form: &SmbForm, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let styles = DialogStyles::regular(theme);
    let rect = center_rect(area, 60, 10);
    let inner = draw_frame(rect, buf, "SMB login", &styles);

    draw_line(inner, buf, 0, &dialog.path, styles.text);
    let (user_style, password_style) = if form.on_password {
        (styles.text, styles.input)
    } else {
        (styles.input, styles.text)
    };
    draw_line(inner, buf, 2, "Username:", styles.text);
    let username_cursor = (!form.on_password).then(|| form.username.cursor());
    draw_input(inner, buf, 3, form.username.text(), username_cursor, user_style);
    draw_line(inner, buf, 4, "Password:", styles.text);
    let masked = "*".repeat(form.password.text().chars().count());
    let password_cursor = form.on_password.then(|| form.password.cursor());
    draw_input(inner, buf, 5, &masked, password_cursor, password_style);
    if let Some(error) = &dialog.error {
        draw_line(inner, buf, 6, error, styles.error);
    }
    draw_help(inner, buf, "Tab switch   Enter connect   Esc cancel", &styles);
}

/// Single text prompt
pub struct PromptDialog<'a> {
    prompt: &'a Prompt,
    theme: &'a Theme,
}

impl<'a> PromptDialog<'a> {
    pub fn new(prompt: &'a Prompt, theme: &'a Theme) -> Self {
        Self { prompt, theme }
    }
}

impl Widget for PromptDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let styles = DialogStyles::regular(self.theme);
        let rect = center_rect(area, 56, 6);
        let inner = draw_frame(rect, buf, &self.prompt.kind.title(), &styles);
        let field = &self.prompt.field;
        draw_input(inner, buf, 1, field.text(), Some(field.cursor()), styles.input);
        draw_help(inner, buf, "Enter confirm   Esc cancel", &styles);
    }
}

/// Delete confirmation
pub struct ConfirmDeleteDialog<'a> {
    count: usize,
    theme: &'a Theme,
}

impl<'a> ConfirmDeleteDialog<'a> {
    pub fn new(count: usize, theme: &'a Theme) -> Self {
        Self { count, theme }
    }
}

impl Widget for ConfirmDeleteDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let styles = DialogStyles::danger(self.theme);
        let rect = center_rect(area, 44, 6);
        let inner = draw_frame(rect, buf, "Delete", &styles);
        draw_line(inner, buf, 1, &format!("Delete {} item(s)?", self.count), styles.text);
        draw_help(inner, buf, "y / Enter delete   Esc cancel", &styles);
    }
}

/// Favorite directories to jump to
pub struct FavoritesDialog<'a> {
    entries: &'a [FavoritePath],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> FavoritesDialog<'a> {
    pub fn new(entries: &'a [FavoritePath], selected: usize, theme: &'a Theme) -> Self {
        Self {
            entries,
            selected,
            theme,
        }
    }
}

impl Widget for FavoritesDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let styles = DialogStyles::regular(self.theme);
        let height = (self.entries.len() as u16 + 4).clamp(6, area.height);
        let rect = center_rect(area, 64, height);
        let inner = draw_frame(rect, buf, "Favorites", &styles);
        if self.entries.is_empty() {
            draw_line(inner, buf, 0, "No favorites yet (Ctrl+D adds the current directory)", styles.help);
        }
        let rows = inner.height.saturating_sub(2) as usize;
        let skip = (self.selected + 1).saturating_sub(rows);
        for (row, (index, fav)) in self.entries.iter().enumerate().skip(skip).take(rows).enumerate() {
            let style = if index == self.selected { self.theme.cursor() } else { styles.text };
            draw_line(inner, buf, row as u16, &format!("{:<16} {}", fav.name, fav.path), style);
        }
        draw_help(inner, buf, "Enter go   J/K reorder   Del remove   Esc close", &styles);
    }
}
