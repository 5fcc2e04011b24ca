//! Input handling
//!
//! Keys go to the front-end overlay if one is open, then to the commander
//! dialog, and only then to the panes.

mod text_field;

pub use text_field::TextField;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use commander::controller::Dialog;

use crate::app::{App, Overlay, Prompt, PromptKind, SmbForm, settle};

/// Handle a key event
pub fn handle_key(app: &mut App, key: KeyEvent) {
    if let Some(overlay) = app.overlay.take() {
        handle_overlay(app, overlay, key);
        return;
    }
    match app.commander.dialog() {
        Some(Dialog::SmbAuth(_)) => handle_smb_auth(app, key),
        Some(Dialog::Operation(_)) => {
            if key.code == KeyCode::Esc {
                app.commander.cancel_operation();
            }
        }
        Some(Dialog::Compare(_)) => match key.code {
            KeyCode::Char('r') => settle(app.commander.toggle_compare_recursive()),
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.commander.close_dialog(),
            _ => {}
        },
        Some(Dialog::DirectorySize(_)) => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                app.commander.close_dialog();
            }
        }
        None => handle_normal(app, key),
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let commander = &mut app.commander;

    match key.code {
        KeyCode::Char('q') if !ctrl && !alt => app.should_quit = true,
        KeyCode::Tab => commander.toggle_active(),

        // History
        KeyCode::Left if alt => settle(commander.navigate_history_back()),
        KeyCode::Right if alt => settle(commander.navigate_history_forward()),

        // Focus
        KeyCode::Up => commander.move_focus(-1, shift),
        KeyCode::Down => commander.move_focus(1, shift),
        KeyCode::PageUp => {
            let page = app.page_size();
            app.commander.move_focus(-page, shift);
        }
        KeyCode::PageDown => {
            let page = app.page_size();
            app.commander.move_focus(page, shift);
        }
        KeyCode::Home => commander.focus_first(shift),
        KeyCode::End => commander.focus_last(shift),
        KeyCode::Insert | KeyCode::Char(' ') => commander.toggle_focused_selection(),

        KeyCode::Enter => settle(commander.activate_focused()),
        KeyCode::Backspace => settle(commander.navigate_up()),

        // File operations
        KeyCode::F(2) => {
            let name = match commander.active_pane().focused_item() {
                Some(item) if !item.is_parent() => item.name.clone(),
                _ => return,
            };
            app.open_prompt(PromptKind::Rename, &name);
        }
        KeyCode::F(3) => settle(commander.show_directory_size()),
        KeyCode::F(4) if shift => app.open_prompt(PromptKind::NewFile, ""),
        KeyCode::F(4) => {
            let extension = commander
                .active_pane()
                .focused_item()
                .filter(|item| !item.is_directory)
                .and_then(|item| item.extension().map(str::to_string));
            if let Some(extension) = extension {
                let current = commander.config().open_with_for(&extension).unwrap_or("").to_string();
                app.open_prompt(PromptKind::OpenWith { extension }, &current);
            }
        }
        KeyCode::F(5) => settle(commander.copy_to_other_pane()),
        KeyCode::F(6) => settle(commander.move_to_other_pane()),
        KeyCode::F(7) => app.open_prompt(PromptKind::Mkdir, ""),
        KeyCode::F(8) | KeyCode::Delete => {
            let count = commander.active_pane().target_items().len();
            if count > 0 {
                app.overlay = Some(Overlay::ConfirmDelete { count });
            }
        }
        KeyCode::F(9) => settle(commander.handle_compare(false)),

        // Clipboard
        KeyCode::Char('c') if ctrl => commander.copy_to_clipboard(),
        KeyCode::Char('x') if ctrl => commander.cut_to_clipboard(),
        KeyCode::Char('v') if ctrl => settle(commander.paste()),
        KeyCode::Char('p') if ctrl => settle(commander.copy_focused_path_to_system_clipboard()),

        // Pane state
        KeyCode::Char('s') if ctrl => commander.cycle_sort_field(),
        KeyCode::Char('r') | KeyCode::Char('R') if ctrl && shift => commander.refresh_all(),
        KeyCode::Char('r') if ctrl => {
            let side = commander.active_side();
            settle(commander.refresh(side));
        }
        KeyCode::Char('u') if ctrl => commander.swap_panes(),
        KeyCode::Char('o') if ctrl => settle(commander.sync_inactive_to_active()),
        KeyCode::Char('a') if ctrl => commander.select_all(),
        KeyCode::Char('/') => {
            let filter = commander.active_pane().filter.clone();
            app.open_prompt(PromptKind::Filter, &filter);
        }
        KeyCode::Char('+') => app.open_prompt(PromptKind::SelectPattern, "*"),
        KeyCode::Char('*') => commander.invert_selection(),
        KeyCode::Char('-') => commander.clear_selection(),
        KeyCode::Esc => {
            if commander.active_pane().filter_active {
                commander.clear_filter();
            } else {
                commander.cancel_drag();
            }
        }

        KeyCode::Char('z') if ctrl => app.open_prompt(PromptKind::Zip, "archive.zip"),
        KeyCode::Char('d') if ctrl => app.open_prompt(PromptKind::AddFavorite, ""),
        KeyCode::Char('f') if ctrl => app.overlay = Some(Overlay::Favorites { selected: 0 }),
        _ => {}
    }
}

fn handle_overlay(app: &mut App, overlay: Overlay, key: KeyEvent) {
    match overlay {
        Overlay::Prompt(mut prompt) => match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => submit_prompt(app, prompt),
            _ => {
                prompt.field.handle_key(&key);
                if prompt.kind == PromptKind::Filter {
                    app.commander.set_filter(prompt.field.text());
                }
                app.overlay = Some(Overlay::Prompt(prompt));
            }
        },
        Overlay::ConfirmDelete { count } => match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => settle(app.commander.delete_targets()),
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {}
            _ => app.overlay = Some(Overlay::ConfirmDelete { count }),
        },
        Overlay::Favorites { selected } => handle_favorites(app, selected, key),
    }
}

fn submit_prompt(app: &mut App, prompt: Prompt) {
    let text = prompt.field.text().to_string();
    let commander = &mut app.commander;
    match prompt.kind {
        PromptKind::Filter => commander.set_filter(&text),
        PromptKind::Rename => settle(commander.rename_focused(&text)),
        PromptKind::Mkdir => settle(commander.create_directory(&text)),
        PromptKind::NewFile => settle(commander.create_file(&text)),
        PromptKind::Zip => settle(commander.zip_targets(&text)),
        PromptKind::AddFavorite => {
            commander.add_current_to_favorites(&text);
        }
        PromptKind::SelectPattern => settle(commander.select_matching(&text)),
        PromptKind::OpenWith { extension } => {
            if text.trim().is_empty() {
                commander.remove_open_with(&extension);
            } else {
                settle(commander.set_open_with(&extension, &text));
            }
        }
    }
}

fn handle_favorites(app: &mut App, selected: usize, key: KeyEvent) {
    let count = app.commander.session().favorites.len();
    let selected = selected.min(count.saturating_sub(1));
    let path = app
        .commander
        .session()
        .favorites
        .get(selected)
        .map(|f| f.path.clone());

    let next = match key.code {
        KeyCode::Esc => None,
        KeyCode::Enter => {
            if path.is_some() {
                settle(app.commander.navigate_to_favorite(selected));
            }
            None
        }
        KeyCode::Up => Some(selected.saturating_sub(1)),
        KeyCode::Down => Some((selected + 1).min(count.saturating_sub(1))),
        KeyCode::Char('K') => {
            if let Some(path) = &path
                && app.commander.move_favorite(path, -1)
            {
                Some(selected - 1)
            } else {
                Some(selected)
            }
        }
        KeyCode::Char('J') => {
            if let Some(path) = &path
                && app.commander.move_favorite(path, 1)
            {
                Some(selected + 1)
            } else {
                Some(selected)
            }
        }
        KeyCode::Delete => {
            if let Some(path) = &path {
                app.commander.remove_favorite(path);
            }
            Some(selected)
        }
        _ => Some(selected),
    };
    if let Some(selected) = next {
        app.overlay = Some(Overlay::Favorites { selected });
    }
}

fn handle_smb_auth(app: &mut App, key: KeyEvent) {
    let form = app.smb_form.get_or_insert_with(SmbForm::default);
    match key.code {
        KeyCode::Esc => {
            app.smb_form = None;
            app.commander.cancel_smb_auth();
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.on_password = !form.on_password,
        KeyCode::Enter if !form.on_password => form.on_password = true,
        KeyCode::Enter => {
            let username = form.username.text().to_string();
            let password = form.password.text().to_string();
            form.password.clear();
            settle(app.commander.submit_smb_credentials(&username, &password));
            if !matches!(app.commander.dialog(), Some(Dialog::SmbAuth(_))) {
                app.smb_form = None;
            }
        }
        _ => {
            if form.on_password {
                form.password.handle_key(&key);
            } else {
                form.username.handle_key(&key);
            }
        }
    }
}
