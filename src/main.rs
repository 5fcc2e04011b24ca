//! cmdr - dual-pane terminal file manager

use std::io::{self, stdout};
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseButton, MouseEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use commander::backend::LocalBackend;
use commander::config::{MemorySettingsStore, SettingsStore, TomlSettingsStore, config_dir};
use commander::controller::Commander;
use commander::state::Side;

mod app;
mod input;
mod ui;

use app::{App, Overlay};
use ui::{CommanderDialog, ConfirmDeleteDialog, FavoritesDialog, KeyBar, PaneWidget, PromptDialog, StatusBar};

/// Set up panic hook to restore terminal on panic
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

/// Log to a daily file under the config directory; the terminal belongs to the UI
fn init_logging() -> Option<WorkerGuard> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::daily(&dir, "cmdr.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
    Ok(())
}

fn start_path() -> String {
    std::env::current_dir()
        .ok()
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string())
}

fn settings_store() -> Box<dyn SettingsStore> {
    match TomlSettingsStore::default_location() {
        Ok(store) => Box::new(store),
        Err(e) => {
            error!(error = %e, "settings will not be saved");
            Box::new(MemorySettingsStore::default())
        }
    }
}

fn pane_rects(area: Rect) -> (Rect, Rect, Rect, Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
        .split(area);
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
    (panes[0], panes[1], rows[1], rows[2])
}

fn draw(frame: &mut Frame, app: &mut App) {
    let (left, right, status, keys) = pane_rects(frame.area());
    let active = app.commander.active_side();
    let theme = &app.theme;
    let [left_view, right_view] = &mut app.views;

    frame.render_stateful_widget(
        PaneWidget::new(app.commander.pane(Side::Left), active == Side::Left, theme),
        left,
        left_view,
    );
    frame.render_stateful_widget(
        PaneWidget::new(app.commander.pane(Side::Right), active == Side::Right, theme),
        right,
        right_view,
    );
    frame.render_widget(
        StatusBar::new(app.commander.status(), app.commander.active_pane(), theme),
        status,
    );
    frame.render_widget(KeyBar::new(theme), keys);

    let area = frame.area();
    if let Some(dialog) = app.commander.dialog() {
        frame.render_widget(CommanderDialog::new(dialog, app.smb_form.as_ref(), theme), area);
    }
    match &app.overlay {
        Some(Overlay::Prompt(prompt)) => frame.render_widget(PromptDialog::new(prompt, theme), area),
        Some(Overlay::ConfirmDelete { count }) => frame.render_widget(ConfirmDeleteDialog::new(*count, theme), area),
        Some(Overlay::Favorites { selected }) => frame.render_widget(
            FavoritesDialog::new(app.commander.session().favorites.entries(), *selected, theme),
            area,
        ),
        None => {}
    }
}

/// Click focuses a pane row; a second click on the focused row activates it
fn handle_click(app: &mut App, area: Rect, column: u16, row: u16) {
    if app.overlay.is_some() || app.commander.dialog().is_some() {
        return;
    }
    let (left, right, _, _) = pane_rects(area);
    let (side, rect, view) = if left.contains((column, row).into()) {
        (Side::Left, left, app.views[0])
    } else if right.contains((column, row).into()) {
        (Side::Right, right, app.views[1])
    } else {
        return;
    };
    app.commander.set_active(side);

    // Border and column header sit above the first item row
    let first_row = rect.y + 2;
    if row < first_row || (row - first_row) as usize >= view.visible_height {
        return;
    }
    let position = view.scroll_offset + (row - first_row) as usize;
    let pane = app.commander.active_pane();
    let already_focused = pane
        .projection()
        .get(position)
        .is_some_and(|&index| index == pane.focused_index);
    if already_focused {
        app::settle(app.commander.activate_focused());
    } else {
        app.commander.focus_row(position);
    }
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let mut dirty = true;
    loop {
        if dirty {
            terminal.draw(|frame| draw(frame, app))?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key(app, key),
                Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                    let size = terminal.size()?;
                    handle_click(app, Rect::new(0, 0, size.width, size.height), mouse.column, mouse.row);
                }
                Event::Mouse(mouse) if mouse.kind == MouseEventKind::ScrollDown => app.commander.move_focus(3, false),
                Event::Mouse(mouse) if mouse.kind == MouseEventKind::ScrollUp => app.commander.move_focus(-3, false),
                _ => {}
            }
            dirty = true;
        }
        if app.poll() {
            dirty = true;
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

fn main() -> io::Result<()> {
    let _log_guard = init_logging();
    setup_panic_hook();

    let backend = Arc::new(LocalBackend::new());
    let commander = Commander::mount(backend, settings_store(), None, &start_path());
    let mut app = App::new(commander);

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut app);
    restore_terminal()?;

    let session = app.commander.unmount();
    info!(favorites = session.favorites.len(), "cmdr exited");
    result
}
