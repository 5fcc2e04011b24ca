//! The commander: owns both panes, the session and every in-flight backend
//! request, and turns user intents into backend calls.
//!
//! Quick requests (local listings, rename, mkdir) run on the caller's thread.
//! FTP and SMB listings and the long-running operations (copy, move, delete,
//! zip, compare, directory size) run on worker threads; their progress and
//! completion are applied by [`Commander::poll`], which the event loop calls
//! every tick. Late data is only applied if the dialog or pane load it
//! belongs to is still the current one.

mod navigation;
mod selection;
pub mod status;
mod transfer;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{
    Backend, BackendOp, BackendRequest, ProgressChannel, ProgressEvent, ProgressPayload, ProgressSink,
    RequestId, Service, TransferProgress, normalize,
};
use crate::background::{TaskEvent, TaskRunner};
use crate::compare::CompareDialog;
use crate::config::{Config, SettingsStore};
use crate::dir_size::SizeDialog;
use crate::errors::{OperationError, OperationResult};
use crate::fs::FileItem;
use crate::fs::path::{PathKind, path_kind, redact_credentials, smb_server};
use crate::operations::{FileOperationsHandler, OperationDescriptor, OperationKind};
use crate::pane_manager::PaneManager;
use crate::state::favorites::FavoritesService;
use crate::state::history::HistoryService;
use crate::state::{FileManagerSession, LoadState, PaneState, Side, SmbCredentials};

use navigation::ListingClimb;
use status::StatusLine;

/// Progress dialog of a running file operation
#[derive(Clone, Debug, PartialEq)]
pub struct OperationDialog {
    pub request_id: RequestId,
    pub kind: OperationKind,
    pub count: usize,
    /// Cleared when the operation starts, set by progress events
    pub progress: Option<TransferProgress>,
}

/// Credential prompt for an SMB share
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmbAuthDialog {
    pub side: Side,
    pub path: String,
    pub error: Option<String>,
}

/// The one modal dialog that can be open at a time
#[derive(Clone, Debug)]
pub enum Dialog {
    Operation(OperationDialog),
    Compare(CompareDialog),
    DirectorySize(SizeDialog),
    SmbAuth(SmbAuthDialog),
}

/// An in-progress drag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragSession {
    /// Started inside this app rather than dropped in from outside
    pub is_internal_drag: bool,
    /// Directory the dragged items live in
    pub source_path: String,
    pub dragged_paths: Vec<String>,
}

#[derive(Debug)]
struct OperationTicket {
    descriptor: OperationDescriptor,
    /// Directories whose panes are reloaded afterwards
    refresh_dirs: Vec<String>,
    clear_clipboard: bool,
}

#[derive(Debug)]
enum InFlight {
    Operation(OperationTicket),
    Compare,
    DirectorySize,
    Listing(Box<ListingClimb>),
}

fn listing_request(id: RequestId, path: &str, credentials: Option<SmbCredentials>) -> BackendRequest {
    let service = match path_kind(path) {
        PathKind::Ftp => Service::Ftp,
        PathKind::Smb | PathKind::Local => Service::FileOperations,
    };
    BackendRequest::new(
        id,
        service,
        BackendOp::List {
            path: path.to_string(),
            credentials,
        },
    )
}

/// List `path` through `backend` and decode the items
pub(crate) fn fetch_listing(
    backend: &dyn Backend,
    id: RequestId,
    path: &str,
    credentials: Option<SmbCredentials>,
) -> OperationResult<Vec<FileItem>> {
    let request = listing_request(id, path, credentials);
    let value = normalize(backend.execute(&request, &ProgressSink::detached()), &request.op)?;
    decode_listing(path, value)
}

/// Decode a listing payload. A `..` entry coming from the backend is dropped.
fn decode_listing(path: &str, value: Value) -> OperationResult<Vec<FileItem>> {
    let value = match value {
        Value::Object(mut map) => map
            .remove("items")
            .or_else(|| map.remove("files"))
            .unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    let items: Vec<FileItem> = serde_json::from_value(value)
        .map_err(|e| OperationError::Backend(format!("Malformed listing for '{}': {}", path, e)))?;
    Ok(items.into_iter().filter(|item| !item.is_parent()).collect())
}

fn system_opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

pub struct Commander {
    backend: Arc<dyn Backend>,
    store: Box<dyn SettingsStore>,
    config: Config,
    panes: PaneManager,
    session: FileManagerSession,
    operations: FileOperationsHandler,
    tasks: TaskRunner,
    in_flight: HashMap<RequestId, InFlight>,
    /// Newest background listing per pane
    listings: HashMap<Side, RequestId>,
    status: StatusLine,
    dialog: Option<Dialog>,
    drag: Option<DragSession>,
}

impl Commander {
    /// Build the commander and load both panes.
    ///
    /// `session` carries history, clipboard and favorites over from a
    /// previous mount; a fresh one is created from settings otherwise.
    /// `fallback_path` is used for a pane with no remembered path.
    pub fn mount(
        backend: Arc<dyn Backend>,
        store: Box<dyn SettingsStore>,
        session: Option<FileManagerSession>,
        fallback_path: &str,
    ) -> Self {
        let config = store.load();
        let paths = PaneManager::load_pane_paths(store.as_ref());
        let session = session.unwrap_or_else(|| {
            FileManagerSession::new(
                HistoryService::new(config.general.history_limit),
                FavoritesService::new(config.favorites.clone()),
            )
        });

        let pane_for = |path: Option<&str>| {
            let mut pane = PaneState::empty(path.unwrap_or(fallback_path));
            pane.sort_by = config.sorting.field;
            pane.sort_direction = config.sorting.direction;
            pane
        };
        let panes = PaneManager::new(pane_for(paths.left.as_deref()), pane_for(paths.right.as_deref()));

        let mut commander = Self {
            operations: FileOperationsHandler::new(Arc::clone(&backend)),
            tasks: TaskRunner::new(Arc::clone(&backend)),
            status: StatusLine::new(Duration::from_millis(config.general.status_timeout_ms)),
            backend,
            store,
            config,
            panes,
            session,
            in_flight: HashMap::new(),
            listings: HashMap::new(),
            dialog: None,
            drag: None,
        };
        commander.load_initial();
        commander
    }

    /// List both panes in parallel, then settle each result. Remote panes
    /// settle whenever their listing comes back.
    fn load_initial(&mut self) {
        let mut local = Vec::new();
        for side in [Side::Left, Side::Right] {
            let path = self.panes.pane(side).current_path.clone();
            let mut climb = ListingClimb::new(side, &path, None);
            climb.then.record_history = true;
            if navigation::lists_in_background(&path) {
                let _ = self.begin_listing(climb);
            } else {
                self.panes.pane_mut(side).load_state = LoadState::Loading;
                let id = self.tasks.next_request_id();
                let credentials = self.credentials_for(&path);
                local.push((climb, id, credentials));
            }
        }

        let backend = self.backend.as_ref();
        let panicked = || Err(OperationError::Backend("Listing failed unexpectedly".to_string()));
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = local
                .iter()
                .map(|(climb, id, credentials)| {
                    s.spawn(move || fetch_listing(backend, *id, &climb.current, credentials.clone()))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| panicked()))
                .collect()
        });

        for ((climb, _, _), result) in local.into_iter().zip(results) {
            let _ = self.settle_listing(climb, result);
        }
        info!(
            left = %redact_credentials(&self.panes.pane(Side::Left).current_path),
            right = %redact_credentials(&self.panes.pane(Side::Right).current_path),
            "commander mounted"
        );
    }

    /// Persist pane paths and hand the session back for the next mount
    pub fn unmount(mut self) -> FileManagerSession {
        self.persist_paths();
        if self.operations.is_busy() {
            info!("unmounting with an operation still running");
        }
        self.session
    }

    // Accessors

    pub fn panes(&self) -> &PaneManager {
        &self.panes
    }

    pub fn pane(&self, side: Side) -> &PaneState {
        self.panes.pane(side)
    }

    pub fn active_side(&self) -> Side {
        self.panes.active_side()
    }

    pub fn active_pane(&self) -> &PaneState {
        self.panes.get_active_pane()
    }

    pub fn session(&self) -> &FileManagerSession {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// A file operation is running
    pub fn is_busy(&self) -> bool {
        self.operations.is_busy()
    }

    pub fn set_active(&mut self, side: Side) {
        self.panes.set_active(side);
    }

    pub fn toggle_active(&mut self) {
        self.panes.toggle_active();
    }

    // Event processing

    /// Apply whatever the workers reported since the last call and expire
    /// the status line. Returns whether anything visible may have changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Some(event) = self.tasks.try_recv() {
            self.handle_event(event);
            changed = true;
        }
        let had_status = self.status.current().is_some();
        self.status.tick(Instant::now());
        changed || had_status != self.status.current().is_some()
    }

    /// Block until every background request has completed
    pub fn wait_idle(&mut self) {
        while let Some(event) = self.tasks.recv() {
            self.handle_event(event);
        }
    }

    /// Block until request `id` has completed
    pub fn wait_for(&mut self, id: RequestId) {
        while self.tasks.is_pending(id) {
            match self.tasks.recv() {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    fn handle_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Progress(progress) => self.apply_progress(progress),
            TaskEvent::Completed { id, response } => match self.in_flight.remove(&id) {
                Some(InFlight::Operation(ticket)) => self.complete_operation(id, ticket, response),
                Some(InFlight::Compare) => self.complete_compare(id, response),
                Some(InFlight::DirectorySize) => self.complete_directory_size(id, response),
                Some(InFlight::Listing(climb)) => self.complete_listing(id, *climb, response),
                None => debug!(id, "completion for unknown request"),
            },
        }
    }

    /// Route a progress event to the dialog it belongs to. Events without a
    /// request id are accepted only by a dialog still waiting on that channel.
    fn apply_progress(&mut self, event: ProgressEvent) {
        let is_current = |current: RequestId| event.request_id.is_none_or(|id| id == current);
        let accepted = match (&mut self.dialog, &event.payload) {
            (Some(Dialog::Operation(d)), ProgressPayload::Transfer(p))
                if d.kind.progress_channels().contains(&event.channel) && is_current(d.request_id) =>
            {
                d.progress = Some(p.clone());
                true
            }
            (Some(Dialog::Compare(d)), ProgressPayload::Transfer(p))
                if event.channel == ProgressChannel::Compare && d.waiting && is_current(d.request_id) =>
            {
                d.progress = Some(p.clone());
                true
            }
            (Some(Dialog::DirectorySize(d)), ProgressPayload::Size(p))
                if event.channel == ProgressChannel::DirectorySize
                    && d.request_id.is_some_and(is_current) =>
            {
                d.merge(p);
                true
            }
            _ => false,
        };
        if !accepted {
            debug!(
                channel = event.channel.event_name(),
                request = ?event.request_id,
                "discarding progress for a request that is no longer current"
            );
        }
    }

    /// Close whatever dialog is open. A running file operation is cancelled,
    /// a running size walk is abandoned.
    pub fn close_dialog(&mut self) {
        match self.dialog.take() {
            Some(Dialog::Operation(_)) => {
                self.operations.cancel_operation(None);
                self.status.info("Operation cancelled");
            }
            Some(Dialog::DirectorySize(d)) if d.is_computing() => {
                if let Some(token) = &d.cancel {
                    token.cancel();
                }
                // The global cancel would also hit a running file operation
                if !self.operations.is_busy() {
                    self.backend.cancel_current_operation();
                }
                debug!(path = %d.path, "directory size walk abandoned");
            }
            Some(Dialog::SmbAuth(d)) => self.abandon_smb_auth(d),
            _ => {}
        }
    }

    // Shared helpers

    fn credentials_for(&self, path: &str) -> Option<SmbCredentials> {
        smb_server(path).and_then(|server| self.session.smb_credentials(server).cloned())
    }

    /// Run a quick backend request on this thread
    fn run_quick(&mut self, service: Service, op: BackendOp) -> OperationResult<Value> {
        let request = BackendRequest::new(self.tasks.next_request_id(), service, op);
        debug!(id = request.id, operation = request.op.name(), "running request");
        normalize(
            self.backend.execute(&request, &ProgressSink::detached()),
            &request.op,
        )
    }

    /// Put an error on the status line and hand it back
    fn report<T>(&mut self, result: OperationResult<T>) -> OperationResult<T> {
        if let Err(e) = &result {
            self.status.error(e.to_string());
        }
        result
    }

    fn persist_paths(&mut self) {
        if let Err(e) = self.panes.save_pane_paths(&mut self.config, self.store.as_ref()) {
            warn!(error = %e, "could not save pane paths");
        }
    }

    fn persist_config(&mut self) {
        if let Err(e) = self.store.save(&self.config) {
            warn!(error = %e, "could not save settings");
            self.status.error(format!("Could not save settings: {}", e));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::MemorySettingsStore;

    /// Commander over a memory tree with the left pane at `left` and the
    /// right pane at `right`
    pub(crate) fn commander_at(backend: &Arc<MemoryBackend>, left: &str, right: &str) -> Commander {
        let mut config = Config::default();
        config.general.last_left_path = Some(left.to_string());
        config.general.last_right_path = Some(right.to_string());
        let store = MemorySettingsStore::new(config);
        Commander::mount(backend.clone(), Box::new(store), None, "/")
    }

    pub(crate) fn names(pane: &PaneState) -> Vec<&str> {
        pane.projection()
            .into_iter()
            .map(|i| pane.items[i].name.as_str())
            .collect()
    }

    #[test]
    fn test_mount_loads_both_panes() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a.txt", 1, None);
        backend.add_file("/r/b.txt", 2, None);
        let commander = commander_at(&backend, "/l", "/r");

        assert_eq!(names(commander.pane(Side::Left)), vec!["..", "a.txt"]);
        assert_eq!(names(commander.pane(Side::Right)), vec!["..", "b.txt"]);
        assert_eq!(commander.pane(Side::Left).load_state, LoadState::Loaded);
        assert_eq!(backend.requests_named("list").len(), 2);
    }

    #[test]
    fn test_root_has_no_parent_entry() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_dir("/etc");
        let commander = commander_at(&backend, "/", "/");
        assert_eq!(names(commander.pane(Side::Left)), vec!["etc"]);
    }

    #[test]
    fn test_unmount_returns_session_for_remount() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/f", 1, None);
        backend.add_dir("/r");
        let mut commander = commander_at(&backend, "/l", "/r");
        commander.move_focus(1, false);
        commander.copy_to_clipboard();
        let session = commander.unmount();
        assert!(session.clipboard().is_some());

        let store = MemorySettingsStore::default();
        let commander = Commander::mount(backend.clone(), Box::new(store), Some(session), "/");
        assert!(commander.session().clipboard().is_some());
    }

    #[test]
    fn test_stale_progress_is_discarded() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_dir("/l");
        backend.add_dir("/r");
        let mut commander = commander_at(&backend, "/l", "/r");
        commander.apply_progress(ProgressEvent {
            channel: ProgressChannel::Copy,
            request_id: Some(99),
            payload: ProgressPayload::Transfer(TransferProgress::new(1, 2, "x")),
        });
        assert!(commander.dialog().is_none());
    }

    #[test]
    fn test_status_timeout_from_settings() {
        let backend = Arc::new(MemoryBackend::new());
        let mut config = Config::default();
        config.general.status_timeout_ms = 10;
        let mut commander = Commander::mount(
            backend,
            Box::new(MemorySettingsStore::new(config)),
            None,
            "/",
        );
        commander.status.info("hello");
        std::thread::sleep(Duration::from_millis(30));
        assert!(commander.poll());
        assert!(commander.status().current().is_none());
    }
}
