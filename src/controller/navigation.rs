//! Directory loading, navigation and per-pane view settings

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{
    Commander, Dialog, InFlight, SmbAuthDialog, decode_listing, fetch_listing, listing_request, system_opener,
};
use crate::backend::{BackendOp, RawResponse, RequestId, Service, normalize};
use crate::errors::{OperationError, OperationResult};
use crate::fs::FileItem;
use crate::fs::path::{
    PathKind, get_parent_path, is_root, last_segment, normalize_for_compare, path_kind, redact_credentials,
    same_directory, smb_server,
};
use crate::fs::sort::SortField;
use crate::pane_manager::PaneUpdate;
use crate::state::{LoadState, Side, SmbCredentials};

/// Applied once the requested directory is showing
#[derive(Debug, Default)]
pub(super) struct AfterListing {
    pub(super) record_history: bool,
    pub(super) status: Option<String>,
}

/// A pane load in progress. Carries the climb toward a listable ancestor
/// across background round-trips.
#[derive(Debug)]
pub(super) struct ListingClimb {
    side: Side,
    requested: String,
    pub(super) current: String,
    focus: Option<String>,
    visited: HashSet<String>,
    first_error: Option<OperationError>,
    /// Re-list the pane keeping selection and focus
    in_place: bool,
    pub(super) then: AfterListing,
}

impl ListingClimb {
    pub(super) fn new(side: Side, path: &str, previous_path: Option<&str>) -> Self {
        Self {
            side,
            requested: path.to_string(),
            current: path.to_string(),
            focus: previous_path.map(|p| last_segment(p).to_string()),
            visited: HashSet::from([normalize_for_compare(path)]),
            first_error: None,
            in_place: false,
            then: AfterListing::default(),
        }
    }
}

/// FTP and SMB listings go to a worker thread
pub(super) fn lists_in_background(path: &str) -> bool {
    path_kind(path) != PathKind::Local
}

impl Commander {
    fn list(&mut self, path: &str) -> OperationResult<Vec<FileItem>> {
        let id = self.tasks.next_request_id();
        let credentials = self.credentials_for(path);
        debug!(id, path = %redact_credentials(path), "listing");
        fetch_listing(self.backend.as_ref(), id, path, credentials)
    }

    /// Load `path` into `side`.
    ///
    /// `previous_path` is the directory being left; when its final segment
    /// names an entry of the new listing, focus lands there. A path that
    /// cannot be listed is replaced by its nearest listable ancestor.
    /// Remote paths return right away and settle on a later [`Commander::poll`].
    pub fn load_directory(&mut self, side: Side, path: &str, previous_path: Option<&str>) -> OperationResult<()> {
        self.begin_listing(ListingClimb::new(side, path, previous_path))
    }

    /// Start `climb`. Any listing still running for the same pane is superseded.
    pub(super) fn begin_listing(&mut self, climb: ListingClimb) -> OperationResult<()> {
        self.listings.remove(&climb.side);
        if !climb.in_place {
            self.panes.pane_mut(climb.side).load_state = LoadState::Loading;
        }
        if lists_in_background(&climb.current) {
            self.spawn_listing(climb);
            return Ok(());
        }
        let first = self.list(&climb.current);
        self.settle_listing(climb, first)
    }

    fn spawn_listing(&mut self, climb: ListingClimb) {
        let id = self.tasks.next_request_id();
        let credentials = self.credentials_for(&climb.current);
        debug!(id, path = %redact_credentials(&climb.current), "listing in background");
        let request = listing_request(id, &climb.current, credentials);
        self.listings.insert(climb.side, id);
        self.in_flight.insert(id, InFlight::Listing(Box::new(climb)));
        self.tasks.spawn(request);
    }

    pub(super) fn complete_listing(&mut self, id: RequestId, climb: ListingClimb, response: RawResponse) {
        if self.listings.get(&climb.side) != Some(&id) {
            debug!(id, "discarding superseded listing");
            return;
        }
        self.listings.remove(&climb.side);
        let op = BackendOp::List {
            path: climb.current.clone(),
            credentials: None,
        };
        let result = normalize(response, &op).and_then(|value| decode_listing(&climb.current, value));
        let _ = self.settle_listing(climb, result);
    }

    /// Install `attempt` or climb toward the root until a listing succeeds.
    /// Each ancestor is tried at most once, and a root is its own parent,
    /// so the climb ends after at most `depth` retries.
    pub(super) fn settle_listing(
        &mut self,
        mut climb: ListingClimb,
        attempt: OperationResult<Vec<FileItem>>,
    ) -> OperationResult<()> {
        let mut attempt = attempt;
        loop {
            match attempt {
                Ok(items) => {
                    self.show_listing(climb, items);
                    return Ok(());
                }
                Err(OperationError::AuthRequired { .. }) => {
                    self.request_smb_auth(climb.side, &climb.current);
                    return Err(OperationError::AuthRequired { path: climb.current });
                }
                Err(e) => {
                    let transient = OperationError::TransientListing {
                        path: redact_credentials(&climb.current),
                        message: e.to_string(),
                    };
                    let parent = get_parent_path(&climb.current);
                    if parent == climb.current || !climb.visited.insert(normalize_for_compare(&parent)) {
                        let terminal = OperationError::Terminal {
                            path: redact_credentials(&climb.requested),
                            message: e.to_string(),
                        };
                        error!(path = %redact_credentials(&climb.requested), error = %e, "no listable ancestor");
                        self.fail_pane(climb.side, &climb.current, &terminal);
                        return Err(terminal);
                    }
                    warn!(error = %transient, parent = %redact_credentials(&parent), "listing failed, trying parent");
                    climb.first_error.get_or_insert(transient);
                    climb.focus = Some(last_segment(&climb.current).to_string());
                    climb.current = parent;
                    if lists_in_background(&climb.current) {
                        self.spawn_listing(climb);
                        return Ok(());
                    }
                    attempt = self.list(&climb.current);
                }
            }
        }
    }

    fn show_listing(&mut self, climb: ListingClimb, items: Vec<FileItem>) {
        let side = climb.side;
        if climb.in_place && climb.first_error.is_none() {
            let items = Self::with_parent_entry(&climb.current, items);
            let pane = self.panes.pane_mut(side);
            pane.refresh_items(items);
            if let Some(index) = climb.focus.as_deref().and_then(|name| pane.item_index_by_name(name)) {
                pane.focused_index = index;
                pane.sanitize();
            }
            pane.load_state = LoadState::Loaded;
        } else {
            self.install_listing(side, &climb.current, items, climb.focus.as_deref());
        }

        match (&climb.first_error, climb.then.status) {
            (Some(e), _) => self
                .status
                .error(format!("{}, showing {}", e, redact_credentials(&climb.current))),
            (None, Some(message)) => self.status.info(message),
            (None, None) => {}
        }
        if climb.then.record_history {
            self.session.history.add_to_history(side, &climb.current);
        }
        let answered = |d: &SmbAuthDialog| d.side == side && same_directory(&d.path, &climb.requested);
        if matches!(&self.dialog, Some(Dialog::SmbAuth(d)) if answered(d)) {
            self.dialog = None;
        }
    }

    fn with_parent_entry(path: &str, mut items: Vec<FileItem>) -> Vec<FileItem> {
        if !is_root(path) {
            items.insert(0, FileItem::parent_entry(&get_parent_path(path)));
        }
        items
    }

    fn install_listing(&mut self, side: Side, path: &str, items: Vec<FileItem>, focus_name: Option<&str>) {
        let items = Self::with_parent_entry(path, items);
        let pane = self.panes.pane_mut(side);
        if !same_directory(&pane.current_path, path) {
            pane.filter.clear();
            pane.filter_active = false;
        }
        pane.current_path = path.to_string();
        pane.replace_items(items, focus_name);
        pane.load_state = LoadState::Loaded;
        self.persist_paths();
    }

    /// Leave the pane empty but renderable after a terminal failure
    fn fail_pane(&mut self, side: Side, path: &str, err: &OperationError) {
        let pane = self.panes.pane_mut(side);
        pane.current_path = path.to_string();
        pane.replace_items(Vec::new(), None);
        pane.load_state = LoadState::Error(err.to_string());
        self.status.error(err.to_string());
    }

    /// Re-list a pane in place, keeping selection and focus by path
    pub fn refresh(&mut self, side: Side) -> OperationResult<()> {
        self.reload(side, None)
    }

    /// Re-list a pane in place, then focus `focus_name` if it is listed
    pub(super) fn reload(&mut self, side: Side, focus_name: Option<&str>) -> OperationResult<()> {
        let path = self.panes.pane(side).current_path.clone();
        let mut climb = ListingClimb::new(side, &path, None);
        climb.in_place = true;
        climb.focus = focus_name.map(str::to_string);
        self.begin_listing(climb)
    }

    pub fn refresh_all(&mut self) {
        for side in [Side::Left, Side::Right] {
            let _ = self.refresh(side);
        }
    }

    fn go(&mut self, path: &str, previous_path: Option<&str>, status: Option<String>) -> OperationResult<()> {
        let side = self.panes.active_side();
        let current = self.panes.pane(side).current_path.clone();
        self.session.history.add_to_history(side, &current);
        let mut climb = ListingClimb::new(side, path, previous_path);
        climb.then = AfterListing {
            record_history: true,
            status,
        };
        self.begin_listing(climb)
    }

    /// Open `path` in the active pane and record it in history
    pub fn navigate_to_directory(&mut self, path: &str) -> OperationResult<()> {
        self.go(path, None, None)
    }

    /// Open `path` in the active pane without touching history
    pub fn navigate_without_history(&mut self, path: &str) -> OperationResult<()> {
        let side = self.panes.active_side();
        self.load_directory(side, path, None)
    }

    pub fn navigate_up(&mut self) -> OperationResult<()> {
        let current = self.panes.get_active_pane().current_path.clone();
        if is_root(&current) {
            self.status.info("Already at the top level");
            return Ok(());
        }
        let parent = get_parent_path(&current);
        let status = format!("Up to {}", redact_credentials(&parent));
        self.go(&parent, Some(&current), Some(status))
    }

    pub fn navigate_history_back(&mut self) -> OperationResult<()> {
        self.navigate_history(-1)
    }

    pub fn navigate_history_forward(&mut self) -> OperationResult<()> {
        self.navigate_history(1)
    }

    fn navigate_history(&mut self, delta: isize) -> OperationResult<()> {
        let side = self.panes.active_side();
        let Some(step) = self.session.history.navigate(side, delta) else {
            self.status.info(if delta < 0 {
                "No previous directory"
            } else {
                "No next directory"
            });
            return Ok(());
        };
        let mut climb = ListingClimb::new(side, &step.path, None);
        climb.then.status = Some(step.message);
        self.begin_listing(climb)
    }

    /// Enter the focused directory or open the focused file
    pub fn activate_focused(&mut self) -> OperationResult<()> {
        let Some(item) = self.panes.get_active_pane().focused_item().cloned() else {
            return Ok(());
        };
        if item.is_parent() {
            return self.navigate_up();
        }
        if item.is_directory {
            return self.navigate_to_directory(&item.path);
        }
        self.open_file(&item)
    }

    /// Open a file with its registered application, else the system default
    pub fn open_file(&mut self, item: &FileItem) -> OperationResult<()> {
        let op = match item.extension().and_then(|ext| self.config.open_with_for(ext)) {
            Some(app) => BackendOp::OpenWithApp {
                path: item.path.clone(),
                app: app.to_string(),
            },
            None => BackendOp::ExecuteCommand {
                command: system_opener().to_string(),
                args: vec![item.path.clone()],
            },
        };
        let result = self.run_quick(Service::FileOperations, op);
        let result = self.report(result);
        if result.is_ok() {
            self.status.info(format!("Opened {}", item.name));
        }
        result.map(|_| ())
    }

    /// Register `app` for files with `extension`
    pub fn set_open_with(&mut self, extension: &str, app: &str) -> OperationResult<()> {
        let extension = extension.trim().trim_start_matches('.').to_lowercase();
        if extension.is_empty() || app.trim().is_empty() {
            return self.report(Err(OperationError::Validation(
                "Extension and application are required".to_string(),
            )));
        }
        self.config.open_with.insert(extension.clone(), app.trim().to_string());
        self.persist_config();
        self.status.info(format!(".{} files open with {}", extension, app.trim()));
        Ok(())
    }

    pub fn remove_open_with(&mut self, extension: &str) -> bool {
        let extension = extension.trim().trim_start_matches('.').to_lowercase();
        let removed = self.config.open_with.remove(&extension).is_some();
        if removed {
            self.persist_config();
        }
        removed
    }

    /// Roots offered by the backend (drive letters, `/`)
    pub fn list_drives(&mut self) -> OperationResult<Vec<String>> {
        let result = self.run_quick(Service::FileOperations, BackendOp::DriveInfo);
        let value = self.report(result)?;
        let drives = value
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match entry {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(obj) => ["path", "name", "mount"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(Value::as_str))
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(drives)
    }

    // Favorites

    /// Add the active pane's directory to favorites
    pub fn add_current_to_favorites(&mut self, name: &str) -> bool {
        let path = self.panes.get_active_pane().current_path.clone();
        if !self.session.favorites.add(name.to_string(), path.clone()) {
            self.status.info(format!("{} is already a favorite", redact_credentials(&path)));
            return false;
        }
        self.save_favorites();
        self.status.info(format!("Added {} to favorites", redact_credentials(&path)));
        true
    }

    pub fn remove_favorite(&mut self, path: &str) -> bool {
        let removed = self.session.favorites.remove(path);
        if removed {
            self.save_favorites();
        }
        removed
    }

    pub fn move_favorite(&mut self, path: &str, delta: isize) -> bool {
        let moved = self.session.favorites.move_entry(path, delta);
        if moved {
            self.save_favorites();
        }
        moved
    }

    pub fn navigate_to_favorite(&mut self, index: usize) -> OperationResult<()> {
        let Some(fav) = self.session.favorites.get(index).cloned() else {
            return Ok(());
        };
        self.navigate_to_directory(&fav.path)
    }

    fn save_favorites(&mut self) {
        self.config.favorites = self.session.favorites.entries().to_vec();
        self.persist_config();
    }

    // View settings

    /// Sort the active pane by `field`; picking the current field again
    /// flips the direction
    pub fn set_sort(&mut self, field: SortField) {
        let pane = self.panes.get_active_pane();
        let direction = if pane.sort_by == field {
            pane.sort_direction.toggled()
        } else {
            Default::default()
        };
        self.panes.update_active_pane(PaneUpdate {
            sort_by: Some(field),
            sort_direction: Some(direction),
            ..Default::default()
        });
        self.config.sorting.field = field;
        self.config.sorting.direction = direction;
        self.persist_config();
    }

    pub fn cycle_sort_field(&mut self) {
        let next = self.panes.get_active_pane().sort_by.next();
        self.set_sort(next);
    }

    /// Show only names containing `text` (case-insensitive)
    pub fn set_filter(&mut self, text: &str) {
        self.panes.update_active_pane(PaneUpdate {
            filter: Some(text.to_string()),
            filter_active: Some(!text.is_empty()),
            ..Default::default()
        });
    }

    pub fn clear_filter(&mut self) {
        self.set_filter("");
    }

    pub fn swap_panes(&mut self) {
        self.panes.swap();
        self.persist_paths();
    }

    /// Show the active pane's directory in the other pane too
    pub fn sync_inactive_to_active(&mut self) -> OperationResult<()> {
        let path = self.panes.get_active_pane().current_path.clone();
        let inactive = self.panes.active_side().other();
        self.load_directory(inactive, &path, None)
    }

    // SMB credentials

    fn request_smb_auth(&mut self, side: Side, path: &str) {
        let retry = matches!(&self.dialog, Some(Dialog::SmbAuth(d)) if d.path == path);
        self.panes.pane_mut(side).load_state = LoadState::SmbAuthRequired {
            path: path.to_string(),
        };
        self.dialog = Some(Dialog::SmbAuth(SmbAuthDialog {
            side,
            path: path.to_string(),
            error: retry.then(|| "Authentication failed".to_string()),
        }));
        info!(server = smb_server(path).unwrap_or_default(), "credentials required");
    }

    /// Retry the pending SMB listing with credentials. They are remembered
    /// for the server until the session ends.
    pub fn submit_smb_credentials(&mut self, username: &str, password: &str) -> OperationResult<()> {
        let Some(Dialog::SmbAuth(d)) = &self.dialog else {
            return Ok(());
        };
        let (side, path) = (d.side, d.path.clone());
        if let Some(server) = smb_server(&path) {
            self.session.remember_smb_credentials(
                server,
                SmbCredentials {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            );
        }
        // The dialog closes once the share lists
        let mut climb = ListingClimb::new(side, &path, None);
        climb.then.record_history = true;
        self.begin_listing(climb)
    }

    pub fn cancel_smb_auth(&mut self) {
        if matches!(self.dialog, Some(Dialog::SmbAuth(_)))
            && let Some(Dialog::SmbAuth(d)) = self.dialog.take()
        {
            self.abandon_smb_auth(d);
        }
    }

    pub(super) fn abandon_smb_auth(&mut self, dialog: SmbAuthDialog) {
        self.listings.remove(&dialog.side);
        let pane = self.panes.pane_mut(dialog.side);
        pane.load_state = if pane.items.is_empty() {
            LoadState::Error("Authentication cancelled".to_string())
        } else {
            LoadState::Loaded
        };
        self.status.info("Authentication cancelled");
    }
}
