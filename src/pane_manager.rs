//! Pane manager (owns both panes and the active side)

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::{Config, SettingsStore};
use crate::errors::AppResult;
use crate::fs::FileItem;
use crate::fs::path::redact_credentials;
use crate::fs::sort::{SortDirection, SortField};
use crate::state::{LoadState, PaneState, Side};

/// Partial update merged into a pane by `update_active_pane`
#[derive(Debug, Default, Clone)]
pub struct PaneUpdate {
    pub current_path: Option<String>,
    pub items: Option<Vec<FileItem>>,
    pub selected_indices: Option<BTreeSet<usize>>,
    pub focused_index: Option<usize>,
    pub filter: Option<String>,
    pub filter_active: Option<bool>,
    pub sort_by: Option<SortField>,
    pub sort_direction: Option<SortDirection>,
    pub load_state: Option<LoadState>,
}

impl PaneUpdate {
    fn apply(self, pane: &mut PaneState) {
        if let Some(v) = self.current_path {
            pane.current_path = v;
        }
        if let Some(v) = self.items {
            pane.items = v;
        }
        if let Some(v) = self.selected_indices {
            pane.selected_indices = v;
        }
        if let Some(v) = self.focused_index {
            pane.focused_index = v;
        }
        if let Some(v) = self.filter {
            pane.filter = v;
        }
        if let Some(v) = self.filter_active {
            pane.filter_active = v;
        }
        if let Some(v) = self.sort_by {
            pane.sort_by = v;
        }
        if let Some(v) = self.sort_direction {
            pane.sort_direction = v;
        }
        if let Some(v) = self.load_state {
            pane.load_state = v;
        }
    }
}

/// Last directories shown in each pane
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanePaths {
    pub left: Option<String>,
    pub right: Option<String>,
}

/// Single owner of the two panes and of which one is active
#[derive(Debug)]
pub struct PaneManager {
    left: PaneState,
    right: PaneState,
    active_side: Side,
}

impl PaneManager {
    pub fn new(left: PaneState, right: PaneState) -> Self {
        Self {
            left,
            right,
            active_side: Side::Left,
        }
    }

    pub fn active_side(&self) -> Side {
        self.active_side
    }

    pub fn set_active(&mut self, side: Side) {
        self.active_side = side;
    }

    /// Toggle active pane
    pub fn toggle_active(&mut self) {
        self.active_side = self.active_side.other();
    }

    pub fn pane(&self, side: Side) -> &PaneState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn pane_mut(&mut self, side: Side) -> &mut PaneState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Get a reference to the active pane
    pub fn get_active_pane(&self) -> &PaneState {
        self.pane(self.active_side)
    }

    /// Get a mutable reference to the active pane
    pub fn active_pane_mut(&mut self) -> &mut PaneState {
        self.pane_mut(self.active_side)
    }

    /// Get a reference to the inactive pane
    pub fn get_inactive_pane(&self) -> &PaneState {
        self.pane(self.active_side.other())
    }

    /// Get a mutable reference to the inactive pane
    pub fn inactive_pane_mut(&mut self) -> &mut PaneState {
        self.pane_mut(self.active_side.other())
    }

    /// Replace a side wholesale
    pub fn set_pane(&mut self, side: Side, state: PaneState) {
        *self.pane_mut(side) = state;
    }

    /// Merge a partial update into the active pane and return the result
    pub fn update_active_pane(&mut self, update: PaneUpdate) -> &PaneState {
        let pane = self.active_pane_mut();
        update.apply(pane);
        pane.sanitize();
        pane
    }

    /// Side currently showing `path`, active side first
    pub fn side_showing(&self, path: &str) -> Option<Side> {
        let active = self.active_side;
        [active, active.other()]
            .into_iter()
            .find(|&side| crate::fs::path::same_directory(&self.pane(side).current_path, path))
    }

    /// Swap the contents of both panes, keeping the active side
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
    }

    /// Last-used paths from the persistence collaborator
    pub fn load_pane_paths(store: &dyn SettingsStore) -> PanePaths {
        let config = store.load();
        if !config.general.remember_path {
            return PanePaths::default();
        }
        PanePaths {
            left: config.general.last_left_path.filter(|p| !p.is_empty()),
            right: config.general.last_right_path.filter(|p| !p.is_empty()),
        }
    }

    /// Write both current paths through the persistence collaborator.
    /// Paths carrying inline credentials are not persisted.
    pub fn save_pane_paths(&self, config: &mut Config, store: &dyn SettingsStore) -> AppResult<()> {
        if !config.general.remember_path {
            return Ok(());
        }
        let persistable = |path: &str| {
            (!path.is_empty() && redact_credentials(path) == path).then(|| path.to_string())
        };
        let left = persistable(&self.left.current_path).or_else(|| config.general.last_left_path.clone());
        let right = persistable(&self.right.current_path).or_else(|| config.general.last_right_path.clone());
        if left == config.general.last_left_path && right == config.general.last_right_path {
            return Ok(());
        }
        config.general.last_left_path = left;
        config.general.last_right_path = right;
        debug!(
            left = ?config.general.last_left_path,
            right = ?config.general.last_right_path,
            "saving pane paths"
        );
        store.save(config)
    }
}
