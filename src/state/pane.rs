//! Pane data structures and the derived projection

use std::collections::BTreeSet;

use crate::fs::FileItem;
use crate::fs::sort::{SortDirection, SortField, SortSpec, sorted_indices};

/// Loading lifecycle of a pane
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error(String),
    /// The SMB backend asked for credentials before `path` can be listed
    SmbAuthRequired { path: String },
}

/// One side of the commander.
///
/// `selected_indices` and `focused_index` index into `items`, never into the
/// sorted/filtered projection, which is derived on demand by `projection()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaneState {
    pub current_path: String,
    /// Entries in backend order, ".." first when present
    pub items: Vec<FileItem>,
    pub selected_indices: BTreeSet<usize>,
    pub focused_index: usize,
    /// Case-insensitive substring filter
    pub filter: String,
    pub filter_active: bool,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
    pub load_state: LoadState,
}

impl Default for PaneState {
    fn default() -> Self {
        Self::empty("")
    }
}

impl PaneState {
    /// An empty but well-formed pane for `path`
    pub fn empty(path: &str) -> Self {
        Self {
            current_path: path.to_string(),
            items: Vec::new(),
            selected_indices: BTreeSet::new(),
            focused_index: 0,
            filter: String::new(),
            filter_active: false,
            sort_by: SortField::default(),
            sort_direction: SortDirection::default(),
            load_state: LoadState::Idle,
        }
    }

    pub fn sort_spec(&self) -> SortSpec {
        SortSpec {
            field: self.sort_by,
            direction: self.sort_direction,
        }
    }

    fn passes_filter(&self, item: &FileItem) -> bool {
        if !self.filter_active || self.filter.is_empty() || item.is_parent() {
            return true;
        }
        item.name.to_lowercase().contains(&self.filter.to_lowercase())
    }

    /// Item indices in display order (filtered, then sorted)
    pub fn projection(&self) -> Vec<usize> {
        sorted_indices(&self.items, self.sort_spec())
            .into_iter()
            .filter(|&i| self.passes_filter(&self.items[i]))
            .collect()
    }

    /// Position of `item_index` inside a projection
    pub fn position_in(projection: &[usize], item_index: usize) -> Option<usize> {
        projection.iter().position(|&i| i == item_index)
    }

    /// The focused item, if `focused_index` is still valid
    pub fn focused_item(&self) -> Option<&FileItem> {
        self.items.get(self.focused_index)
    }

    pub fn item_index_by_path(&self, path: &str) -> Option<usize> {
        self.items.iter().position(|item| item.path == path)
    }

    pub fn item_index_by_name(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name == name)
    }

    pub fn is_selected(&self, item_index: usize) -> bool {
        self.selected_indices.contains(&item_index)
    }

    /// Toggle one item. ".." and stale indices are ignored.
    pub fn toggle_selection(&mut self, item_index: usize) {
        let Some(item) = self.items.get(item_index) else {
            return;
        };
        if item.is_parent() {
            return;
        }
        if !self.selected_indices.remove(&item_index) {
            self.selected_indices.insert(item_index);
        }
    }

    /// Force the selection state of one item
    pub fn set_selected(&mut self, item_index: usize, selected: bool) {
        let Some(item) = self.items.get(item_index) else {
            return;
        };
        if item.is_parent() {
            return;
        }
        if selected {
            self.selected_indices.insert(item_index);
        } else {
            self.selected_indices.remove(&item_index);
        }
    }

    /// Selected items in `items` order, skipping stale indices
    pub fn selected_items(&self) -> Vec<&FileItem> {
        self.selected_indices
            .iter()
            .filter_map(|&i| self.items.get(i))
            .filter(|item| !item.is_parent())
            .collect()
    }

    /// Items an operation should act on: the selection, or the focused item
    /// when nothing is selected. ".." is never a target.
    pub fn target_items(&self) -> Vec<&FileItem> {
        let selected = self.selected_items();
        if !selected.is_empty() {
            return selected;
        }
        self.focused_item()
            .filter(|item| !item.is_parent())
            .into_iter()
            .collect()
    }

    pub fn target_paths(&self) -> Vec<String> {
        self.target_items().into_iter().map(|item| item.path.clone()).collect()
    }

    /// Drop stale indices and move focus onto a visible item
    pub fn sanitize(&mut self) {
        let len = self.items.len();
        let items = &self.items;
        self.selected_indices
            .retain(|&i| i < len && !items[i].is_parent());

        let projection = self.projection();
        if Self::position_in(&projection, self.focused_index).is_none() {
            self.focused_index = projection.first().copied().unwrap_or(0);
        }
    }

    /// Install a fresh listing: selection is cleared and focus lands on the
    /// item named `focus_name` if present, else on the first visible item.
    pub fn replace_items(&mut self, items: Vec<FileItem>, focus_name: Option<&str>) {
        self.items = items;
        self.selected_indices.clear();
        self.focused_index = focus_name
            .and_then(|name| self.item_index_by_name(name))
            .unwrap_or_else(|| self.projection().first().copied().unwrap_or(0));
        self.sanitize();
    }

    /// Re-list the same directory, carrying selection and focus over by path
    pub fn refresh_items(&mut self, items: Vec<FileItem>) {
        let focused_path = self.focused_item().map(|item| item.path.clone());
        let selected_paths: Vec<String> =
            self.selected_items().into_iter().map(|item| item.path.clone()).collect();

        self.items = items;
        self.selected_indices = selected_paths
            .iter()
            .filter_map(|path| self.item_index_by_path(path))
            .collect();
        self.focused_index = focused_path
            .and_then(|path| self.item_index_by_path(&path))
            .unwrap_or(0);
        self.sanitize();
    }

    /// Count of directories (excluding ..)
    pub fn dir_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.is_directory && !item.is_parent())
            .count()
    }

    /// Count of files
    pub fn file_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_directory).count()
    }

    /// Total size of all files
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|item| item.size).sum()
    }

    /// Total size of selected files
    pub fn selected_size(&self) -> u64 {
        self.selected_items().iter().map(|item| item.size).sum()
    }
}
