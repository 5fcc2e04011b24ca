//! Focus movement and multi-selection on the active pane

use regex::RegexBuilder;

use super::Commander;
use crate::errors::{OperationError, OperationResult};
use crate::state::PaneState;
use crate::utils::glob_to_regex;

impl Commander {
    /// Move focus by `delta` rows of the visible listing.
    ///
    /// With `with_selection`, a single step toggles the row being left; a
    /// longer jump sets every row from the start up to (not including) the
    /// target to the opposite of the starting row's state.
    pub fn move_focus(&mut self, delta: isize, with_selection: bool) {
        let pane = self.panes.active_pane_mut();
        let projection = pane.projection();
        if projection.is_empty() {
            return;
        }
        let last = projection.len() - 1;
        let current = PaneState::position_in(&projection, pane.focused_index).unwrap_or(0);
        let target = current.saturating_add_signed(delta).min(last);

        // Nothing toggles when the focus cannot move
        if with_selection && target != current {
            if delta.unsigned_abs() == 1 {
                pane.toggle_selection(projection[current]);
            } else {
                let select = !pane.is_selected(projection[current]);
                let range = if target > current {
                    current..target
                } else {
                    target + 1..current + 1
                };
                for &index in &projection[range] {
                    pane.set_selected(index, select);
                }
            }
        }
        pane.focused_index = projection[target];
    }

    pub fn focus_first(&mut self, with_selection: bool) {
        self.move_focus(isize::MIN, with_selection);
    }

    pub fn focus_last(&mut self, with_selection: bool) {
        self.move_focus(isize::MAX, with_selection);
    }

    /// Focus the row at `position` of the visible listing
    pub fn focus_row(&mut self, position: usize) {
        let pane = self.panes.active_pane_mut();
        if let Some(&index) = pane.projection().get(position) {
            pane.focused_index = index;
        }
    }

    /// Toggle the focused item and step to the next row
    /// Toggle the focused row and step past it. The last row toggles in place.
    pub fn toggle_focused_selection(&mut self) {
        let pane = self.panes.active_pane_mut();
        let focused = pane.focused_index;
        if pane.projection().contains(&focused) {
            pane.toggle_selection(focused);
        }
        self.move_focus(1, false);
    }

    pub fn select_all(&mut self) {
        let pane = self.panes.active_pane_mut();
        for index in pane.projection() {
            pane.set_selected(index, true);
        }
    }

    pub fn invert_selection(&mut self) {
        let pane = self.panes.active_pane_mut();
        for index in pane.projection() {
            pane.toggle_selection(index);
        }
    }

    pub fn clear_selection(&mut self) {
        self.panes.active_pane_mut().selected_indices.clear();
    }

    /// Add visible items whose name matches a glob to the selection.
    /// Returns how many were newly selected.
    pub fn select_matching(&mut self, pattern: &str) -> OperationResult<usize> {
        let regex = RegexBuilder::new(&glob_to_regex(pattern.trim(), false))
            .build()
            .map_err(|e| OperationError::Validation(format!("Invalid pattern '{}': {}", pattern, e)));
        let regex = self.report(regex)?;

        let pane = self.panes.active_pane_mut();
        let mut added = 0;
        for index in pane.projection() {
            if !pane.is_selected(index) && regex.is_match(&pane.items[index].name) && !pane.items[index].is_parent() {
                pane.set_selected(index, true);
                added += 1;
            }
        }
        self.status.info(format!("{} item(s) selected", added));
        Ok(added)
    }
}
