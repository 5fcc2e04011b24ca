//! Per-pane navigation history

use super::Side;

/// Default number of remembered directories per pane
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Result of a history move
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryMove {
    pub path: String,
    pub message: String,
}

/// Bounded back/forward stack for one pane
#[derive(Clone, Debug, Default)]
struct PaneHistory {
    /// Visited paths (oldest first)
    entries: Vec<String>,
    /// Index of the current entry (meaningless while `entries` is empty)
    cursor: usize,
}

impl PaneHistory {
    fn push(&mut self, path: &str, limit: usize) {
        if self.entries.get(self.cursor).map(|s| s.as_str()) == Some(path) {
            return;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(path.to_string());
        while self.entries.len() > limit {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len() - 1;
    }

    fn step(&mut self, delta: isize) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let target = self.cursor.checked_add_signed(delta)?;
        if target >= self.entries.len() {
            return None;
        }
        self.cursor = target;
        Some(&self.entries[target])
    }
}

/// Navigation history for both panes
#[derive(Clone, Debug)]
pub struct HistoryService {
    left: PaneHistory,
    right: PaneHistory,
    limit: usize,
}

impl Default for HistoryService {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryService {
    pub fn new(limit: usize) -> Self {
        Self {
            left: PaneHistory::default(),
            right: PaneHistory::default(),
            limit: limit.max(1),
        }
    }

    fn pane(&self, side: Side) -> &PaneHistory {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn pane_mut(&mut self, side: Side) -> &mut PaneHistory {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Record a visit. Forward entries are discarded and the oldest entry
    /// falls off once the bound is exceeded.
    pub fn add_to_history(&mut self, side: Side, path: &str) {
        let limit = self.limit;
        self.pane_mut(side).push(path, limit);
    }

    /// Move the cursor by `delta`. Returns `None` at either end.
    pub fn navigate(&mut self, side: Side, delta: isize) -> Option<HistoryMove> {
        let history = self.pane_mut(side);
        let path = history.step(delta)?.to_string();
        let position = history.cursor + 1;
        let total = history.entries.len();
        let direction = if delta < 0 { "Back" } else { "Forward" };
        Some(HistoryMove {
            message: format!("{} to {} ({}/{})", direction, path, position, total),
            path,
        })
    }

    pub fn can_go_back(&self, side: Side) -> bool {
        let history = self.pane(side);
        !history.entries.is_empty() && history.cursor > 0
    }

    pub fn can_go_forward(&self, side: Side) -> bool {
        let history = self.pane(side);
        history.cursor + 1 < history.entries.len()
    }

    pub fn current(&self, side: Side) -> Option<&str> {
        let history = self.pane(side);
        history.entries.get(history.cursor).map(|s| s.as_str())
    }

    pub fn entries(&self, side: Side) -> &[String] {
        &self.pane(side).entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut history = HistoryService::default();
        for i in 0..7 {
            history.add_to_history(Side::Left, &format!("/d{}", i));
        }
        assert_eq!(history.entries(Side::Left), &["/d2", "/d3", "/d4", "/d5", "/d6"]);

        for _ in 0..4 {
            assert!(history.navigate(Side::Left, -1).is_some());
        }
        assert!(history.navigate(Side::Left, -1).is_none());
        assert_eq!(history.current(Side::Left), Some("/d2"));

        let mut last = None;
        for _ in 0..4 {
            last = history.navigate(Side::Left, 1);
        }
        assert_eq!(last.map(|m| m.path), Some("/d6".to_string()));
        assert!(history.navigate(Side::Left, 1).is_none());
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let mut history = HistoryService::default();
        history.add_to_history(Side::Right, "/a");
        history.add_to_history(Side::Right, "/b");
        history.add_to_history(Side::Right, "/c");
        history.navigate(Side::Right, -1);
        history.navigate(Side::Right, -1);

        history.add_to_history(Side::Right, "/z");
        assert_eq!(history.entries(Side::Right), &["/a", "/z"]);
        assert!(!history.can_go_forward(Side::Right));
    }

    #[test]
    fn test_duplicate_of_current_is_ignored() {
        let mut history = HistoryService::default();
        history.add_to_history(Side::Left, "/a");
        history.add_to_history(Side::Left, "/a");
        assert_eq!(history.entries(Side::Left).len(), 1);
        assert!(history.entries(Side::Right).is_empty());
    }

    #[test]
    fn test_navigate_on_empty_history() {
        let mut history = HistoryService::default();
        assert!(history.navigate(Side::Left, -1).is_none());
        assert!(history.navigate(Side::Left, 1).is_none());
        assert!(!history.can_go_back(Side::Left));
    }

    #[test]
    fn test_navigate_message() {
        let mut history = HistoryService::default();
        history.add_to_history(Side::Left, "/a");
        history.add_to_history(Side::Left, "/b");
        let step = history.navigate(Side::Left, -1).unwrap();
        assert_eq!(step.path, "/a");
        assert_eq!(step.message, "Back to /a (1/2)");
    }
}
