//! Ordered favorite directories

use crate::config::FavoritePath;
use crate::fs::path::{last_segment, same_directory};

/// Ordered set of favorite paths; a path appears at most once
#[derive(Clone, Debug, Default)]
pub struct FavoritesService {
    entries: Vec<FavoritePath>,
}

impl FavoritesService {
    pub fn new(entries: Vec<FavoritePath>) -> Self {
        let mut service = Self::default();
        for fav in entries {
            service.add(fav.name, fav.path);
        }
        service
    }

    /// Add a favorite. Returns false if the path is already a favorite.
    /// An empty name defaults to the final path segment.
    pub fn add(&mut self, name: String, path: String) -> bool {
        if self.contains(&path) {
            return false;
        }
        let name = if name.trim().is_empty() {
            match last_segment(&path) {
                "" => path.clone(),
                seg => seg.to_string(),
            }
        } else {
            name
        };
        self.entries.push(FavoritePath { name, path });
        true
    }

    /// Remove by path. Returns true if something was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|f| !same_directory(&f.path, path));
        self.entries.len() != before
    }

    /// Move a favorite up (`delta < 0`) or down, clamped to the list bounds
    pub fn move_entry(&mut self, path: &str, delta: isize) -> bool {
        let Some(from) = self.position(path) else {
            return false;
        };
        let last = self.entries.len() - 1;
        let to = from.saturating_add_signed(delta).min(last);
        if to == from {
            return false;
        }
        let fav = self.entries.remove(from);
        self.entries.insert(to, fav);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_some()
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|f| same_directory(&f.path, path))
    }

    pub fn get(&self, index: usize) -> Option<&FavoritePath> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FavoritePath] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
