//! Deterministic comparators over file items

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::FileItem;

/// Sort field for file listing
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Modified,
    Extension,
}

impl SortField {
    /// Next field in the cycle used by the sort key binding
    pub fn next(self) -> Self {
        match self {
            SortField::Name => SortField::Extension,
            SortField::Extension => SortField::Size,
            SortField::Size => SortField::Modified,
            SortField::Modified => SortField::Name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Name => "Name",
            SortField::Size => "Size",
            SortField::Modified => "Date",
            SortField::Extension => "Ext",
        }
    }
}

/// Sort direction
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Sort configuration of a pane
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

fn name_cmp(a: &FileItem, b: &FileItem) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn field_cmp(field: SortField, a: &FileItem, b: &FileItem) -> Ordering {
    match field {
        SortField::Name => name_cmp(a, b),
        SortField::Size => a.size.cmp(&b.size),
        SortField::Modified => a.modified.cmp(&b.modified),
        SortField::Extension => {
            let ext_a = a.extension().unwrap_or("").to_lowercase();
            let ext_b = b.extension().unwrap_or("").to_lowercase();
            ext_a.cmp(&ext_b)
        }
    }
}

/// Compare two items for display.
///
/// Order of precedence: ".." first, directories before files, the sort
/// field in the requested direction, then case-insensitive name, then
/// exact name, then path. The tie-breakers ignore the direction so equal
/// keys never swap places when the direction flips.
pub fn compare_items(spec: SortSpec, a: &FileItem, b: &FileItem) -> Ordering {
    match (a.is_parent(), b.is_parent()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    if a.is_directory != b.is_directory {
        return if a.is_directory { Ordering::Less } else { Ordering::Greater };
    }

    let primary = field_cmp(spec.field, a, b);
    let primary = match spec.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };

    primary
        .then_with(|| name_cmp(a, b))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.path.cmp(&b.path))
}

/// Indices of `items` in sorted display order
pub fn sorted_indices(items: &[FileItem], spec: SortSpec) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.sort_by(|&a, &b| compare_items(spec, &items[a], &items[b]));
    indices
}
