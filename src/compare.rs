//! Two-tree directory comparison

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::backend::{RequestId, TransferProgress};

/// Modification times closer than this are treated as equal. Covers FAT's
/// two-second timestamp resolution.
pub const MTIME_TOLERANCE_MS: u64 = 2000;

/// What to compare
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompareRequest {
    pub left_path: String,
    pub right_path: String,
    pub recursive: bool,
}

/// Metadata for one side of a relative path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_directory: bool,
    pub size: u64,
    pub modified: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompareSummary {
    pub total_left: usize,
    pub total_right: usize,
    pub only_in_left: usize,
    pub only_in_right: usize,
    pub different: usize,
    pub identical: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompareEntry {
    /// Path relative to the compared roots, `/` separated
    pub relative_path: String,
    pub is_directory: bool,
    pub left_size: Option<u64>,
    pub right_size: Option<u64>,
    pub left_modified: Option<u64>,
    pub right_modified: Option<u64>,
}

impl CompareEntry {
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompareResult {
    pub summary: CompareSummary,
    pub only_in_left: Vec<CompareEntry>,
    pub only_in_right: Vec<CompareEntry>,
    pub different: Vec<CompareEntry>,
    pub identical: Vec<CompareEntry>,
}

fn times_differ(a: Option<u64>, b: Option<u64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.abs_diff(b) > MTIME_TOLERANCE_MS,
        _ => false,
    }
}

fn same_content(left: &EntryMeta, right: &EntryMeta) -> bool {
    match (left.is_directory, right.is_directory) {
        (true, true) => true,
        (false, false) => {
            left.size == right.size && !times_differ(left.modified, right.modified)
        }
        _ => false,
    }
}

/// Classify every relative path found in either tree
pub fn diff_trees(
    left: &BTreeMap<String, EntryMeta>,
    right: &BTreeMap<String, EntryMeta>,
) -> CompareResult {
    let mut result = CompareResult::default();
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();

    for key in keys {
        let l = left.get(key);
        let r = right.get(key);
        let entry = CompareEntry {
            relative_path: key.clone(),
            is_directory: l.or(r).map(|m| m.is_directory).unwrap_or(false),
            left_size: l.map(|m| m.size),
            right_size: r.map(|m| m.size),
            left_modified: l.and_then(|m| m.modified),
            right_modified: r.and_then(|m| m.modified),
        };
        match (l, r) {
            (Some(_), None) => result.only_in_left.push(entry),
            (None, Some(_)) => result.only_in_right.push(entry),
            (Some(l), Some(r)) if same_content(l, r) => result.identical.push(entry),
            (Some(_), Some(_)) => result.different.push(entry),
            (None, None) => {}
        }
    }

    result.summary = CompareSummary {
        total_left: left.len(),
        total_right: right.len(),
        only_in_left: result.only_in_left.len(),
        only_in_right: result.only_in_right.len(),
        different: result.different.len(),
        identical: result.identical.len(),
    };
    result
}

/// State of the compare dialog while a request is outstanding and after
#[derive(Clone, Debug, PartialEq)]
pub struct CompareDialog {
    pub request_id: RequestId,
    pub request: CompareRequest,
    pub result: CompareResult,
    pub progress: Option<TransferProgress>,
    pub waiting: bool,
}

impl CompareDialog {
    /// Opened before the backend answers: zeroed summary, no progress yet
    pub fn waiting(request_id: RequestId, request: CompareRequest) -> Self {
        Self {
            request_id,
            request,
            result: CompareResult::default(),
            progress: None,
            waiting: true,
        }
    }

    pub fn finish(&mut self, result: CompareResult) {
        self.result = result;
        self.progress = None;
        self.waiting = false;
    }

    /// One-line status for the dialog header
    pub fn status_text(&self) -> String {
        if !self.waiting {
            let s = &self.result.summary;
            return format!(
                "{} only left, {} only right, {} different, {} identical",
                s.only_in_left, s.only_in_right, s.different, s.identical
            );
        }
        match &self.progress {
            None => "Preparing…".to_string(),
            Some(p) if p.total == 0 => format!("Comparing {}", p.file_name),
            Some(p) => format!("Comparing {} ({}/{})", p.file_name, p.current, p.total),
        }
    }
}
