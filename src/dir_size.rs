//! Directory size totals and the dialog that shows them

use serde::{Deserialize, Serialize};

use crate::backend::{CancellationToken, RequestId, SizeProgress};
use crate::fs::FileItem;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectorySize {
    pub total_size: u64,
    pub file_count: u64,
    pub directory_count: u64,
}

impl DirectorySize {
    /// Size of a single listed file, no walk needed
    pub fn for_file(item: &FileItem) -> Self {
        Self {
            total_size: item.size,
            file_count: 1,
            directory_count: 0,
        }
    }
}

/// Size dialog state
#[derive(Clone, Debug)]
pub struct SizeDialog {
    /// Walk still running, if any
    pub request_id: Option<RequestId>,
    pub cancel: Option<CancellationToken>,
    pub path: String,
    pub name: String,
    pub totals: DirectorySize,
    pub current_file: Option<String>,
    pub done: bool,
}

impl SizeDialog {
    pub fn for_file(item: &FileItem) -> Self {
        Self {
            request_id: None,
            cancel: None,
            path: item.path.clone(),
            name: item.name.clone(),
            totals: DirectorySize::for_file(item),
            current_file: None,
            done: true,
        }
    }

    pub fn computing(request_id: RequestId, cancel: CancellationToken, path: &str, name: &str) -> Self {
        Self {
            request_id: Some(request_id),
            cancel: Some(cancel),
            path: path.to_string(),
            name: name.to_string(),
            totals: DirectorySize::default(),
            current_file: None,
            done: false,
        }
    }

    /// Fold a progress event in. Fields absent from the event keep their value.
    pub fn merge(&mut self, progress: &SizeProgress) {
        if let Some(file) = &progress.current_file {
            self.current_file = Some(file.clone());
        }
        if let Some(n) = progress.file_count {
            self.totals.file_count = n;
        }
        if let Some(n) = progress.directory_count {
            self.totals.directory_count = n;
        }
        if let Some(n) = progress.total_size {
            self.totals.total_size = n;
        }
    }

    pub fn finish(&mut self, totals: DirectorySize) {
        self.totals = totals;
        self.current_file = None;
        self.request_id = None;
        self.cancel = None;
        self.done = true;
    }

    pub fn is_computing(&self) -> bool {
        !self.done
    }
}
