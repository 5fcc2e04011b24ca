//! File item representation

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Name of the synthetic "go to parent" entry
pub const PARENT_NAME: &str = "..";

/// One entry of a directory listing (local, FTP or SMB)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    /// File/directory name (not full path)
    pub name: String,
    /// Absolute path, protocol-prefixed for FTP (`ftp://host/dir/file`)
    pub path: String,
    /// Size in bytes (0 for directories)
    #[serde(default)]
    pub size: u64,
    /// Creation time in milliseconds since the Unix epoch
    #[serde(default)]
    pub created: Option<u64>,
    /// Modification time in milliseconds since the Unix epoch
    #[serde(default)]
    pub modified: Option<u64>,
    pub is_directory: bool,
    #[serde(default)]
    pub is_file: bool,
}

impl FileItem {
    pub fn file(name: &str, path: &str, size: u64, modified: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            size,
            created: modified,
            modified,
            is_directory: false,
            is_file: true,
        }
    }

    pub fn directory(name: &str, path: &str, modified: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            size: 0,
            created: modified,
            modified,
            is_directory: true,
            is_file: false,
        }
    }

    /// Create the synthetic ".." entry pointing at `parent_path`
    pub fn parent_entry(parent_path: &str) -> Self {
        Self::directory(PARENT_NAME, parent_path, None)
    }

    /// Whether this is the synthetic ".." entry
    pub fn is_parent(&self) -> bool {
        self.name == PARENT_NAME
    }

    /// Extension without the dot, if any. Dotfiles have no extension.
    pub fn extension(&self) -> Option<&str> {
        if self.is_directory {
            return None;
        }
        let dot = self.name.rfind('.')?;
        if dot == 0 || dot + 1 == self.name.len() {
            return None;
        }
        Some(&self.name[dot + 1..])
    }

    pub fn modified_time(&self) -> Option<SystemTime> {
        self.modified.map(|ms| UNIX_EPOCH + Duration::from_millis(ms))
    }
}

/// Convert a `SystemTime` to milliseconds since the Unix epoch
pub fn to_millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}
