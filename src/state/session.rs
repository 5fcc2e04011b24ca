//! State that outlives a mounted commander view

use std::collections::HashMap;

use serde::Serialize;

use super::favorites::FavoritesService;
use super::history::HistoryService;

/// What a paste should do with the clipboard files
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipboardOp {
    Copy,
    Cut,
}

/// Files placed on the in-app clipboard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clipboard {
    pub files: Vec<String>,
    pub operation: ClipboardOp,
}

/// Credentials for an SMB server, kept for the session only
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SmbCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmbCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Aggregate of everything that survives unmounting the commander:
/// navigation history, clipboard, favorites and SMB credentials.
#[derive(Debug, Default)]
pub struct FileManagerSession {
    pub history: HistoryService,
    pub favorites: FavoritesService,
    clipboard: Option<Clipboard>,
    smb_credentials: HashMap<String, SmbCredentials>,
}

impl FileManagerSession {
    pub fn new(history: HistoryService, favorites: FavoritesService) -> Self {
        Self {
            history,
            favorites,
            clipboard: None,
            smb_credentials: HashMap::new(),
        }
    }

    /// Replace the clipboard contents
    pub fn set_clipboard(&mut self, files: Vec<String>, operation: ClipboardOp) {
        self.clipboard = Some(Clipboard { files, operation });
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard = None;
    }

    pub fn remember_smb_credentials(&mut self, server: &str, credentials: SmbCredentials) {
        self.smb_credentials.insert(server.to_lowercase(), credentials);
    }

    pub fn smb_credentials(&self, server: &str) -> Option<&SmbCredentials> {
        self.smb_credentials.get(&server.to_lowercase())
    }
}
