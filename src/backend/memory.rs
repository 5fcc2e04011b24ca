//! In-memory backend with a scriptable tree.
//!
//! Keeps a request log and lets callers inject failures, SMB credential
//! prompts and held requests, which is what the commander's tests drive.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use serde_json::{Value, json};

use super::{
    Backend, BackendOp, BackendRequest, ProgressChannel, ProgressPayload, ProgressSink, RawResponse,
    SizeProgress, TransferProgress,
};
use crate::compare::{EntryMeta, diff_trees};
use crate::dir_size::DirectorySize;
use crate::fs::FileItem;
use crate::fs::path::{
    PathKind, get_parent_path, is_root, join_path, last_segment, normalize_for_compare, path_kind,
    smb_server,
};
use crate::state::SmbCredentials;

#[derive(Clone, Debug)]
struct Node {
    path: String,
    is_directory: bool,
    size: u64,
    modified: Option<u64>,
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            open = self.cond.wait(open).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.cond.notify_all();
    }
}

#[derive(Default)]
struct MemoryState {
    nodes: BTreeMap<String, Node>,
    requests: Vec<BackendRequest>,
    failures: HashMap<&'static str, VecDeque<String>>,
    auth_servers: HashMap<String, SmbCredentials>,
    armed: HashSet<&'static str>,
    holds: HashMap<&'static str, Arc<Gate>>,
    clipboard: Option<String>,
    cancels: usize,
}

/// Backend over a simulated file tree
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    correlate_progress: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn key(path: &str) -> String {
    normalize_for_compare(path)
}

fn not_found(path: &str) -> RawResponse {
    RawResponse::fail(format!("ENOENT: no such file or directory, '{}'", path))
}

impl MemoryBackend {
    /// A tree containing only `/`
    pub fn new() -> Self {
        let backend = Self {
            state: Mutex::new(MemoryState::default()),
            correlate_progress: AtomicBool::new(true),
        };
        backend.add_dir("/");
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(state: &mut MemoryState, node: Node) {
        let mut dir = get_parent_path(&node.path);
        while !state.nodes.contains_key(&key(&dir)) {
            state.nodes.insert(
                key(&dir),
                Node {
                    path: dir.clone(),
                    is_directory: true,
                    size: 0,
                    modified: None,
                },
            );
            let parent = get_parent_path(&dir);
            if parent == dir {
                break;
            }
            dir = parent;
        }
        state.nodes.insert(key(&node.path), node);
    }

    /// Add a directory and any missing ancestors
    pub fn add_dir(&self, path: &str) {
        Self::insert(
            &mut self.lock(),
            Node {
                path: path.to_string(),
                is_directory: true,
                size: 0,
                modified: None,
            },
        );
    }

    /// Add a file and any missing ancestors
    pub fn add_file(&self, path: &str, size: u64, modified: Option<u64>) {
        Self::insert(
            &mut self.lock(),
            Node {
                path: path.to_string(),
                is_directory: false,
                size,
                modified,
            },
        );
    }

    pub fn remove(&self, path: &str) {
        Self::remove_subtree(&mut self.lock(), path);
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(&key(path))
    }

    /// Make the next request named `operation` fail with `message`
    pub fn fail_next(&self, operation: &'static str, message: &str) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(message.to_string());
    }

    /// Listings on `server` need these credentials
    pub fn require_smb_auth(&self, server: &str, credentials: SmbCredentials) {
        self.lock()
            .auth_servers
            .insert(server.to_lowercase(), credentials);
    }

    /// The next request named `operation` blocks until `release` is called
    pub fn hold_next(&self, operation: &'static str) {
        let mut state = self.lock();
        state.armed.insert(operation);
        state.holds.insert(operation, Arc::new(Gate::default()));
    }

    pub fn release(&self, operation: &'static str) {
        let mut state = self.lock();
        state.armed.remove(operation);
        if let Some(gate) = state.holds.remove(operation) {
            gate.release();
        }
    }

    /// Emit progress without request ids, like a bridge that cannot correlate
    pub fn set_correlated_progress(&self, correlated: bool) {
        self.correlate_progress.store(correlated, Ordering::SeqCst);
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.lock().requests.clone()
    }

    /// Requests named `operation`
    pub fn requests_named(&self, operation: &str) -> Vec<BackendRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.op.name() == operation)
            .cloned()
            .collect()
    }

    pub fn cancel_count(&self) -> usize {
        self.lock().cancels
    }

    pub fn clipboard_text(&self) -> Option<String> {
        self.lock().clipboard.clone()
    }

    fn emit(&self, sink: &ProgressSink, channel: ProgressChannel, payload: ProgressPayload) {
        if self.correlate_progress.load(Ordering::SeqCst) {
            sink.emit(channel, payload);
        } else {
            sink.emit_uncorrelated(channel, payload);
        }
    }

    fn children(state: &MemoryState, dir: &str) -> Vec<Node> {
        let dir_key = key(dir);
        state
            .nodes
            .iter()
            .filter(|(k, node)| **k != dir_key && key(&get_parent_path(&node.path)) == dir_key)
            .map(|(_, node)| node.clone())
            .collect()
    }

    fn descendants(state: &MemoryState, dir: &str, recursive: bool, prefix: &str, out: &mut Vec<(String, Node)>) {
        for child in Self::children(state, dir) {
            let relative = if prefix.is_empty() {
                last_segment(&child.path).to_string()
            } else {
                format!("{}/{}", prefix, last_segment(&child.path))
            };
            out.push((relative.clone(), child.clone()));
            if recursive && child.is_directory {
                Self::descendants(state, &child.path, true, &relative, out);
            }
        }
    }

    fn remove_subtree(state: &mut MemoryState, path: &str) {
        let mut under = Vec::new();
        Self::descendants(state, path, true, "", &mut under);
        for (_, node) in under {
            state.nodes.remove(&key(&node.path));
        }
        state.nodes.remove(&key(path));
    }

    fn copy_subtree(state: &mut MemoryState, from: &Node, to: &str) {
        let mut under = Vec::new();
        Self::descendants(state, &from.path, true, "", &mut under);
        Self::insert(
            state,
            Node {
                path: to.to_string(),
                ..from.clone()
            },
        );
        for (relative, node) in under {
            let target = relative
                .split('/')
                .fold(to.to_string(), |acc, seg| join_path(&acc, seg));
            Self::insert(state, Node { path: target, ..node });
        }
    }

    fn is_dir(state: &MemoryState, path: &str) -> bool {
        state
            .nodes
            .get(&key(path))
            .is_some_and(|n| n.is_directory)
    }

    fn transfer_channel(files: &[String], destination: &str) -> ProgressChannel {
        if path_kind(destination) == PathKind::Ftp {
            ProgressChannel::FtpUpload
        } else if files.iter().any(|f| path_kind(f) == PathKind::Ftp) {
            ProgressChannel::FtpDownload
        } else {
            ProgressChannel::Copy
        }
    }

    fn list(&self, path: &str, credentials: Option<&SmbCredentials>) -> RawResponse {
        let state = self.lock();
        if let Some(server) = smb_server(path)
            && let Some(required) = state.auth_servers.get(&server.to_lowercase())
            && credentials != Some(required)
        {
            return RawResponse::auth_required();
        }
        if !Self::is_dir(&state, path) {
            return not_found(path);
        }
        let items: Vec<FileItem> = Self::children(&state, path)
            .into_iter()
            .map(|n| {
                let name = last_segment(&n.path);
                if n.is_directory {
                    FileItem::directory(name, &n.path, n.modified)
                } else {
                    FileItem::file(name, &n.path, n.size, n.modified)
                }
            })
            .collect();
        RawResponse::ok(serde_json::to_value(items).unwrap_or(Value::Null))
    }

    fn transfer(&self, request: &BackendRequest, files: &[String], destination: &str, remove_source: bool, sink: &ProgressSink) -> RawResponse {
        let channel = Self::transfer_channel(files, destination);
        let total = files.len() as u64;
        for (i, file) in files.iter().enumerate() {
            if request.cancel.is_cancelled() {
                return RawResponse::fail("Operation cancelled");
            }
            self.emit(
                sink,
                channel,
                ProgressPayload::Transfer(TransferProgress::new(i as u64, total, last_segment(file))),
            );
            let mut state = self.lock();
            if !Self::is_dir(&state, destination) {
                return not_found(destination);
            }
            let Some(node) = state.nodes.get(&key(file)).cloned() else {
                return not_found(file);
            };
            let target = join_path(destination, last_segment(file));
            Self::copy_subtree(&mut state, &node, &target);
            if remove_source {
                Self::remove_subtree(&mut state, file);
            }
        }
        self.emit(
            sink,
            channel,
            ProgressPayload::Transfer(TransferProgress::new(total, total, "")),
        );
        RawResponse::ok(json!({ "count": files.len() }))
    }

    fn compare(&self, left: &str, right: &str, recursive: bool, sink: &ProgressSink) -> RawResponse {
        let (left_entries, right_entries) = {
            let state = self.lock();
            for side in [left, right] {
                if !Self::is_dir(&state, side) {
                    return not_found(side);
                }
            }
            let mut l = Vec::new();
            let mut r = Vec::new();
            Self::descendants(&state, left, recursive, "", &mut l);
            Self::descendants(&state, right, recursive, "", &mut r);
            (l, r)
        };
        let total = (left_entries.len() + right_entries.len()) as u64;
        let to_map = |entries: Vec<(String, Node)>| -> BTreeMap<String, EntryMeta> {
            entries
                .into_iter()
                .map(|(rel, n)| {
                    (
                        rel,
                        EntryMeta {
                            is_directory: n.is_directory,
                            size: n.size,
                            modified: n.modified,
                        },
                    )
                })
                .collect()
        };
        for (i, (rel, _)) in left_entries.iter().chain(right_entries.iter()).enumerate() {
            self.emit(
                sink,
                ProgressChannel::Compare,
                ProgressPayload::Transfer(TransferProgress::new(i as u64 + 1, total, rel.clone())),
            );
        }
        let result = diff_trees(&to_map(left_entries), &to_map(right_entries));
        RawResponse::ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    fn directory_size(&self, request: &BackendRequest, path: &str, sink: &ProgressSink) -> RawResponse {
        let entries = {
            let state = self.lock();
            if !Self::is_dir(&state, path) {
                return not_found(path);
            }
            let mut out = Vec::new();
            Self::descendants(&state, path, true, "", &mut out);
            out
        };
        let mut totals = DirectorySize::default();
        for (_, node) in entries {
            if request.cancel.is_cancelled() {
                return RawResponse::fail("Operation cancelled");
            }
            if node.is_directory {
                totals.directory_count += 1;
            } else {
                totals.file_count += 1;
                totals.total_size += node.size;
            }
            self.emit(
                sink,
                ProgressChannel::DirectorySize,
                ProgressPayload::Size(SizeProgress {
                    current_file: Some(node.path.clone()),
                    file_count: Some(totals.file_count),
                    directory_count: None,
                    total_size: Some(totals.total_size),
                }),
            );
        }
        RawResponse::ok(serde_json::to_value(totals).unwrap_or(Value::Null))
    }

    fn run(&self, request: &BackendRequest, sink: &ProgressSink) -> RawResponse {
        match &request.op {
            BackendOp::List { path, credentials } => self.list(path, credentials.as_ref()),
            BackendOp::DriveInfo => {
                let state = self.lock();
                let roots: Vec<Value> = state
                    .nodes
                    .values()
                    .filter(|n| n.is_directory && is_root(&n.path))
                    .map(|n| json!({ "path": n.path }))
                    .collect();
                RawResponse::ok(Value::Array(roots))
            }
            BackendOp::Copy { files, destination } => self.transfer(request, files, destination, false, sink),
            BackendOp::Move { files, destination } => self.transfer(request, files, destination, true, sink),
            BackendOp::Delete { files } => {
                let mut state = self.lock();
                for file in files {
                    if !state.nodes.contains_key(&key(file)) {
                        return not_found(file);
                    }
                    Self::remove_subtree(&mut state, file);
                }
                RawResponse::ok(json!({ "count": files.len() }))
            }
            BackendOp::Rename { path, new_name } => {
                let mut state = self.lock();
                let Some(node) = state.nodes.get(&key(path)).cloned() else {
                    return not_found(path);
                };
                let target = join_path(&get_parent_path(path), new_name);
                if state.nodes.contains_key(&key(&target)) {
                    return RawResponse::fail(format!("EEXIST: file already exists, '{}'", target));
                }
                Self::copy_subtree(&mut state, &node, &target);
                Self::remove_subtree(&mut state, path);
                RawResponse::ok(json!({ "path": target }))
            }
            BackendOp::CreateDirectory { path } => {
                let mut state = self.lock();
                if state.nodes.contains_key(&key(path)) {
                    return RawResponse::fail(format!("EEXIST: file already exists, '{}'", path));
                }
                Self::insert(
                    &mut state,
                    Node {
                        path: path.clone(),
                        is_directory: true,
                        size: 0,
                        modified: None,
                    },
                );
                RawResponse::ok(Value::Null)
            }
            BackendOp::WriteFile { path, content } => {
                Self::insert(
                    &mut self.lock(),
                    Node {
                        path: path.clone(),
                        is_directory: false,
                        size: content.len() as u64,
                        modified: None,
                    },
                );
                RawResponse::ok(Value::Null)
            }
            BackendOp::Zip { files, destination } => {
                let total = files.len() as u64;
                let mut size = 0;
                for (i, file) in files.iter().enumerate() {
                    if request.cancel.is_cancelled() {
                        return RawResponse::fail("Operation cancelled");
                    }
                    self.emit(
                        sink,
                        ProgressChannel::Zip,
                        ProgressPayload::Transfer(TransferProgress::new(i as u64, total, last_segment(file))),
                    );
                    match self.lock().nodes.get(&key(file)) {
                        Some(node) => size += node.size,
                        None => return not_found(file),
                    }
                }
                self.add_file(destination, size, None);
                RawResponse::ok(json!({ "path": destination }))
            }
            BackendOp::Compare {
                left_path,
                right_path,
                recursive,
            } => self.compare(left_path, right_path, *recursive, sink),
            BackendOp::DirectorySize { path } => self.directory_size(request, path, sink),
            BackendOp::ExecuteCommand { .. } | BackendOp::OpenWithApp { .. } => RawResponse::ok(Value::Null),
            BackendOp::ClipboardWriteText { text } => {
                self.lock().clipboard = Some(text.clone());
                RawResponse::ok(Value::Null)
            }
        }
    }
}

impl Backend for MemoryBackend {
    fn execute(&self, request: &BackendRequest, progress: &ProgressSink) -> RawResponse {
        let name = request.op.name();
        let gate = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            if let Some(message) = state.failures.get_mut(name).and_then(VecDeque::pop_front) {
                return RawResponse::fail(message);
            }
            if state.armed.remove(name) {
                state.holds.get(name).cloned()
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.wait();
        }
        self.run(request, progress)
    }

    fn cancel_current_operation(&self) {
        self.lock().cancels += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Service, normalize};

    fn request(op: BackendOp) -> BackendRequest {
        BackendRequest::new(1, Service::FileOperations, op)
    }

    fn list(backend: &MemoryBackend, path: &str) -> Vec<FileItem> {
        let req = request(BackendOp::List {
            path: path.into(),
            credentials: None,
        });
        let value = normalize(backend.execute(&req, &ProgressSink::detached()), &req.op).unwrap();
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_list_children_only() {
        let backend = MemoryBackend::new();
        backend.add_file("/a/one.txt", 1, None);
        backend.add_file("/a/sub/two.txt", 2, None);
        let mut names: Vec<String> = list(&backend, "/a").into_iter().map(|i| i.name).collect();
        names.sort();
        assert_eq!(names, vec!["one.txt", "sub"]);
        assert_eq!(list(&backend, "/").len(), 1);
    }

    #[test]
    fn test_move_removes_source() {
        let backend = MemoryBackend::new();
        backend.add_file("/src/f.txt", 3, None);
        backend.add_dir("/dst");
        let req = request(BackendOp::Move {
            files: vec!["/src/f.txt".into()],
            destination: "/dst".into(),
        });
        assert!(backend.execute(&req, &ProgressSink::detached()).success);
        assert!(!backend.exists("/src/f.txt"));
        assert!(backend.exists("/dst/f.txt"));
    }

    #[test]
    fn test_scripted_failure_is_consumed() {
        let backend = MemoryBackend::new();
        backend.fail_next("create-directory", "EACCES: permission denied");
        let req = request(BackendOp::CreateDirectory { path: "/new".into() });
        let first = backend.execute(&req, &ProgressSink::detached());
        assert_eq!(first.error.as_deref(), Some("EACCES: permission denied"));
        assert!(backend.execute(&req, &ProgressSink::detached()).success);
        assert_eq!(backend.requests_named("create-directory").len(), 2);
    }

    #[test]
    fn test_smb_auth() {
        let backend = MemoryBackend::new();
        backend.add_dir("\\\\nas\\share");
        let creds = SmbCredentials {
            username: "u".into(),
            password: "p".into(),
        };
        backend.require_smb_auth("NAS", creds.clone());
        let denied = backend.execute(
            &request(BackendOp::List {
                path: "\\\\nas\\share".into(),
                credentials: None,
            }),
            &ProgressSink::detached(),
        );
        assert!(denied.needs_auth);
        let allowed = backend.execute(
            &request(BackendOp::List {
                path: "\\\\nas\\share".into(),
                credentials: Some(creds),
            }),
            &ProgressSink::detached(),
        );
        assert!(allowed.success);
    }
}
