//! Local filesystem backend

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{
    Backend, BackendOp, BackendRequest, CancellationToken, ProgressChannel, ProgressPayload,
    ProgressSink, RawResponse, SizeProgress, TransferProgress,
};
use crate::compare::{EntryMeta, diff_trees};
use crate::dir_size::DirectorySize;
use crate::fs::FileItem;
use crate::fs::entry::to_millis;
use crate::fs::path::{PathKind, path_kind};

/// Emit byte progress at most this often while copying
const PROGRESS_STEP: u64 = 1024 * 1024;

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "Operation cancelled")
}

/// Preserve modification time (and permissions on unix) from src to dest.
/// Errors are ignored since the data is already written.
fn preserve_attributes(src: &Path, dest: &Path) {
    if let Ok(meta) = fs::metadata(src) {
        if let Ok(mtime) = meta.modified() {
            let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
        }
        #[cfg(unix)]
        {
            let _ = fs::set_permissions(dest, meta.permissions());
        }
    }
}

fn path_size(path: &Path) -> u64 {
    if path.is_dir() {
        fs::read_dir(path)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| path_size(&e.path()))
                    .sum()
            })
            .unwrap_or(0)
    } else {
        path.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

/// Running byte count for one transfer request
struct Transfer<'a> {
    sink: &'a ProgressSink,
    channel: ProgressChannel,
    cancel: &'a CancellationToken,
    done: u64,
    total: u64,
    last_emit: u64,
}

impl Transfer<'_> {
    fn advance(&mut self, bytes: u64, file_name: &str) {
        self.done += bytes;
        if self.done - self.last_emit >= PROGRESS_STEP || self.done == self.total {
            self.last_emit = self.done;
            self.emit(file_name);
        }
    }

    fn emit(&self, file_name: &str) {
        self.sink.emit(
            self.channel,
            ProgressPayload::Transfer(TransferProgress::new(self.done, self.total, file_name)),
        );
    }

    fn copy_file(&mut self, src: &Path, dest: &Path) -> io::Result<()> {
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.emit(&name);

        let mut reader = fs::File::open(src)?;
        let mut writer = fs::File::create(dest)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            if self.cancel.is_cancelled() {
                drop(writer);
                let _ = fs::remove_file(dest);
                return Err(cancelled());
            }
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            self.advance(n as u64, &name);
        }
        drop(writer);
        preserve_attributes(src, dest);
        Ok(())
    }

    fn copy_path(&mut self, src: &Path, dest: &Path) -> io::Result<()> {
        if !src.is_dir() {
            return self.copy_file(src, dest);
        }
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            if self.cancel.is_cancelled() {
                return Err(cancelled());
            }
            let entry = entry?;
            self.copy_path(&entry.path(), &dest.join(entry.file_name()))?;
        }
        // After the contents so creating children does not bump the mtime
        preserve_attributes(src, dest);
        Ok(())
    }

    fn move_path(&mut self, src: &Path, dest: &Path) -> io::Result<()> {
        let size = path_size(src);
        match fs::rename(src, dest) {
            Ok(()) => {
                let name = dest
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.advance(size, &name);
                Ok(())
            }
            Err(e) => {
                debug!(src = %src.display(), error = %e, "rename failed, falling back to copy");
                self.copy_path(src, dest)?;
                if src.is_dir() {
                    fs::remove_dir_all(src)
                } else {
                    fs::remove_file(src)
                }
            }
        }
    }
}

fn delete_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn file_item(entry: &fs::DirEntry) -> Option<FileItem> {
    let path = entry.path();
    let name = entry.file_name().to_string_lossy().into_owned();
    // Follow symlinks so a link to a directory is navigable
    let meta = fs::metadata(&path).or_else(|_| entry.metadata()).ok()?;
    let modified = meta.modified().ok().and_then(to_millis);
    let path = path.to_string_lossy().into_owned();
    let mut item = if meta.is_dir() {
        FileItem::directory(&name, &path, modified)
    } else {
        FileItem::file(&name, &path, meta.len(), modified)
    };
    item.created = meta.created().ok().and_then(to_millis).or(modified);
    Some(item)
}

fn walk(root: &Path, dir: &Path, recursive: bool, out: &mut BTreeMap<String, EntryMeta>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        out.insert(
            relative,
            EntryMeta {
                is_directory: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
                modified: meta.modified().ok().and_then(to_millis),
            },
        );
        if recursive && meta.is_dir() {
            walk(root, &path, true, out)?;
        }
    }
    Ok(())
}

/// Backend over the machine's own filesystem
#[derive(Default)]
pub struct LocalBackend {
    current: Mutex<Option<CancellationToken>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, token: Option<CancellationToken>) {
        if let Ok(mut current) = self.current.lock() {
            *current = token;
        }
    }

    fn list(&self, path: &str) -> io::Result<Value> {
        let items: Vec<FileItem> = fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .filter_map(|e| file_item(&e))
            .collect();
        Ok(serde_json::to_value(items).unwrap_or(Value::Null))
    }

    fn drive_info(&self) -> Value {
        #[cfg(target_os = "windows")]
        {
            let drives: Vec<Value> = (b'A'..=b'Z')
                .map(|c| format!("{}:\\", c as char))
                .filter(|d| Path::new(d).exists())
                .map(|d| json!({ "path": d }))
                .collect();
            Value::Array(drives)
        }
        #[cfg(not(target_os = "windows"))]
        {
            json!([{ "path": "/" }])
        }
    }

    fn transfer(
        &self,
        request: &BackendRequest,
        files: &[String],
        destination: &str,
        remove_source: bool,
        sink: &ProgressSink,
    ) -> io::Result<Value> {
        let dest_dir = PathBuf::from(destination);
        if !dest_dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Destination '{}' is not a directory", destination),
            ));
        }
        let sources: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
        let mut transfer = Transfer {
            sink,
            channel: ProgressChannel::Copy,
            cancel: &request.cancel,
            done: 0,
            total: sources.iter().map(|p| path_size(p)).sum(),
            last_emit: 0,
        };
        for src in &sources {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dest = dest_dir.join(name);
            if dest == *src {
                continue;
            }
            if dest.starts_with(src) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Cannot copy '{}' into itself", src.display()),
                ));
            }
            if remove_source {
                transfer.move_path(src, &dest)?;
            } else {
                transfer.copy_path(src, &dest)?;
            }
        }
        transfer.emit("");
        Ok(json!({ "count": files.len() }))
    }

    fn zip(&self, request: &BackendRequest, files: &[String], destination: &str, sink: &ProgressSink) -> io::Result<Value> {
        let mut entries: Vec<(PathBuf, String)> = Vec::new();
        for file in files {
            let src = PathBuf::from(file);
            let base = src.parent().map(Path::to_path_buf).unwrap_or_default();
            collect_zip_entries(&base, &src, &mut entries)?;
        }

        let out = fs::File::create(destination)?;
        let mut zip = zip::ZipWriter::new(out);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let total = entries.len() as u64;

        for (i, (src, name)) in entries.iter().enumerate() {
            if request.cancel.is_cancelled() {
                drop(zip);
                let _ = fs::remove_file(destination);
                return Err(cancelled());
            }
            sink.emit(
                ProgressChannel::Zip,
                ProgressPayload::Transfer(TransferProgress::new(i as u64, total, name.clone())),
            );
            if src.is_dir() {
                zip.add_directory(format!("{}/", name), options).map_err(io::Error::other)?;
            } else {
                zip.start_file(name.as_str(), options).map_err(io::Error::other)?;
                let mut reader = fs::File::open(src)?;
                io::copy(&mut reader, &mut zip)?;
            }
        }
        zip.finish().map_err(io::Error::other)?;
        sink.emit(
            ProgressChannel::Zip,
            ProgressPayload::Transfer(TransferProgress::new(total, total, "")),
        );
        Ok(json!({ "path": destination, "entries": total }))
    }

    fn compare(&self, left: &str, right: &str, recursive: bool, sink: &ProgressSink) -> io::Result<Value> {
        let mut left_map = BTreeMap::new();
        let mut right_map = BTreeMap::new();
        sink.emit(
            ProgressChannel::Compare,
            ProgressPayload::Transfer(TransferProgress::new(0, 0, left)),
        );
        walk(Path::new(left), Path::new(left), recursive, &mut left_map)?;
        sink.emit(
            ProgressChannel::Compare,
            ProgressPayload::Transfer(TransferProgress::new(1, 2, right)),
        );
        walk(Path::new(right), Path::new(right), recursive, &mut right_map)?;
        let result = diff_trees(&left_map, &right_map);
        sink.emit(
            ProgressChannel::Compare,
            ProgressPayload::Transfer(TransferProgress::new(2, 2, "")),
        );
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    fn directory_size(&self, request: &BackendRequest, path: &str, sink: &ProgressSink) -> io::Result<Value> {
        let mut totals = DirectorySize::default();
        let mut stack = vec![PathBuf::from(path)];
        while let Some(dir) = stack.pop() {
            if request.cancel.is_cancelled() {
                return Err(cancelled());
            }
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    // Unreadable subdirectories are skipped, the root is not
                    if dir == Path::new(path) {
                        return Err(e);
                    }
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                    continue;
                }
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                if meta.is_dir() {
                    totals.directory_count += 1;
                    stack.push(entry.path());
                } else {
                    totals.file_count += 1;
                    totals.total_size += meta.len();
                }
            }
            sink.emit(
                ProgressChannel::DirectorySize,
                ProgressPayload::Size(SizeProgress {
                    current_file: Some(dir.to_string_lossy().into_owned()),
                    file_count: Some(totals.file_count),
                    directory_count: Some(totals.directory_count),
                    total_size: Some(totals.total_size),
                }),
            );
        }
        Ok(serde_json::to_value(totals).unwrap_or(Value::Null))
    }

    /// Start a program without waiting for it. The returned thread reaps it on exit.
    fn launch(command: &str, args: &[String]) -> io::Result<JoinHandle<Option<ExitStatus>>> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        info!(command, pid = child.id(), "launched external program");
        Ok(thread::spawn(move || match child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "failed to reap external program");
                None
            }
        }))
    }

    fn spawn_detached(command: &str, args: &[String]) -> io::Result<Value> {
        Self::launch(command, args)?;
        Ok(Value::Null)
    }

    fn run(&self, request: &BackendRequest, sink: &ProgressSink) -> io::Result<Value> {
        match &request.op {
            BackendOp::List { path, .. } => self.list(path),
            BackendOp::DriveInfo => Ok(self.drive_info()),
            BackendOp::Copy { files, destination } => self.transfer(request, files, destination, false, sink),
            BackendOp::Move { files, destination } => self.transfer(request, files, destination, true, sink),
            BackendOp::Delete { files } => {
                for file in files {
                    if request.cancel.is_cancelled() {
                        return Err(cancelled());
                    }
                    delete_path(Path::new(file))?;
                }
                Ok(json!({ "count": files.len() }))
            }
            BackendOp::Rename { path, new_name } => {
                let src = Path::new(path);
                let dest = src.with_file_name(new_name);
                if dest.exists() {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("'{}' already exists", new_name),
                    ));
                }
                fs::rename(src, &dest)?;
                Ok(json!({ "path": dest.to_string_lossy() }))
            }
            BackendOp::CreateDirectory { path } => {
                fs::create_dir(path)?;
                Ok(Value::Null)
            }
            BackendOp::WriteFile { path, content } => {
                fs::write(path, content)?;
                Ok(Value::Null)
            }
            BackendOp::Zip { files, destination } => self.zip(request, files, destination, sink),
            BackendOp::Compare {
                left_path,
                right_path,
                recursive,
            } => self.compare(left_path, right_path, *recursive, sink),
            BackendOp::DirectorySize { path } => self.directory_size(request, path, sink),
            BackendOp::ExecuteCommand { command, args } => Self::spawn_detached(command, args),
            BackendOp::OpenWithApp { path, app } => Self::spawn_detached(app, std::slice::from_ref(path)),
            BackendOp::ClipboardWriteText { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "System clipboard is not available",
            )),
        }
    }
}

fn collect_zip_entries(base: &Path, path: &Path, out: &mut Vec<(PathBuf, String)>) -> io::Result<()> {
    let name = path
        .strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    out.push((path.to_path_buf(), name));
    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            collect_zip_entries(base, &entry?.path(), out)?;
        }
    }
    Ok(())
}

impl Backend for LocalBackend {
    fn execute(&self, request: &BackendRequest, progress: &ProgressSink) -> RawResponse {
        if let Some(remote) = request.op.paths().into_iter().find(|p| path_kind(p) != PathKind::Local) {
            return RawResponse::fail(format!("'{}' is not reachable from the local backend", remote));
        }

        let long_running = matches!(
            request.op,
            BackendOp::Copy { .. }
                | BackendOp::Move { .. }
                | BackendOp::Delete { .. }
                | BackendOp::Zip { .. }
                | BackendOp::DirectorySize { .. }
        );
        if long_running {
            self.track(Some(request.cancel.clone()));
        }
        let result = self.run(request, progress);
        if long_running {
            self.track(None);
        }

        match result {
            Ok(data) => RawResponse::ok(data),
            Err(e) => {
                debug!(operation = request.op.name(), error = %e, "local operation failed");
                RawResponse::fail(e.to_string())
            }
        }
    }

    fn cancel_current_operation(&self) {
        if let Ok(current) = self.current.lock()
            && let Some(token) = current.as_ref()
        {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Service, normalize};

    fn run(backend: &LocalBackend, op: BackendOp) -> RawResponse {
        backend.execute(
            &BackendRequest::new(1, Service::FileOperations, op),
            &ProgressSink::detached(),
        )
    }

    fn s(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_list_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let op = BackendOp::List {
            path: s(dir.path()),
            credentials: None,
        };
        let value = normalize(run(&LocalBackend::new(), op.clone()), &op).unwrap();
        let mut items: Vec<FileItem> = serde_json::from_value(value).unwrap();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "a.txt");
        assert_eq!(items[0].size, 5);
        assert!(items[1].is_directory);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let response = run(
            &LocalBackend::new(),
            BackendOp::List {
                path: s(&dir.path().join("gone")),
                credentials: None,
            },
        );
        assert!(!response.success);
        assert!(response.error.is_some());
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(src.join("inner")).unwrap();
        fs::create_dir(&dst).unwrap();
        fs::write(src.join("inner").join("f.txt"), "data").unwrap();
        let old = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(src.join("inner").join("f.txt"), old).unwrap();

        let response = run(
            &LocalBackend::new(),
            BackendOp::Copy {
                files: vec![s(&src.join("inner"))],
                destination: s(&dst),
            },
        );
        assert!(response.success, "{:?}", response.error);
        let copied = dst.join("inner").join("f.txt");
        assert_eq!(fs::read_to_string(&copied).unwrap(), "data");
        let meta = fs::metadata(&copied).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&meta), old);
        assert!(src.join("inner").exists());
    }

    #[test]
    fn test_move_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("dst");
        fs::create_dir(&dst).unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        let backend = LocalBackend::new();
        assert!(
            run(
                &backend,
                BackendOp::Move {
                    files: vec![s(&file)],
                    destination: s(&dst),
                }
            )
            .success
        );
        assert!(!file.exists());
        assert!(dst.join("f.txt").exists());

        assert!(
            run(
                &backend,
                BackendOp::Delete {
                    files: vec![s(&dst)]
                }
            )
            .success
        );
        assert!(!dst.exists());
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        let response = run(
            &LocalBackend::new(),
            BackendOp::Rename {
                path: s(&dir.path().join("a")),
                new_name: "b".into(),
            },
        );
        assert!(!response.success);
    }

    #[test]
    fn test_zip_contains_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("docs");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("readme.txt"), "hello zip").unwrap();
        let archive = dir.path().join("out.zip");

        let response = run(
            &LocalBackend::new(),
            BackendOp::Zip {
                files: vec![s(&src)],
                destination: s(&archive),
            },
        );
        assert!(response.success, "{:?}", response.error);

        let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("docs/readme.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello zip");
    }

    #[test]
    fn test_directory_size_counts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("sub").join("b"), vec![0u8; 50]).unwrap();

        let op = BackendOp::DirectorySize { path: s(dir.path()) };
        let value = normalize(run(&LocalBackend::new(), op.clone()), &op).unwrap();
        let totals: DirectorySize = serde_json::from_value(value).unwrap();
        assert_eq!(
            totals,
            DirectorySize {
                total_size: 150,
                file_count: 2,
                directory_count: 1
            }
        );
    }

    #[test]
    fn test_compare_trees() {
        let dir = tempfile::tempdir().unwrap();
        let left = dir.path().join("l");
        let right = dir.path().join("r");
        fs::create_dir_all(&left).unwrap();
        fs::create_dir_all(&right).unwrap();
        fs::write(left.join("only.txt"), "1").unwrap();
        fs::write(left.join("both.txt"), "same").unwrap();
        fs::write(right.join("both.txt"), "same").unwrap();
        let stamp = filetime::FileTime::from_unix_time(2_000_000, 0);
        filetime::set_file_mtime(left.join("both.txt"), stamp).unwrap();
        filetime::set_file_mtime(right.join("both.txt"), stamp).unwrap();

        let op = BackendOp::Compare {
            left_path: s(&left),
            right_path: s(&right),
            recursive: true,
        };
        let value = normalize(run(&LocalBackend::new(), op.clone()), &op).unwrap();
        let result: crate::compare::CompareResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.summary.only_in_left, 1);
        assert_eq!(result.summary.identical, 1);
        assert_eq!(result.summary.total_right, 1);
    }

    #[test]
    fn test_remote_paths_are_rejected_with_prefix() {
        let op = BackendOp::List {
            path: "ftp://example.com/pub".into(),
            credentials: None,
        };
        let err = normalize(run(&LocalBackend::new(), op.clone()), &op).unwrap_err();
        assert!(err.to_string().starts_with("FTP: "));
    }

    #[cfg(unix)]
    #[test]
    fn test_launched_program_is_reaped() {
        let reaper = LocalBackend::launch("true", &[]).unwrap();
        let status = reaper.join().unwrap();
        assert!(status.is_some_and(|s| s.success()));
    }

    #[test]
    fn test_launch_missing_program_fails() {
        assert!(LocalBackend::launch("/nonexistent/cmdr-no-such-program", &[]).is_err());
    }

    #[test]
    fn test_clipboard_is_unsupported() {
        let response = run(
            &LocalBackend::new(),
            BackendOp::ClipboardWriteText { text: "x".into() },
        );
        assert!(!response.success);
    }
}
