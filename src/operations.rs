//! File operations: request building, validation and the single
//! cancellable "current operation" slot.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{
    Backend, BackendOp, BackendRequest, CancellationToken, ProgressChannel, ProgressSink, RawResponse,
    RequestId, Service, normalize,
};
use crate::errors::{OperationError, OperationResult};
use crate::fs::path::{PathKind, join_path, path_kind};

/// Logical operation kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Copy,
    Move,
    Zip,
    Delete,
    Rename,
    Mkdir,
}

impl OperationKind {
    pub fn title(self) -> &'static str {
        match self {
            OperationKind::Copy => "Copy",
            OperationKind::Move => "Move",
            OperationKind::Zip => "Zip",
            OperationKind::Delete => "Delete",
            OperationKind::Rename => "Rename",
            OperationKind::Mkdir => "Create directory",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            OperationKind::Copy => "Copied",
            OperationKind::Move => "Moved",
            OperationKind::Zip => "Zipped",
            OperationKind::Delete => "Deleted",
            OperationKind::Rename => "Renamed",
            OperationKind::Mkdir => "Created",
        }
    }

    /// Progress channels this kind reports on
    pub fn progress_channels(self) -> &'static [ProgressChannel] {
        match self {
            OperationKind::Copy | OperationKind::Move => &[
                ProgressChannel::Copy,
                ProgressChannel::FtpDownload,
                ProgressChannel::FtpUpload,
            ],
            OperationKind::Zip => &[ProgressChannel::Zip],
            OperationKind::Delete | OperationKind::Rename | OperationKind::Mkdir => &[],
        }
    }
}

/// A validated operation ready to be sent
#[derive(Clone, Debug, PartialEq)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub service: Service,
    pub op: BackendOp,
    /// Number of top-level items acted on
    pub count: usize,
}

impl OperationDescriptor {
    fn new(kind: OperationKind, op: BackendOp, count: usize) -> Self {
        let service = match op.paths().first().map(|p| path_kind(p)) {
            Some(PathKind::Ftp) if kind == OperationKind::Mkdir || kind == OperationKind::Rename => Service::Ftp,
            _ => Service::FileOperations,
        };
        Self {
            kind,
            service,
            op,
            count,
        }
    }

    /// Status line text once the backend reports success
    pub fn success_message(&self) -> String {
        match &self.op {
            BackendOp::Copy { destination, .. } | BackendOp::Move { destination, .. } => format!(
                "{} {} item(s) to {}",
                self.kind.past_tense(),
                self.count,
                destination
            ),
            BackendOp::Zip { destination, .. } => format!("Created archive {}", destination),
            BackendOp::Rename { new_name, .. } => format!("Renamed to {}", new_name),
            BackendOp::CreateDirectory { path } => format!("Created {}", path),
            _ => format!("{} {} item(s)", self.kind.past_tense(), self.count),
        }
    }
}

/// Reject names that are empty or would escape the target directory
pub fn validate_name(name: &str) -> OperationResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OperationError::Validation("Name cannot be empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(OperationError::Validation(format!("'{}' is not a valid name", name)));
    }
    if name.contains(['/', '\\']) {
        return Err(OperationError::Validation(
            "Name cannot contain path separators".to_string(),
        ));
    }
    Ok(name)
}

fn require_files(files: &[String]) -> OperationResult<()> {
    if files.is_empty() {
        return Err(OperationError::Validation("No files selected".to_string()));
    }
    Ok(())
}

fn require_destination(destination: &str) -> OperationResult<()> {
    if destination.trim().is_empty() {
        return Err(OperationError::Validation("No destination given".to_string()));
    }
    Ok(())
}

pub fn copy(files: Vec<String>, destination: &str) -> OperationResult<OperationDescriptor> {
    require_files(&files)?;
    require_destination(destination)?;
    let count = files.len();
    Ok(OperationDescriptor::new(
        OperationKind::Copy,
        BackendOp::Copy {
            files,
            destination: destination.to_string(),
        },
        count,
    ))
}

pub fn move_to(files: Vec<String>, destination: &str) -> OperationResult<OperationDescriptor> {
    require_files(&files)?;
    require_destination(destination)?;
    let count = files.len();
    Ok(OperationDescriptor::new(
        OperationKind::Move,
        BackendOp::Move {
            files,
            destination: destination.to_string(),
        },
        count,
    ))
}

pub fn delete(files: Vec<String>) -> OperationResult<OperationDescriptor> {
    require_files(&files)?;
    let count = files.len();
    Ok(OperationDescriptor::new(
        OperationKind::Delete,
        BackendOp::Delete { files },
        count,
    ))
}

/// Archive `files` as `archive_name` inside `directory`. ".zip" is appended
/// when missing.
pub fn zip(files: Vec<String>, directory: &str, archive_name: &str) -> OperationResult<OperationDescriptor> {
    require_files(&files)?;
    let name = validate_name(archive_name)?;
    let name = if name.to_lowercase().ends_with(".zip") {
        name.to_string()
    } else {
        format!("{}.zip", name)
    };
    let count = files.len();
    Ok(OperationDescriptor::new(
        OperationKind::Zip,
        BackendOp::Zip {
            files,
            destination: join_path(directory, &name),
        },
        count,
    ))
}

pub fn rename(path: &str, new_name: &str) -> OperationResult<OperationDescriptor> {
    let new_name = validate_name(new_name)?;
    Ok(OperationDescriptor::new(
        OperationKind::Rename,
        BackendOp::Rename {
            path: path.to_string(),
            new_name: new_name.to_string(),
        },
        1,
    ))
}

pub fn mkdir(directory: &str, name: &str) -> OperationResult<OperationDescriptor> {
    let name = validate_name(name)?;
    Ok(OperationDescriptor::new(
        OperationKind::Mkdir,
        BackendOp::CreateDirectory {
            path: join_path(directory, name),
        },
        1,
    ))
}

#[derive(Debug)]
struct CurrentOperation {
    id: RequestId,
    kind: OperationKind,
    cancel: CancellationToken,
}

/// Owns the backend's single cancellable operation slot
pub struct FileOperationsHandler {
    backend: Arc<dyn Backend>,
    current: Option<CurrentOperation>,
}

impl FileOperationsHandler {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_kind(&self) -> Option<OperationKind> {
        self.current.as_ref().map(|c| c.kind)
    }

    pub fn current_id(&self) -> Option<RequestId> {
        self.current.as_ref().map(|c| c.id)
    }

    /// Claim the slot for a long-running operation. The returned request
    /// is meant to be run in the background.
    pub fn begin(&mut self, id: RequestId, descriptor: &OperationDescriptor) -> OperationResult<BackendRequest> {
        if self.current.is_some() {
            warn!(kind = ?descriptor.kind, "operation rejected, slot busy");
            return Err(OperationError::Busy);
        }
        let request = BackendRequest::new(id, descriptor.service, descriptor.op.clone());
        self.current = Some(CurrentOperation {
            id,
            kind: descriptor.kind,
            cancel: request.cancel.clone(),
        });
        info!(id, kind = ?descriptor.kind, count = descriptor.count, "operation started");
        Ok(request)
    }

    /// Normalize the response of a background operation and release the slot
    pub fn finish(&mut self, id: RequestId, op: &BackendOp, response: RawResponse) -> OperationResult<Value> {
        if self.current_id() == Some(id) {
            self.current = None;
        }
        normalize(response, op)
    }

    /// Run a quick operation (rename, mkdir) on the calling thread
    pub fn run_sync(&self, id: RequestId, descriptor: &OperationDescriptor) -> OperationResult<Value> {
        let request = BackendRequest::new(id, descriptor.service, descriptor.op.clone());
        let response = self.backend.execute(&request, &ProgressSink::detached());
        let result = normalize(response, &request.op);
        match &result {
            Ok(_) => info!(id, kind = ?descriptor.kind, "operation completed"),
            Err(e) => warn!(id, kind = ?descriptor.kind, error = %e, "operation failed"),
        }
        result
    }

    /// Cancel the outstanding operation. With `kind` given, only an
    /// operation of that kind is cancelled. Returns whether anything was.
    pub fn cancel_operation(&mut self, kind: Option<OperationKind>) -> bool {
        let matches = self
            .current
            .as_ref()
            .is_some_and(|c| kind.is_none_or(|k| k == c.kind));
        if !matches {
            return false;
        }
        if let Some(current) = self.current.take() {
            current.cancel.cancel();
            self.backend.cancel_current_operation();
            info!(id = current.id, kind = ?current.kind, "operation cancelled");
        }
        true
    }
}
