//! Backend contract
//!
//! Every filesystem action goes through a [`Backend`]: the commander builds a
//! [`BackendRequest`], the backend answers with a loosely-shaped
//! [`RawResponse`], and [`normalize`] turns that into a typed result at the
//! boundary so nothing past this module inspects raw payloads.
//!
//! Long-running requests report progress on named channels through a
//! [`ProgressSink`]. Events carry the request id when the backend can
//! correlate them, which lets the commander drop output from superseded work.

pub mod local;
#[cfg(test)]
pub mod memory;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::background::TaskEvent;
use crate::errors::{OperationError, OperationResult, Protocol};
use crate::fs::path::{PathKind, path_kind};
use crate::state::SmbCredentials;

pub use local::LocalBackend;
#[cfg(test)]
pub use memory::MemoryBackend;

/// Identifier attached to every request issued by the commander
pub type RequestId = u64;

/// Backend service a request is addressed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Service {
    FileOperations,
    Ftp,
    /// Host integration such as the system clipboard
    System,
}

/// A single backend action, serialized with an `operation` tag
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BackendOp {
    List {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        credentials: Option<SmbCredentials>,
    },
    DriveInfo,
    Copy { files: Vec<String>, destination: String },
    Move { files: Vec<String>, destination: String },
    Delete { files: Vec<String> },
    Rename { path: String, new_name: String },
    CreateDirectory { path: String },
    WriteFile { path: String, content: String },
    /// Archive `files` into the zip file at `destination`
    Zip { files: Vec<String>, destination: String },
    Compare { left_path: String, right_path: String, recursive: bool },
    DirectorySize { path: String },
    ExecuteCommand { command: String, args: Vec<String> },
    OpenWithApp { path: String, app: String },
    ClipboardWriteText { text: String },
}

impl BackendOp {
    /// Wire name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            BackendOp::List { .. } => "list",
            BackendOp::DriveInfo => "drive-info",
            BackendOp::Copy { .. } => "copy",
            BackendOp::Move { .. } => "move",
            BackendOp::Delete { .. } => "delete",
            BackendOp::Rename { .. } => "rename",
            BackendOp::CreateDirectory { .. } => "create-directory",
            BackendOp::WriteFile { .. } => "write-file",
            BackendOp::Zip { .. } => "zip",
            BackendOp::Compare { .. } => "compare",
            BackendOp::DirectorySize { .. } => "directory-size",
            BackendOp::ExecuteCommand { .. } => "execute-command",
            BackendOp::OpenWithApp { .. } => "open-with-app",
            BackendOp::ClipboardWriteText { .. } => "clipboard-write-text",
        }
    }

    /// Paths the operation reads or writes, used to pick the error prefix
    pub fn paths(&self) -> Vec<&str> {
        match self {
            BackendOp::List { path, .. }
            | BackendOp::Rename { path, .. }
            | BackendOp::CreateDirectory { path }
            | BackendOp::WriteFile { path, .. }
            | BackendOp::DirectorySize { path }
            | BackendOp::OpenWithApp { path, .. } => vec![path.as_str()],
            BackendOp::Copy { files, destination }
            | BackendOp::Move { files, destination }
            | BackendOp::Zip { files, destination } => files
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(destination.as_str()))
                .collect(),
            BackendOp::Delete { files } => files.iter().map(String::as_str).collect(),
            BackendOp::Compare { left_path, right_path, .. } => {
                vec![left_path.as_str(), right_path.as_str()]
            }
            BackendOp::DriveInfo
            | BackendOp::ExecuteCommand { .. }
            | BackendOp::ClipboardWriteText { .. } => Vec::new(),
        }
    }

    /// Network protocol involved, if any path is remote
    pub fn protocol(&self) -> Option<Protocol> {
        self.paths().into_iter().find_map(|p| match path_kind(p) {
            PathKind::Ftp => Some(Protocol::Ftp),
            PathKind::Smb => Some(Protocol::Smb),
            PathKind::Local => None,
        })
    }
}

/// Cooperative cancellation flag shared with the thread running a request
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A request as handed to a backend
#[derive(Clone, Debug)]
pub struct BackendRequest {
    pub id: RequestId,
    pub service: Service,
    pub op: BackendOp,
    pub cancel: CancellationToken,
}

impl BackendRequest {
    pub fn new(id: RequestId, service: Service, op: BackendOp) -> Self {
        Self {
            id,
            service,
            op,
            cancel: CancellationToken::new(),
        }
    }
}

/// Response exactly as a backend produced it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub needs_auth: bool,
}

impl RawResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn auth_required() -> Self {
        Self {
            success: false,
            needs_auth: true,
            error: Some("Authentication required".to_string()),
            ..Default::default()
        }
    }
}

/// Implemented by anything that can carry out [`BackendOp`]s.
pub trait Backend: Send + Sync {
    /// Run a request to completion. Called on worker threads for
    /// long-running operations and on the UI thread for quick ones.
    fn execute(&self, request: &BackendRequest, progress: &ProgressSink) -> RawResponse;

    /// Ask the backend to abandon whatever file operation it is running.
    /// Must return without waiting for the work to stop.
    fn cancel_current_operation(&self);
}

/// Named progress event channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgressChannel {
    Zip,
    Copy,
    FtpDownload,
    FtpUpload,
    Compare,
    DirectorySize,
}

impl ProgressChannel {
    pub fn event_name(self) -> &'static str {
        match self {
            ProgressChannel::Zip => "zip-progress",
            ProgressChannel::Copy => "copy-progress",
            ProgressChannel::FtpDownload => "ftp-download-progress",
            ProgressChannel::FtpUpload => "ftp-upload-progress",
            ProgressChannel::Compare => "compare-progress",
            ProgressChannel::DirectorySize => "directory-size-progress",
        }
    }
}

/// Byte or item progress of a transfer-like operation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferProgress {
    pub current: u64,
    pub total: u64,
    pub file_name: String,
    pub percentage: f64,
}

impl TransferProgress {
    pub fn new(current: u64, total: u64, file_name: impl Into<String>) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (current as f64 / total as f64 * 100.0).min(100.0)
        };
        Self {
            current,
            total,
            file_name: file_name.into(),
            percentage,
        }
    }

    /// Completed fraction in `0.0..=1.0`. A zero total reads as no progress.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// Partial totals from a directory size walk. Absent fields mean
/// "unchanged", not zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SizeProgress {
    pub current_file: Option<String>,
    pub file_count: Option<u64>,
    pub directory_count: Option<u64>,
    pub total_size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressPayload {
    Transfer(TransferProgress),
    Size(SizeProgress),
}

/// One progress notification
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub channel: ProgressChannel,
    /// `None` when the backend could not tell which request it belongs to
    pub request_id: Option<RequestId>,
    pub payload: ProgressPayload,
}

/// Where a backend reports progress for one request
#[derive(Clone, Debug)]
pub struct ProgressSink {
    request_id: RequestId,
    tx: Option<Sender<TaskEvent>>,
}

impl ProgressSink {
    pub(crate) fn new(request_id: RequestId, tx: Sender<TaskEvent>) -> Self {
        Self {
            request_id,
            tx: Some(tx),
        }
    }

    /// A sink that drops everything, for synchronous calls
    pub fn detached() -> Self {
        Self {
            request_id: 0,
            tx: None,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Report progress tagged with this sink's request
    pub fn emit(&self, channel: ProgressChannel, payload: ProgressPayload) {
        self.send(channel, Some(self.request_id), payload);
    }

    /// Report progress without a request id
    pub fn emit_uncorrelated(&self, channel: ProgressChannel, payload: ProgressPayload) {
        self.send(channel, None, payload);
    }

    fn send(&self, channel: ProgressChannel, request_id: Option<RequestId>, payload: ProgressPayload) {
        if let Some(tx) = &self.tx {
            // Receiver gone means the commander was unmounted
            let _ = tx.send(TaskEvent::Progress(ProgressEvent {
                channel,
                request_id,
                payload,
            }));
        }
    }
}

/// Flattened `{success, message}` shape for surfacing a result in the UI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn from_result<T>(result: &OperationResult<T>, success_message: impl Into<String>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                message: success_message.into(),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

fn message_from(data: Option<&Value>) -> Option<String> {
    let obj = data?.as_object()?;
    ["error", "message"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn failure(message: String, protocol: Option<Protocol>) -> OperationError {
    match protocol {
        Some(protocol) => OperationError::Network { protocol, message },
        None => OperationError::Backend(message),
    }
}

/// Turn a raw response into a typed result.
///
/// Handles both failure shapes backends produce: a top-level
/// `success: false`, and a successful envelope whose `data` object itself
/// reports `success: false`. A nested `{success: true, data}` envelope is
/// unwrapped one level.
pub fn normalize(response: RawResponse, op: &BackendOp) -> OperationResult<Value> {
    let protocol = op.protocol();
    let data_needs_auth = response
        .data
        .as_ref()
        .and_then(|d| d.get("needsAuth"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if response.needs_auth || data_needs_auth {
        let path = op.paths().first().map(|p| p.to_string()).unwrap_or_default();
        return Err(OperationError::AuthRequired { path });
    }

    if !response.success {
        let message = response
            .error
            .filter(|e| !e.is_empty())
            .or_else(|| message_from(response.data.as_ref()))
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(failure(message, protocol));
    }

    let data = response.data.unwrap_or(Value::Null);
    match data.get("success").and_then(Value::as_bool) {
        Some(false) => {
            let message = message_from(Some(&data)).unwrap_or_else(|| "Unknown error".to_string());
            Err(failure(message, protocol))
        }
        Some(true) => Ok(data.get("data").cloned().unwrap_or(Value::Null)),
        None => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(path: &str) -> BackendOp {
        BackendOp::List {
            path: path.to_string(),
            credentials: None,
        }
    }

    #[test]
    fn test_payload_is_tagged_kebab_case() {
        let request = BackendRequest::new(
            1,
            Service::FileOperations,
            BackendOp::Rename {
                path: "/a/b".into(),
                new_name: "c".into(),
            },
        );
        assert_eq!(
            serde_json::to_value(&request.op).unwrap(),
            json!({"operation": "rename", "path": "/a/b", "newName": "c"})
        );
        let drive = BackendRequest::new(2, Service::FileOperations, BackendOp::DriveInfo);
        assert_eq!(serde_json::to_value(&drive.op).unwrap(), json!({"operation": "drive-info"}));
    }

    #[test]
    fn test_normalize_success_passes_data() {
        let result = normalize(RawResponse::ok(json!([1, 2])), &list("/"));
        assert_eq!(result, Ok(json!([1, 2])));
    }

    #[test]
    fn test_normalize_inner_failure() {
        let response = RawResponse::ok(json!({"success": false, "error": "disk full"}));
        let result = normalize(response, &list("/tmp"));
        assert_eq!(result, Err(OperationError::Backend("disk full".into())));
    }

    #[test]
    fn test_normalize_unwraps_nested_envelope() {
        let response = RawResponse::ok(json!({"success": true, "data": {"n": 3}}));
        assert_eq!(normalize(response, &list("/")), Ok(json!({"n": 3})));
    }

    #[test]
    fn test_normalize_prefixes_ftp_errors() {
        let result = normalize(RawResponse::fail("530 Login incorrect"), &list("ftp://host/pub"));
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "FTP: 530 Login incorrect");
    }

    #[test]
    fn test_normalize_needs_auth() {
        let result = normalize(RawResponse::auth_required(), &list("\\\\nas\\share"));
        assert_eq!(
            result,
            Err(OperationError::AuthRequired {
                path: "\\\\nas\\share".into()
            })
        );
    }

    #[test]
    fn test_missing_error_message() {
        let response = RawResponse {
            success: false,
            ..Default::default()
        };
        let err = normalize(response, &list("/")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn test_outcome_flattens_result() {
        let ok: OperationResult<()> = Ok(());
        assert_eq!(
            OperationOutcome::from_result(&ok, "Done"),
            OperationOutcome { success: true, message: "Done".into() }
        );
        let err: OperationResult<()> = Err(OperationError::Busy);
        assert!(!OperationOutcome::from_result(&err, "Done").success);
    }

    #[test]
    fn test_transfer_progress_zero_total() {
        let progress = TransferProgress::new(0, 0, "a.txt");
        assert_eq!(progress.percentage, 0.0);
        assert_eq!(progress.ratio(), 0.0);
        assert_eq!(TransferProgress::new(50, 200, "b").percentage, 25.0);
    }
}
