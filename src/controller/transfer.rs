//! Clipboard, drag and drop, file operations, compare and directory size

use tracing::{debug, info, warn};

use super::{Commander, Dialog, DragSession, InFlight, OperationDialog, OperationTicket};
use crate::backend::{
    BackendOp, BackendRequest, OperationOutcome, RawResponse, RequestId, Service, normalize,
};
use crate::compare::{CompareDialog, CompareRequest, CompareResult};
use crate::dir_size::{DirectorySize, SizeDialog};
use crate::errors::{OperationError, OperationResult};
use crate::fs::path::{get_parent_path, last_segment, normalize_for_compare, same_directory};
use crate::operations::{self, OperationDescriptor};
use crate::state::{ClipboardOp, Side};

/// Whether `dir` is `path` or lies below it
fn is_within(dir: &str, path: &str) -> bool {
    let dir = normalize_for_compare(dir);
    let path = normalize_for_compare(path);
    dir == path || dir.strip_prefix(&path).is_some_and(|rest| rest.starts_with('/'))
}

/// Split `paths` into those that can go to `destination` and those that
/// already live there or contain it
fn split_transferable(paths: Vec<String>, destination: &str) -> (Vec<String>, Vec<String>) {
    paths
        .into_iter()
        .partition(|f| !same_directory(&get_parent_path(f), destination) && !is_within(destination, f))
}

impl Commander {
    // Clipboard

    pub fn copy_to_clipboard(&mut self) {
        self.fill_clipboard(ClipboardOp::Copy);
    }

    pub fn cut_to_clipboard(&mut self) {
        self.fill_clipboard(ClipboardOp::Cut);
    }

    fn fill_clipboard(&mut self, operation: ClipboardOp) {
        let files = self.panes.get_active_pane().target_paths();
        if files.is_empty() {
            self.status.info("Nothing selected");
            return;
        }
        let verb = match operation {
            ClipboardOp::Copy => "copied",
            ClipboardOp::Cut => "cut",
        };
        self.status.info(format!("{} item(s) {} to clipboard", files.len(), verb));
        self.session.set_clipboard(files, operation);
    }

    /// Paste into the active pane. A cut clipboard is emptied once the
    /// move succeeds, and kept if it fails.
    pub fn paste(&mut self) -> OperationResult<Option<RequestId>> {
        let Some(clipboard) = self.session.clipboard().cloned() else {
            self.status.info("Clipboard is empty");
            return Ok(None);
        };
        let destination = self.panes.get_active_pane().current_path.clone();
        let (files, skipped) = split_transferable(clipboard.files, &destination);
        if files.is_empty() {
            self.report_skipped(&skipped);
            return Ok(None);
        }

        let cut = clipboard.operation == ClipboardOp::Cut;
        let mut refresh = vec![destination.clone()];
        let descriptor = if cut {
            refresh.extend(files.iter().map(|f| get_parent_path(f)));
            operations::move_to(files, &destination)
        } else {
            operations::copy(files, &destination)
        };
        let descriptor = self.report(descriptor)?;
        self.start_operation(descriptor, refresh, cut).map(Some)
    }

    // Drag and drop

    /// Begin dragging from `side`. A selected item drags the whole
    /// selection, anything else drags just itself.
    pub fn start_drag(&mut self, side: Side, item_index: usize) -> Option<&DragSession> {
        let pane = self.panes.pane(side);
        let item = pane.items.get(item_index).filter(|item| !item.is_parent())?;
        let dragged_paths = if pane.is_selected(item_index) {
            pane.selected_items().into_iter().map(|i| i.path.clone()).collect()
        } else {
            vec![item.path.clone()]
        };
        self.drag = Some(DragSession {
            is_internal_drag: true,
            source_path: pane.current_path.clone(),
            dragged_paths,
        });
        self.drag.as_ref()
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// Finish the current drag over `side`, optionally onto a directory row
    pub fn drop_on(&mut self, side: Side, target_index: Option<usize>) -> OperationResult<Option<RequestId>> {
        let Some(drag) = self.drag.take() else {
            return Ok(None);
        };
        self.drop_paths(side, target_index, drag)
    }

    /// Paths dropped in from outside the app are always copied
    pub fn drop_external(
        &mut self,
        side: Side,
        target_index: Option<usize>,
        paths: Vec<String>,
    ) -> OperationResult<Option<RequestId>> {
        let Some(first) = paths.first() else {
            return Ok(None);
        };
        let drag = DragSession {
            is_internal_drag: false,
            source_path: get_parent_path(first),
            dragged_paths: paths,
        };
        self.drop_paths(side, target_index, drag)
    }

    fn report_skipped(&mut self, skipped: &[String]) {
        match skipped {
            [only] => self
                .status
                .info(format!("'{}' is already in the destination", last_segment(only))),
            _ => self
                .status
                .info(format!("{} item(s) already in the destination", skipped.len())),
        }
    }

    fn drop_paths(
        &mut self,
        side: Side,
        target_index: Option<usize>,
        drag: DragSession,
    ) -> OperationResult<Option<RequestId>> {
        let pane = self.panes.pane(side);
        let destination = target_index
            .and_then(|i| pane.items.get(i))
            .filter(|item| item.is_directory)
            .map(|item| item.path.clone())
            .unwrap_or_else(|| pane.current_path.clone());

        let (files, skipped) = split_transferable(drag.dragged_paths, &destination);
        if files.is_empty() {
            self.report_skipped(&skipped);
            return Ok(None);
        }

        let is_move = drag.is_internal_drag && !same_directory(&drag.source_path, &destination);
        debug!(count = files.len(), is_move, destination = %destination, "drop");
        let mut refresh = vec![destination.clone()];
        let descriptor = if is_move {
            refresh.push(drag.source_path);
            operations::move_to(files, &destination)
        } else {
            operations::copy(files, &destination)
        };
        let descriptor = self.report(descriptor)?;
        self.start_operation(descriptor, refresh, false).map(Some)
    }

    // Pane to pane

    pub fn copy_to_other_pane(&mut self) -> OperationResult<Option<RequestId>> {
        self.transfer_to_other_pane(false)
    }

    pub fn move_to_other_pane(&mut self) -> OperationResult<Option<RequestId>> {
        self.transfer_to_other_pane(true)
    }

    fn transfer_to_other_pane(&mut self, is_move: bool) -> OperationResult<Option<RequestId>> {
        let source = self.panes.get_active_pane();
        let files = source.target_paths();
        if files.is_empty() {
            self.status.info("Nothing selected");
            return Ok(None);
        }
        let source_path = source.current_path.clone();
        let destination = self.panes.get_inactive_pane().current_path.clone();
        if same_directory(&source_path, &destination) {
            self.status.info("Source and destination are the same");
            return Ok(None);
        }
        let descriptor = if is_move {
            operations::move_to(files, &destination)
        } else {
            operations::copy(files, &destination)
        };
        let descriptor = self.report(descriptor)?;
        self.start_operation(descriptor, vec![source_path, destination], false)
            .map(Some)
    }

    /// Delete the active pane's targets. Confirmation is the caller's job.
    pub fn delete_targets(&mut self) -> OperationResult<Option<RequestId>> {
        let pane = self.panes.get_active_pane();
        let files = pane.target_paths();
        if files.is_empty() {
            self.status.info("Nothing selected");
            return Ok(None);
        }
        let mut refresh = vec![pane.current_path.clone()];
        refresh.extend(files.iter().cloned());
        let descriptor = self.report(operations::delete(files))?;
        self.start_operation(descriptor, refresh, false).map(Some)
    }

    /// Archive the active pane's targets into the same directory
    pub fn zip_targets(&mut self, archive_name: &str) -> OperationResult<Option<RequestId>> {
        let pane = self.panes.get_active_pane();
        let files = pane.target_paths();
        if files.is_empty() {
            self.status.info("Nothing selected");
            return Ok(None);
        }
        let directory = pane.current_path.clone();
        let descriptor = self.report(operations::zip(files, &directory, archive_name))?;
        self.start_operation(descriptor, vec![directory], false).map(Some)
    }

    // Quick operations

    pub fn rename_focused(&mut self, new_name: &str) -> OperationResult<()> {
        let Some(item) = self
            .panes
            .get_active_pane()
            .focused_item()
            .filter(|item| !item.is_parent())
            .cloned()
        else {
            return Ok(());
        };
        if item.name == new_name.trim() {
            return Ok(());
        }
        let descriptor = self.report(operations::rename(&item.path, new_name))?;
        self.run_quick_operation(&descriptor, new_name.trim())
    }

    pub fn create_directory(&mut self, name: &str) -> OperationResult<()> {
        let directory = self.panes.get_active_pane().current_path.clone();
        let descriptor = self.report(operations::mkdir(&directory, name))?;
        self.run_quick_operation(&descriptor, name.trim())
    }

    /// Create an empty file in the active pane
    pub fn create_file(&mut self, name: &str) -> OperationResult<()> {
        let name = self.report(operations::validate_name(name).map(str::to_string))?;
        let directory = self.panes.get_active_pane().current_path.clone();
        let path = crate::fs::path::join_path(&directory, &name);
        let result = self.run_quick(
            Service::FileOperations,
            BackendOp::WriteFile {
                path,
                content: String::new(),
            },
        );
        self.report(result)?;
        self.status.info(format!("Created {}", name));
        self.refresh_and_focus(&name);
        Ok(())
    }

    fn run_quick_operation(&mut self, descriptor: &OperationDescriptor, focus_name: &str) -> OperationResult<()> {
        let id = self.tasks.next_request_id();
        let result = self.operations.run_sync(id, descriptor);
        self.report(result)?;
        self.status.info(descriptor.success_message());
        self.refresh_and_focus(focus_name);
        Ok(())
    }

    /// Refresh every pane showing the active directory and focus `name` in the active one
    fn refresh_and_focus(&mut self, name: &str) {
        let side = self.panes.active_side();
        let directory = self.panes.pane(side).current_path.clone();
        if same_directory(&self.panes.pane(side.other()).current_path, &directory) {
            let _ = self.refresh(side.other());
        }
        let _ = self.reload(side, Some(name));
    }

    fn refresh_showing(&mut self, dirs: &[String]) {
        for side in [Side::Left, Side::Right] {
            let current = self.panes.pane(side).current_path.clone();
            if dirs.iter().any(|d| same_directory(d, &current)) {
                let _ = self.refresh(side);
            }
        }
    }

    // Background operations

    fn start_operation(
        &mut self,
        descriptor: OperationDescriptor,
        refresh_dirs: Vec<String>,
        clear_clipboard: bool,
    ) -> OperationResult<RequestId> {
        if self.operations.is_busy() {
            return self.report(Err(OperationError::Busy));
        }
        self.close_dialog();
        let id = self.tasks.next_request_id();
        let request = self.operations.begin(id, &descriptor);
        let request = self.report(request)?;

        self.dialog = Some(Dialog::Operation(OperationDialog {
            request_id: id,
            kind: descriptor.kind,
            count: descriptor.count,
            progress: None,
        }));
        self.in_flight.insert(
            id,
            InFlight::Operation(OperationTicket {
                descriptor,
                refresh_dirs,
                clear_clipboard,
            }),
        );
        self.tasks.spawn(request);
        Ok(id)
    }

    pub(super) fn complete_operation(&mut self, id: RequestId, ticket: OperationTicket, response: RawResponse) {
        let result = self.operations.finish(id, &ticket.descriptor.op, response);
        let showing = matches!(&self.dialog, Some(Dialog::Operation(d)) if d.request_id == id);
        if showing {
            self.dialog = None;
        }
        let outcome = OperationOutcome::from_result(&result, ticket.descriptor.success_message());
        match (outcome.success, showing) {
            (true, _) => {
                info!(id, kind = ?ticket.descriptor.kind, "operation completed");
                self.status.info(outcome.message);
                if ticket.clear_clipboard {
                    self.session.clear_clipboard();
                }
            }
            (false, true) => {
                warn!(id, kind = ?ticket.descriptor.kind, error = %outcome.message, "operation failed");
                self.status.error(outcome.message);
            }
            (false, false) => debug!(id, error = %outcome.message, "operation ended after its dialog was closed"),
        }
        self.refresh_showing(&ticket.refresh_dirs);
    }

    /// Cancel the running file operation, if any
    pub fn cancel_operation(&mut self) -> bool {
        if matches!(self.dialog, Some(Dialog::Operation(_))) {
            self.close_dialog();
            return true;
        }
        let cancelled = self.operations.cancel_operation(None);
        if cancelled {
            self.status.info("Operation cancelled");
        }
        cancelled
    }

    fn operation_dialog_open(&self) -> bool {
        matches!(self.dialog, Some(Dialog::Operation(_)))
    }

    // Compare

    /// Compare the left pane's directory with the right one's. A newer
    /// compare replaces the dialog; the older result is dropped on arrival.
    pub fn handle_compare(&mut self, recursive: bool) -> OperationResult<RequestId> {
        if self.operation_dialog_open() {
            return self.report(Err(OperationError::Busy));
        }
        self.close_dialog();
        let request = CompareRequest {
            left_path: self.panes.pane(Side::Left).current_path.clone(),
            right_path: self.panes.pane(Side::Right).current_path.clone(),
            recursive,
        };
        let id = self.tasks.next_request_id();
        let backend_request = BackendRequest::new(
            id,
            Service::FileOperations,
            BackendOp::Compare {
                left_path: request.left_path.clone(),
                right_path: request.right_path.clone(),
                recursive,
            },
        );
        self.dialog = Some(Dialog::Compare(CompareDialog::waiting(id, request)));
        self.in_flight.insert(id, InFlight::Compare);
        self.tasks.spawn(backend_request);
        Ok(id)
    }

    /// Re-run the open compare with the recursive flag flipped
    pub fn toggle_compare_recursive(&mut self) -> OperationResult<Option<RequestId>> {
        let Some(Dialog::Compare(d)) = &self.dialog else {
            return Ok(None);
        };
        let recursive = !d.request.recursive;
        self.handle_compare(recursive).map(Some)
    }

    pub(super) fn complete_compare(&mut self, id: RequestId, response: RawResponse) {
        let Some(Dialog::Compare(d)) = &self.dialog else {
            debug!(id, "compare result arrived after the dialog closed");
            return;
        };
        if d.request_id != id {
            debug!(id, current = d.request_id, "discarding superseded compare result");
            return;
        }
        let op = BackendOp::Compare {
            left_path: d.request.left_path.clone(),
            right_path: d.request.right_path.clone(),
            recursive: d.request.recursive,
        };
        let result = normalize(response, &op).and_then(|value| {
            serde_json::from_value::<CompareResult>(value)
                .map_err(|e| OperationError::Backend(format!("Malformed compare result: {}", e)))
        });
        match result {
            Ok(result) => {
                if let Some(Dialog::Compare(d)) = &mut self.dialog {
                    d.finish(result);
                }
            }
            Err(e) => {
                warn!(id, error = %e, "compare failed");
                self.dialog = None;
                self.status.error(e.to_string());
            }
        }
    }

    // Directory size

    /// Show the size of the focused item. Files are answered from the
    /// listing; directories (and `..`, meaning the current one) are walked
    /// in the background.
    pub fn show_directory_size(&mut self) -> OperationResult<Option<RequestId>> {
        if self.operation_dialog_open() {
            return self.report(Err(OperationError::Busy));
        }
        let pane = self.panes.get_active_pane();
        let Some(item) = pane.focused_item().cloned() else {
            return Ok(None);
        };
        let current_path = pane.current_path.clone();
        self.close_dialog();

        if !item.is_directory {
            self.dialog = Some(Dialog::DirectorySize(SizeDialog::for_file(&item)));
            return Ok(None);
        }
        let (path, name) = if item.is_parent() {
            (current_path.clone(), last_segment(&current_path).to_string())
        } else {
            (item.path.clone(), item.name.clone())
        };
        let id = self.tasks.next_request_id();
        let request = BackendRequest::new(
            id,
            Service::FileOperations,
            BackendOp::DirectorySize { path: path.clone() },
        );
        self.dialog = Some(Dialog::DirectorySize(SizeDialog::computing(
            id,
            request.cancel.clone(),
            &path,
            &name,
        )));
        self.in_flight.insert(id, InFlight::DirectorySize);
        self.tasks.spawn(request);
        Ok(Some(id))
    }

    pub(super) fn complete_directory_size(&mut self, id: RequestId, response: RawResponse) {
        let Some(Dialog::DirectorySize(d)) = &self.dialog else {
            debug!(id, "directory size arrived after the dialog closed");
            return;
        };
        if d.request_id != Some(id) {
            debug!(id, "discarding stale directory size");
            return;
        }
        let op = BackendOp::DirectorySize { path: d.path.clone() };
        let result = normalize(response, &op).and_then(|value| {
            serde_json::from_value::<DirectorySize>(value)
                .map_err(|e| OperationError::Backend(format!("Malformed size result: {}", e)))
        });
        match result {
            Ok(totals) => {
                if let Some(Dialog::DirectorySize(d)) = &mut self.dialog {
                    d.finish(totals);
                }
            }
            Err(e) => {
                warn!(id, error = %e, "directory size failed");
                self.dialog = None;
                self.status.error(e.to_string());
            }
        }
    }

    /// Copy the focused item's path to the system clipboard, with any
    /// inline password masked
    pub fn copy_focused_path_to_system_clipboard(&mut self) -> OperationResult<()> {
        let Some(item) = self.panes.get_active_pane().focused_item() else {
            return Ok(());
        };
        let text = crate::fs::path::redact_credentials(&item.path);
        let result = self.run_quick(Service::System, BackendOp::ClipboardWriteText { text: text.clone() });
        self.report(result)?;
        self.status.info(format!("Copied {}", text));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::super::tests::{commander_at, names};
    use super::*;
    use crate::backend::{MemoryBackend, ProgressChannel, ProgressEvent, ProgressPayload, TransferProgress};
    use crate::background::TaskEvent;

    fn focus(commander: &mut Commander, name: &str) {
        while commander.active_pane().focused_item().map(|i| i.name.as_str()) != Some(name) {
            commander.move_focus(1, false);
        }
    }

    fn index_of(commander: &Commander, side: Side, name: &str) -> usize {
        commander.pane(side).item_index_by_name(name).unwrap()
    }

    /// Wait until the backend has received `count` requests named `op`
    fn wait_for_requests(backend: &MemoryBackend, op: &str, count: usize) {
        for _ in 0..500 {
            if backend.requests_named(op).len() >= count {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("backend never received {} {} request(s)", count, op);
    }

    #[test]
    fn test_drop_in_same_directory_is_a_no_op() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/f.txt", 1, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");

        let index = index_of(&c, Side::Left, "f.txt");
        assert!(c.start_drag(Side::Left, index).is_some());
        assert_eq!(c.drop_on(Side::Left, None).unwrap(), None);

        assert!(backend.requests_named("copy").is_empty());
        assert!(backend.requests_named("move").is_empty());
        assert_eq!(c.status().text(), Some("'f.txt' is already in the destination"));
        assert!(c.drag().is_none());
    }

    #[test]
    fn test_drop_on_other_pane_moves() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/f.txt", 1, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");

        let index = index_of(&c, Side::Left, "f.txt");
        c.start_drag(Side::Left, index);
        assert!(c.drop_on(Side::Right, None).unwrap().is_some());
        c.wait_idle();

        assert_eq!(backend.requests_named("move").len(), 1);
        assert_eq!(names(c.pane(Side::Right)), vec!["..", "f.txt"]);
        assert_eq!(names(c.pane(Side::Left)), vec![".."]);
    }

    #[test]
    fn test_drag_of_selected_item_carries_selection() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a", 1, None);
        backend.add_file("/l/b", 1, None);
        backend.add_file("/l/c", 1, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");
        focus(&mut c, "a");
        c.toggle_focused_selection();
        c.toggle_focused_selection();

        let drag = c.start_drag(Side::Left, index_of(&c, Side::Left, "b")).unwrap();
        assert_eq!(drag.dragged_paths, vec!["/l/a".to_string(), "/l/b".to_string()]);
        assert!(c.drop_on(Side::Right, None).unwrap().is_some());
        c.wait_idle();

        let moves = backend.requests_named("move");
        assert_eq!(moves.len(), 1);
        assert_eq!(names(c.pane(Side::Right)), vec!["..", "a", "b"]);
        assert_eq!(names(c.pane(Side::Left)), vec!["..", "c"]);

        // An unselected item drags alone
        let drag = c.start_drag(Side::Left, index_of(&c, Side::Left, "c")).unwrap();
        assert_eq!(drag.dragged_paths, vec!["/l/c".to_string()]);
    }

    #[test]
    fn test_drop_onto_directory_row() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/f.txt", 1, None);
        backend.add_dir("/l/sub");
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");

        let file = index_of(&c, Side::Left, "f.txt");
        let sub = index_of(&c, Side::Left, "sub");
        c.start_drag(Side::Left, file);
        c.drop_on(Side::Left, Some(sub)).unwrap();
        c.wait_idle();
        assert!(backend.exists("/l/sub/f.txt"));
        assert!(!backend.exists("/l/f.txt"));

        // A directory cannot be dropped into itself
        c.start_drag(Side::Left, index_of(&c, Side::Left, "sub"));
        assert_eq!(c.drop_on(Side::Left, Some(index_of(&c, Side::Left, "sub"))).unwrap(), None);
    }

    #[test]
    fn test_external_drop_copies() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/outside/pic.png", 5, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/r", "/r");
        c.drop_external(Side::Left, None, vec!["/outside/pic.png".into()])
            .unwrap();
        c.wait_idle();
        assert_eq!(backend.requests_named("copy").len(), 1);
        assert!(backend.exists("/outside/pic.png"));
        assert!(backend.exists("/r/pic.png"));
    }

    #[test]
    fn test_cut_paste_clears_clipboard_on_success() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/src/f", 1, None);
        backend.add_dir("/dst");
        let mut c = commander_at(&backend, "/src", "/dst");
        focus(&mut c, "f");
        c.cut_to_clipboard();
        c.set_active(Side::Right);
        c.paste().unwrap();
        c.wait_idle();

        assert!(c.session().clipboard().is_none());
        assert!(backend.exists("/dst/f"));
        assert_eq!(names(c.pane(Side::Left)), vec![".."]);
        assert_eq!(c.status().text(), Some("Moved 1 item(s) to /dst"));
    }

    #[test]
    fn test_failed_paste_keeps_clipboard() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/src/f", 1, None);
        backend.add_dir("/dst");
        let mut c = commander_at(&backend, "/src", "/dst");
        focus(&mut c, "f");
        c.cut_to_clipboard();
        c.set_active(Side::Right);
        backend.fail_next("move", "EACCES: permission denied");
        c.paste().unwrap();
        c.wait_idle();

        assert!(c.session().clipboard().is_some());
        assert!(c.dialog().is_none());
        assert_eq!(c.status().text(), Some("EACCES: permission denied"));
    }

    #[test]
    fn test_paste_into_source_directory_skips() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/src/f", 1, None);
        let mut c = commander_at(&backend, "/src", "/");
        focus(&mut c, "f");
        c.copy_to_clipboard();
        assert_eq!(c.paste().unwrap(), None);
        assert!(backend.requests_named("copy").is_empty());
    }

    #[test]
    fn test_cut_directory_cannot_be_pasted_into_itself() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_dir("/src/d/sub");
        let mut c = commander_at(&backend, "/src", "/src/d/sub");
        focus(&mut c, "d");
        c.cut_to_clipboard();
        c.set_active(Side::Right);
        assert_eq!(c.paste().unwrap(), None);

        assert!(backend.requests_named("move").is_empty());
        assert!(backend.exists("/src/d/sub"));
        assert!(c.session().clipboard().is_some());
        assert_eq!(c.status().text(), Some("'d' is already in the destination"));

        // The directory itself is no better a target
        c.set_active(Side::Left);
        c.activate_focused().unwrap();
        assert_eq!(c.active_pane().current_path, "/src/d");
        assert_eq!(c.paste().unwrap(), None);
        assert!(backend.requests_named("move").is_empty());
    }

    #[test]
    fn test_second_operation_is_rejected_while_busy() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a", 1, None);
        backend.add_file("/l/b", 1, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");
        focus(&mut c, "a");
        backend.hold_next("copy");
        c.copy_to_other_pane().unwrap();
        assert!(c.is_busy());

        let err = c.copy_to_other_pane().unwrap_err();
        assert_eq!(err, OperationError::Busy);

        backend.release("copy");
        c.wait_idle();
        assert!(!c.is_busy());
        assert_eq!(backend.requests_named("copy").len(), 1);
    }

    #[test]
    fn test_uncorrelated_progress_reaches_operation_dialog() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a", 1, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");
        focus(&mut c, "a");
        backend.hold_next("copy");
        c.copy_to_other_pane().unwrap();

        c.apply_progress(ProgressEvent {
            channel: ProgressChannel::Copy,
            request_id: None,
            payload: ProgressPayload::Transfer(TransferProgress::new(1, 4, "a")),
        });
        // Zip progress never belongs to a copy
        c.apply_progress(ProgressEvent {
            channel: ProgressChannel::Zip,
            request_id: None,
            payload: ProgressPayload::Transfer(TransferProgress::new(3, 4, "z")),
        });
        match c.dialog() {
            Some(Dialog::Operation(d)) => assert_eq!(d.progress.as_ref().map(|p| p.current), Some(1)),
            other => panic!("unexpected dialog {:?}", other),
        }
        backend.release("copy");
        c.wait_idle();
    }

    #[test]
    fn test_uncorrelated_backend_progress_drives_dialog() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a", 1, None);
        backend.add_file("/l/b", 1, None);
        backend.add_dir("/r");
        backend.set_correlated_progress(false);
        let mut c = commander_at(&backend, "/l", "/r");
        c.select_all();
        c.copy_to_other_pane().unwrap();

        let mut progress_events = 0;
        while let Some(event) = c.tasks.recv() {
            match event {
                TaskEvent::Progress(progress) => {
                    assert!(progress.request_id.is_none());
                    c.handle_event(TaskEvent::Progress(progress));
                    match &c.dialog {
                        Some(Dialog::Operation(d)) => assert!(d.progress.is_some()),
                        other => panic!("unexpected dialog {:?}", other),
                    }
                    progress_events += 1;
                }
                completed => {
                    c.handle_event(completed);
                    break;
                }
            }
        }
        assert_eq!(progress_events, 3);
        assert!(c.dialog().is_none());
        assert_eq!(names(c.pane(Side::Right)), vec!["..", "a", "b"]);
    }

    #[test]
    fn test_closing_operation_dialog_cancels() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a", 1, None);
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");
        focus(&mut c, "a");
        backend.hold_next("delete");
        c.delete_targets().unwrap();
        assert!(c.cancel_operation());
        assert!(!c.is_busy());
        assert_eq!(backend.cancel_count(), 1);
        assert_eq!(c.status().text(), Some("Operation cancelled"));
        backend.release("delete");
        c.wait_idle();
    }

    #[test]
    fn test_zip_and_delete_refresh_pane() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/w/a.txt", 10, None);
        let mut c = commander_at(&backend, "/w", "/");
        focus(&mut c, "a.txt");
        c.zip_targets("bundle").unwrap();
        c.wait_idle();
        assert_eq!(names(c.active_pane()), vec!["..", "a.txt", "bundle.zip"]);

        focus(&mut c, "a.txt");
        c.delete_targets().unwrap();
        c.wait_idle();
        assert_eq!(names(c.active_pane()), vec!["..", "bundle.zip"]);
    }

    #[test]
    fn test_rename_and_mkdir_focus_new_entry() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/w/old.txt", 1, None);
        let mut c = commander_at(&backend, "/w", "/w");
        focus(&mut c, "old.txt");
        c.rename_focused("new.txt").unwrap();
        assert_eq!(c.active_pane().focused_item().unwrap().name, "new.txt");
        // The other pane shows the same directory and follows along
        assert_eq!(names(c.pane(Side::Right)), vec!["..", "new.txt"]);

        c.create_directory("made").unwrap();
        assert_eq!(c.active_pane().focused_item().unwrap().name, "made");
        assert!(c.create_directory("a/b").is_err());
        assert_eq!(c.status().text(), Some("Name cannot contain path separators"));

        c.create_file("empty.md").unwrap();
        assert!(backend.exists("/w/empty.md"));
    }

    #[test]
    fn test_compare_last_request_wins() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/l/a.txt", 1, Some(1_000));
        backend.add_file("/r/a.txt", 1, Some(1_500));
        backend.add_file("/r/b.txt", 2, None);
        let mut c = commander_at(&backend, "/l", "/r");

        backend.hold_next("compare");
        let first = c.handle_compare(false).unwrap();
        wait_for_requests(&backend, "compare", 1);
        let second = c.toggle_compare_recursive().unwrap().unwrap();
        c.wait_for(second);
        backend.release("compare");
        c.wait_idle();

        match c.dialog() {
            Some(Dialog::Compare(d)) => {
                assert_ne!(first, second);
                assert_eq!(d.request_id, second);
                assert!(d.request.recursive);
                assert!(!d.waiting);
                assert_eq!(d.result.summary.only_in_right, 1);
                assert_eq!(d.result.summary.identical, 1);
            }
            other => panic!("unexpected dialog {:?}", other),
        }
    }

    #[test]
    fn test_compare_error_closes_dialog() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_dir("/l");
        backend.add_dir("/r");
        let mut c = commander_at(&backend, "/l", "/r");
        backend.fail_next("compare", "EIO: i/o error");
        c.handle_compare(false).unwrap();
        c.wait_idle();
        assert!(c.dialog().is_none());
        assert_eq!(c.status().text(), Some("EIO: i/o error"));
    }

    #[test]
    fn test_file_size_needs_no_request() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/w/blob", 4096, None);
        let mut c = commander_at(&backend, "/w", "/");
        focus(&mut c, "blob");
        assert_eq!(c.show_directory_size().unwrap(), None);
        assert!(backend.requests_named("directory-size").is_empty());
        match c.dialog() {
            Some(Dialog::DirectorySize(d)) => {
                assert_eq!(d.totals.total_size, 4096);
                assert_eq!(d.totals.file_count, 1);
                assert!(!d.is_computing());
            }
            other => panic!("unexpected dialog {:?}", other),
        }
    }

    #[test]
    fn test_directory_size_of_parent_entry_walks_current() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/w/a", 100, None);
        backend.add_file("/w/sub/b", 50, None);
        let mut c = commander_at(&backend, "/w", "/");
        c.show_directory_size().unwrap();
        c.wait_idle();
        match c.dialog() {
            Some(Dialog::DirectorySize(d)) => {
                assert_eq!(d.path, "/w");
                assert_eq!(
                    d.totals,
                    DirectorySize {
                        total_size: 150,
                        file_count: 2,
                        directory_count: 1
                    }
                );
            }
            other => panic!("unexpected dialog {:?}", other),
        }
    }

    #[test]
    fn test_closing_size_dialog_cancels_walk() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/w/sub/b", 50, None);
        let mut c = commander_at(&backend, "/w", "/");
        focus(&mut c, "sub");
        backend.hold_next("directory-size");
        c.show_directory_size().unwrap();
        let token = match c.dialog() {
            Some(Dialog::DirectorySize(d)) => d.cancel.clone().unwrap(),
            other => panic!("unexpected dialog {:?}", other),
        };
        c.close_dialog();
        assert!(token.is_cancelled());
        assert_eq!(backend.cancel_count(), 1);
        backend.release("directory-size");
        c.wait_idle();
        assert!(c.dialog().is_none());
    }

    #[test]
    fn test_copy_focused_path_to_system_clipboard() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/w/a", 1, None);
        let mut c = commander_at(&backend, "/w", "/");
        focus(&mut c, "a");
        c.copy_focused_path_to_system_clipboard().unwrap();
        assert_eq!(backend.clipboard_text().as_deref(), Some("/w/a"));
    }
}
