//! Background task handling for long-running backend requests

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread;

use tracing::{debug, error};

use crate::backend::{Backend, BackendRequest, ProgressEvent, ProgressSink, RawResponse, RequestId};

/// Message from a worker thread
#[derive(Debug)]
pub enum TaskEvent {
    Progress(ProgressEvent),
    Completed {
        id: RequestId,
        response: RawResponse,
    },
}

/// Runs backend requests on worker threads and funnels their progress and
/// completion into a single channel drained by the commander.
pub struct TaskRunner {
    backend: Arc<dyn Backend>,
    tx: Sender<TaskEvent>,
    rx: Receiver<TaskEvent>,
    pending: HashSet<RequestId>,
    next_id: RequestId,
}

impl TaskRunner {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (tx, rx) = channel();
        Self {
            backend,
            tx,
            rx,
            pending: HashSet::new(),
            next_id: 1,
        }
    }

    pub fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `request` on its own thread
    pub fn spawn(&mut self, request: BackendRequest) {
        let id = request.id;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        self.pending.insert(id);
        debug!(id, operation = request.op.name(), "spawning background request");

        thread::spawn(move || {
            let sink = ProgressSink::new(id, tx.clone());
            let response = catch_unwind(AssertUnwindSafe(|| backend.execute(&request, &sink)))
                .unwrap_or_else(|_| {
                    error!(id, operation = request.op.name(), "backend panicked");
                    RawResponse::fail("Backend failed unexpectedly")
                });
            let _ = tx.send(TaskEvent::Completed { id, response });
        });
    }

    /// Next event if one is ready (non-blocking)
    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(self.track(event)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next event. `None` when nothing is pending.
    pub fn recv(&mut self) -> Option<TaskEvent> {
        if self.pending.is_empty() {
            return self.try_recv();
        }
        self.rx.recv().ok().map(|event| self.track(event))
    }

    fn track(&mut self, event: TaskEvent) -> TaskEvent {
        if let TaskEvent::Completed { id, .. } = &event {
            self.pending.remove(id);
        }
        event
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains(&id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
