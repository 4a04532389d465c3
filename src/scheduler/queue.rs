//! Pending queue.

use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::GateResult;
use crate::scheduler::dedup::Fingerprint;
use crate::transport::OutboundRequest;

/// One caller's request waiting for, or holding, an execution slot.
#[derive(Debug)]
pub struct Task {
    pub id: u64,
    pub fingerprint: Fingerprint,
    pub request: OutboundRequest,
    pub enqueued_at: Instant,
    pub responder: oneshot::Sender<GateResult>,
}

impl Task {
    pub fn host(&self) -> &str {
        &self.request.host
    }
}

/// Tasks not yet admitted, in enqueue order. Unbounded; tasks leave only by
/// admission.
#[derive(Debug, Default)]
pub struct PendingQueue {
    tasks: VecDeque<Task>,
}

impl PendingQueue {
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove and return the first task, front to back, that `admissible`
    /// accepts. Tasks of one host are therefore taken in enqueue order.
    pub fn take_first<F>(&mut self, mut admissible: F) -> Option<Task>
    where
        F: FnMut(&Task) -> bool,
    {
        let index = self.tasks.iter().position(|task| admissible(task))?;
        self.tasks.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
