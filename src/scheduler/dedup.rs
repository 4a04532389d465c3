//! In-flight request deduplication.
//!
//! Identical requests issued while one is still unsettled share a single
//! execution. The key is `METHOD:url:body`; the entry lives until that
//! execution settles, whatever the outcome.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::oneshot;

use crate::error::{GateError, GateResult};
use crate::transport::OutboundRequest;

/// Future handed to every subscriber of a request. Cloneable; all clones
/// resolve to the same value.
pub type ResponseFuture = Shared<BoxFuture<'static, GateResult>>;

/// Deduplication key of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(request: &OutboundRequest) -> Self {
        let method = request.options.method.as_str().to_ascii_uppercase();
        let body = request
            .options
            .body
            .as_ref()
            .map(|b| b.fingerprint_text())
            .unwrap_or("");
        Self(format!("{}:{}:{}", method, request.url, body))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A settle-once channel: the sender goes with the task, the shared future
/// to the callers. A dropped sender resolves as [`GateError::Dropped`].
pub fn response_channel() -> (oneshot::Sender<GateResult>, ResponseFuture) {
    let (tx, rx) = oneshot::channel();
    let future = rx
        .map(|received| received.unwrap_or(Err(GateError::Dropped)))
        .boxed()
        .shared();
    (tx, future)
}

#[derive(Debug)]
struct Entry {
    task_id: u64,
    future: ResponseFuture,
}

/// Fingerprint → shared future of the one execution in flight.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: HashMap<Fingerprint, Entry>,
}

impl InFlightRegistry {
    /// Subscribe to an unsettled execution, if there is one.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<ResponseFuture> {
        self.entries.get(fingerprint).map(|e| e.future.clone())
    }

    pub fn insert(&mut self, fingerprint: Fingerprint, task_id: u64, future: ResponseFuture) {
        self.entries.insert(fingerprint, Entry { task_id, future });
    }

    /// Remove the entry owned by `task_id`. Returns false when the key is
    /// absent or belongs to another execution.
    pub fn remove(&mut self, fingerprint: &Fingerprint, task_id: u64) -> bool {
        match self.entries.get(fingerprint) {
            Some(entry) if entry.task_id == task_id => {
                self.entries.remove(fingerprint);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
