//! Runs admitted requests and feeds their outcome back.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;

use crate::error::GateError;
use crate::observability::metrics;
use crate::resilience::backoff::OverloadSignal;
use crate::scheduler::dedup::Fingerprint;
use crate::scheduler::gate::Inner;
use crate::scheduler::queue::Task;
use crate::transport::{Transport, TransportError};

/// Slots held by an admitted task.
///
/// Dropping it before the task settles gives the slots and the in-flight
/// entry back, e.g. when the runtime is gone and the execution is
/// discarded unpolled.
pub(crate) struct Slot<T: Transport> {
    inner: Arc<Inner<T>>,
    id: u64,
    fingerprint: Fingerprint,
    host: String,
    held: bool,
}

impl<T: Transport> Slot<T> {
    pub(crate) fn new(inner: Arc<Inner<T>>, task: &Task) -> Self {
        Self {
            inner,
            id: task.id,
            fingerprint: task.fingerprint.clone(),
            host: task.request.host.clone(),
            held: true,
        }
    }
}

impl<T: Transport> Drop for Slot<T> {
    fn drop(&mut self) {
        if self.held {
            tracing::warn!(
                host = %self.host,
                fingerprint = %self.fingerprint,
                "Request abandoned before settling, releasing its slots"
            );
            self.inner
                .lock()
                .release(self.id, &self.fingerprint, &self.host);
        }
    }
}

/// Perform one admitted task.
///
/// 429/503 resolve normally and start a heavy backoff; other responses
/// reset the host's backoff; transport errors reject and start a light
/// backoff. Slots are released and the completion recorded only once the
/// transport has settled, then the queue is re-scanned.
pub(crate) async fn execute<T: Transport>(mut slot: Slot<T>, task: Task, admitted_at: Instant) {
    let Task {
        id,
        fingerprint,
        request,
        responder,
        ..
    } = task;
    let inner = Arc::clone(&slot.inner);

    // The transport may panic while building its future as well as while it runs.
    let attempt = AssertUnwindSafe(async { inner.transport.fetch(&request).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(TransportError::Other("transport panicked".to_string())));

    let (signal, outcome, result) = match attempt {
        Ok(response) if response.is_overload() => {
            (Some(OverloadSignal::Heavy), "overloaded", Ok(Arc::new(response)))
        }
        Ok(response) => (None, "ok", Ok(Arc::new(response))),
        Err(e) => {
            tracing::warn!(host = %request.host, url = %request.url, error = %e, "Transport failed");
            (Some(OverloadSignal::Light), "transport_error", Err(GateError::Transport(e)))
        }
    };

    let now = Instant::now();
    slot.held = false;
    let applied = inner
        .lock()
        .settle(id, &fingerprint, &request.host, signal, now);

    if let (Some(signal), Some(cooldown)) = (signal, applied) {
        tracing::warn!(
            host = %request.host,
            signal = signal.as_str(),
            cooldown = ?cooldown,
            "Host backing off"
        );
        metrics::record_backoff(&request.host, signal.as_str());
    }
    metrics::record_settled(&request.host, outcome, now - admitted_at);
    if let Ok(response) = &result {
        tracing::debug!(host = %request.host, status = %response.status, "Request settled");
    }

    let _ = responder.send(result);
    inner.pump();
}
