//! Public handle of the scheduler.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::config::{SchedulerConfig, SchedulerConfigPatch};
use crate::error::GateError;
use crate::observability::metrics;
use crate::scheduler::dedup::ResponseFuture;
use crate::scheduler::executor;
use crate::scheduler::host::HostSnapshot;
use crate::scheduler::state::{GateStats, SchedulerState, Submission};
use crate::transport::{OutboundRequest, RequestOptions, Transport};

/// Admission-controlled entry point for outbound requests.
///
/// Cheap to clone; clones share one scheduler. Independent gates share
/// nothing.
pub struct Gate<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<T> {
    pub(crate) state: Mutex<SchedulerState>,
    pub(crate) transport: T,
    runtime: Handle,
}

impl<T: Transport> Gate<T> {
    /// Create a gate that runs executions and wake timers on the current
    /// Tokio runtime.
    ///
    /// # Panics
    /// When called outside a Tokio runtime.
    pub fn new(transport: T, config: SchedulerConfig) -> Self {
        Self::with_runtime(Handle::current(), transport, config)
    }

    /// Create a gate bound to an explicit runtime.
    ///
    /// Once that runtime shuts down, admitted requests are discarded
    /// unexecuted: their slots are released and callers see
    /// [`GateError::Dropped`].
    pub fn with_runtime(runtime: Handle, transport: T, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState::new(config)),
                transport,
                runtime,
            }),
        }
    }

    /// Submit a request.
    ///
    /// An identical request (same method, URL and body) that has not settled
    /// yet is joined instead of executed again. The returned future resolves
    /// to the response, including 429/503 responses, or to the transport
    /// error. Dropping it does not cancel the request.
    pub fn enqueue(&self, url: &str, options: RequestOptions) -> Result<ResponseFuture, GateError> {
        let request = OutboundRequest::parse(url, options)?;
        let host = request.host.clone();

        let submission = self.inner.lock().submit(request, Instant::now());
        match submission {
            Submission::Joined(future) => {
                tracing::debug!(host = %host, url = %url, "Joined in-flight request");
                metrics::record_enqueued(true);
                Ok(future)
            }
            Submission::Queued(future) => {
                tracing::debug!(host = %host, url = %url, "Request queued");
                metrics::record_enqueued(false);
                self.inner.pump();
                Ok(future)
            }
        }
    }

    /// Merge a partial configuration. Applies to the very next admission
    /// decision, which is made right away.
    pub fn update_config(&self, patch: SchedulerConfigPatch) {
        {
            let mut state = self.inner.lock();
            state.update_config(&patch);
            let config = state.config();
            tracing::info!(
                global_max_concurrent = config.global_max_concurrent,
                per_host_max_concurrent = config.per_host_max_concurrent,
                per_host_rate_limit_per_min = config.per_host_rate_limit_per_min,
                reset_clears_active_cooldown = config.reset_clears_active_cooldown,
                "Scheduler configuration updated"
            );
        }
        self.inner.pump();
    }

    /// Copy of the live configuration.
    pub fn config(&self) -> SchedulerConfig {
        self.inner.lock().config().clone()
    }

    pub fn stats(&self) -> GateStats {
        self.inner.lock().stats(Instant::now())
    }

    pub fn host_snapshot(&self, host: &str) -> Option<HostSnapshot> {
        self.inner.lock().host_snapshot(host, Instant::now())
    }
}

impl<T: Transport> Inner<T> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit whatever can start, then arm a wake-up if the rest is blocked
    /// on time.
    pub(crate) fn pump(self: &Arc<Self>) {
        let now = Instant::now();
        let (admitted, wake) = {
            let mut state = self.lock();
            let admitted = state.admit_ready(now);
            let wake = state.arm_wake(now);
            metrics::record_load(state.queued(), state.global_active());
            if !admitted.is_empty() || wake.is_some() {
                tracing::trace!(
                    admitted = admitted.len(),
                    queued = state.queued(),
                    active = state.global_active(),
                    "Admission pass"
                );
            }
            (admitted, wake)
        };

        for task in admitted {
            metrics::record_admitted(task.host(), now - task.enqueued_at);
            tracing::debug!(host = %task.host(), fingerprint = %task.fingerprint, "Request admitted");
            let slot = executor::Slot::new(Arc::clone(self), &task);
            self.runtime.spawn(executor::execute(slot, task, now));
        }

        if let Some(deadline) = wake {
            tracing::trace!(delay = ?(deadline - now), "Wake timer armed");
            let inner = Arc::clone(self);
            self.runtime.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                inner.lock().wake_fired(deadline);
                inner.pump();
            });
        }
    }
}
