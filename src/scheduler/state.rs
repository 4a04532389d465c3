//! Scheduler state machine.
//!
//! Every mutation of counters, host map, queue and in-flight registry goes
//! through this type while the gate's lock is held, so each step between
//! two suspension points is atomic with respect to every other step.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{SchedulerConfig, SchedulerConfigPatch};
use crate::resilience::backoff::OverloadSignal;
use crate::scheduler::admission::{self, Verdict};
use crate::scheduler::dedup::{response_channel, Fingerprint, InFlightRegistry, ResponseFuture};
use crate::scheduler::host::{HostSnapshot, HostState};
use crate::scheduler::queue::{PendingQueue, Task};
use crate::transport::OutboundRequest;

/// Upper bound on how long a blocked queue waits before it is re-scanned.
pub const MAX_WAKE_DELAY: Duration = Duration::from_secs(5);

/// Result of submitting a request.
#[derive(Debug)]
pub enum Submission {
    /// An identical request is already in flight; subscribe to it.
    Joined(ResponseFuture),
    /// A new task was queued.
    Queued(ResponseFuture),
}

/// Gate-wide counters and per-host state.
#[derive(Debug)]
pub struct SchedulerState {
    config: SchedulerConfig,
    global_active: usize,
    hosts: HashMap<String, HostState>,
    queue: PendingQueue,
    in_flight: InFlightRegistry,
    wake_at: Option<Instant>,
    next_task_id: u64,
}

impl SchedulerState {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            global_active: 0,
            hosts: HashMap::new(),
            queue: PendingQueue::default(),
            in_flight: InFlightRegistry::default(),
            wake_at: None,
            next_task_id: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn update_config(&mut self, patch: &SchedulerConfigPatch) {
        self.config.apply(patch);
    }

    pub fn global_active(&self) -> usize {
        self.global_active
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Join an identical in-flight request or queue a new task.
    pub fn submit(&mut self, request: OutboundRequest, now: Instant) -> Submission {
        let fingerprint = Fingerprint::of(&request);
        if let Some(existing) = self.in_flight.get(&fingerprint) {
            return Submission::Joined(existing);
        }

        let id = self.next_task_id;
        self.next_task_id += 1;

        let (responder, future) = response_channel();
        self.in_flight.insert(fingerprint.clone(), id, future.clone());
        self.hosts.entry(request.host.clone()).or_default();
        self.queue.push(Task {
            id,
            fingerprint,
            request,
            enqueued_at: now,
            responder,
        });

        Submission::Queued(future)
    }

    /// Admit every task that may start now.
    ///
    /// Scans the queue front to back and takes the first admissible task,
    /// then restarts from the front, since each admission changes the
    /// counters the next decision reads. Returned tasks already hold their
    /// global and per-host slots.
    pub fn admit_ready(&mut self, now: Instant) -> Vec<Task> {
        let mut admitted = Vec::new();

        loop {
            let config = &self.config;
            let hosts = &self.hosts;
            let global_active = self.global_active;
            let next = self.queue.take_first(|task| match hosts.get(task.host()) {
                Some(host) => admission::can_start(config, global_active, host, now),
                None => admission::can_start(config, global_active, &HostState::default(), now),
            });

            let Some(task) = next else { break };
            self.global_active += 1;
            self.hosts.entry(task.request.host.clone()).or_default().active += 1;
            admitted.push(task);
        }

        admitted
    }

    /// Arm a wake-up for a queue that is blocked on time.
    ///
    /// Returns the deadline when a new timer must be started. Hosts blocked
    /// only by concurrency need no timer: a settlement re-scans the queue.
    pub fn arm_wake(&mut self, now: Instant) -> Option<Instant> {
        let earliest = self
            .queue
            .iter()
            .filter_map(|task| {
                let host = self.hosts.get(task.host())?;
                admission::check(&self.config, self.global_active, host, now).wake_at()
            })
            .min()?;

        let deadline = earliest.min(now + MAX_WAKE_DELAY).max(now);
        match self.wake_at {
            Some(armed) if armed > now && armed <= deadline => None,
            _ => {
                self.wake_at = Some(deadline);
                Some(deadline)
            }
        }
    }

    /// A wake timer fired; forget it if it is the one still armed.
    pub fn wake_fired(&mut self, deadline: Instant) {
        if self.wake_at == Some(deadline) {
            self.wake_at = None;
        }
    }

    /// Release a settled task's slots and update its host.
    ///
    /// `signal` is the overload evidence of the attempt, if any. Returns the
    /// cooldown applied by that signal.
    pub fn settle(
        &mut self,
        task_id: u64,
        fingerprint: &Fingerprint,
        host: &str,
        signal: Option<OverloadSignal>,
        now: Instant,
    ) -> Option<Duration> {
        self.release(task_id, fingerprint, host);

        let state = self.hosts.entry(host.to_string()).or_default();
        let applied = match signal {
            Some(signal) => Some(state.backoff.apply(now, signal, &self.config.backoff)),
            None => {
                state.backoff.reset(self.config.reset_clears_active_cooldown);
                None
            }
        };
        state.completed += 1;
        state.window.record(now);

        applied
    }

    /// Give back an admitted task's slots and in-flight entry without
    /// recording an outcome.
    pub fn release(&mut self, task_id: u64, fingerprint: &Fingerprint, host: &str) {
        self.in_flight.remove(fingerprint, task_id);
        self.global_active = self.global_active.saturating_sub(1);
        if let Some(state) = self.hosts.get_mut(host) {
            state.active = state.active.saturating_sub(1);
        }
    }

    /// Why the first queued task of `host` is still waiting, if it is.
    pub fn verdict_for(&self, host: &str, now: Instant) -> Verdict {
        match self.hosts.get(host) {
            Some(state) => admission::check(&self.config, self.global_active, state, now),
            None => admission::check(&self.config, self.global_active, &HostState::default(), now),
        }
    }

    pub fn host_snapshot(&self, host: &str, now: Instant) -> Option<HostSnapshot> {
        self.hosts.get(host).map(|state| state.snapshot(host, now))
    }

    pub fn stats(&self, now: Instant) -> GateStats {
        let mut hosts: Vec<_> = self
            .hosts
            .iter()
            .map(|(name, state)| state.snapshot(name, now))
            .collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));

        GateStats {
            queued: self.queue.len(),
            global_active: self.global_active,
            in_flight: self.in_flight.len(),
            hosts,
        }
    }
}

/// Point-in-time view of the whole gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub queued: usize,
    pub global_active: usize,
    /// Distinct fingerprints queued or executing.
    pub in_flight: usize,
    pub hosts: Vec<HostSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestOptions;

    fn config(global: usize, host: usize, rate: usize) -> SchedulerConfig {
        SchedulerConfig {
            global_max_concurrent: global,
            per_host_max_concurrent: host,
            per_host_rate_limit_per_min: rate,
            ..Default::default()
        }
    }

    fn submit(state: &mut SchedulerState, url: &str, now: Instant) -> Submission {
        let request = OutboundRequest::parse(url, RequestOptions::get()).unwrap();
        state.submit(request, now)
    }

    #[test]
    fn test_duplicate_submission_joins() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(4, 4, 60));

        assert!(matches!(submit(&mut state, "https://x/y", now), Submission::Queued(_)));
        assert!(matches!(submit(&mut state, "https://x/y", now), Submission::Joined(_)));
        assert_eq!(state.queued(), 1);
    }

    #[test]
    fn test_admission_respects_limits() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(3, 2, 60));
        for i in 0..3 {
            submit(&mut state, &format!("https://a/{i}"), now);
        }
        submit(&mut state, "https://b/0", now);

        let admitted: Vec<_> = state.admit_ready(now).into_iter().map(|t| t.request.url.to_string()).collect();
        assert_eq!(admitted, vec!["https://a/0", "https://a/1", "https://b/0"]);
        assert_eq!(state.global_active(), 3);
        assert_eq!(state.queued(), 1);
        assert_eq!(state.verdict_for("a", now), Verdict::GlobalSaturated);
    }

    #[test]
    fn test_settle_frees_slots_and_records() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(1, 1, 60));
        submit(&mut state, "https://a/0", now);
        submit(&mut state, "https://a/1", now);

        let task = state.admit_ready(now).pop().unwrap();
        assert!(state.admit_ready(now).is_empty());
        assert_eq!(state.arm_wake(now), None);

        let applied = state.settle(task.id, &task.fingerprint, "a", None, now);
        assert_eq!(applied, None);
        assert_eq!(state.global_active(), 0);

        let snapshot = state.host_snapshot("a", now).unwrap();
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.window_len, 1);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(state.admit_ready(now).len(), 1);
    }

    #[test]
    fn test_settle_removes_in_flight_entry() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(1, 1, 60));
        submit(&mut state, "https://a/0", now);
        let task = state.admit_ready(now).pop().unwrap();
        assert_eq!(state.stats(now).in_flight, 1);

        state.settle(task.id, &task.fingerprint, "a", None, now);
        assert_eq!(state.stats(now).in_flight, 0);
        assert!(matches!(submit(&mut state, "https://a/0", now), Submission::Queued(_)));
    }

    #[test]
    fn test_cooldown_arms_wake_capped() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(4, 4, 60));
        submit(&mut state, "https://a/0", now);
        let task = state.admit_ready(now).pop().unwrap();
        let applied = state.settle(task.id, &task.fingerprint, "a", Some(OverloadSignal::Heavy), now);
        assert_eq!(applied, Some(Duration::from_secs(30)));

        submit(&mut state, "https://a/1", now);
        assert!(state.admit_ready(now).is_empty());
        assert_eq!(state.arm_wake(now), Some(now + MAX_WAKE_DELAY));
        // Already armed for the same deadline.
        assert_eq!(state.arm_wake(now), None);

        state.wake_fired(now + MAX_WAKE_DELAY);
        let later = now + MAX_WAKE_DELAY;
        assert_eq!(state.arm_wake(later), Some(later + MAX_WAKE_DELAY));
    }

    #[test]
    fn test_rate_window_wake_is_exact_when_close() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(4, 4, 1));
        submit(&mut state, "https://a/0", now);
        let task = state.admit_ready(now).pop().unwrap();

        let settled_at = now + Duration::from_secs(58);
        state.settle(task.id, &task.fingerprint, "a", None, settled_at);
        submit(&mut state, "https://a/1", settled_at);

        let check = now + Duration::from_secs(117);
        assert!(state.admit_ready(check).is_empty());
        assert_eq!(state.arm_wake(check), Some(settled_at + Duration::from_secs(60)));
    }

    #[test]
    fn test_release_frees_slots_without_recording() {
        let now = Instant::now();
        let mut state = SchedulerState::new(config(1, 1, 60));
        submit(&mut state, "https://a/0", now);
        let task = state.admit_ready(now).pop().unwrap();

        state.release(task.id, &task.fingerprint, "a");
        assert_eq!(state.global_active(), 0);
        assert_eq!(state.stats(now).in_flight, 0);

        let snapshot = state.host_snapshot("a", now).unwrap();
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.window_len, 0);
        assert_eq!(snapshot.completed, 0);
    }

    #[test]
    fn test_empty_queue_needs_no_wake() {
        let now = Instant::now();
        let mut state = SchedulerState::new(SchedulerConfig::default());
        assert_eq!(state.arm_wake(now), None);
    }
}
