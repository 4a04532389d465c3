//! Per-host scheduling state.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::resilience::backoff::BackoffState;
use crate::resilience::rate_window::RateWindow;

/// Everything the gate tracks about one host. Created on first reference,
/// kept for the life of the gate.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Requests to this host currently executing.
    pub active: usize,
    pub window: RateWindow,
    pub backoff: BackoffState,
    /// Settled requests, all outcomes.
    pub completed: u64,
}

impl HostState {
    pub fn snapshot(&self, host: &str, now: Instant) -> HostSnapshot {
        HostSnapshot {
            host: host.to_string(),
            active: self.active,
            window_len: self.window.len_at(now),
            cooldown_remaining: self.backoff.remaining(now),
            next_backoff: self.backoff.next_delay(),
            completed: self.completed,
        }
    }
}

/// Point-in-time view of a host, for introspection and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub host: String,
    pub active: usize,
    /// Completions inside the trailing rate window.
    pub window_len: usize,
    pub cooldown_remaining: Option<Duration>,
    pub next_backoff: Option<Duration>,
    pub completed: u64,
}
