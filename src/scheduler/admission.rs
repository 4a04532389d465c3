//! Admission decision.
//!
//! Four gates, all required, evaluated fresh against the live config:
//!
//! ```text
//! 1. global active      < global_max_concurrent
//! 2. host active        < per_host_max_concurrent
//! 3. rate window ready  ≤ now
//! 4. cooldown_until     ≤ now
//! ```

use tokio::time::Instant;

use crate::config::SchedulerConfig;
use crate::scheduler::host::HostState;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    GlobalSaturated,
    HostSaturated,
    /// The rate window is full. `None` until an executing request settles.
    RateLimited { until: Option<Instant> },
    CoolingDown { until: Instant },
}

impl Verdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Verdict::Admit)
    }

    /// Instant at which time alone could change this verdict.
    pub fn wake_at(&self) -> Option<Instant> {
        match self {
            Verdict::RateLimited { until } => *until,
            Verdict::CoolingDown { until } => Some(*until),
            _ => None,
        }
    }
}

/// Decide whether a task for `host` may start now. Never mutates.
pub fn check(config: &SchedulerConfig, global_active: usize, host: &HostState, now: Instant) -> Verdict {
    if global_active >= config.effective_global_limit() {
        return Verdict::GlobalSaturated;
    }
    if host.active >= config.effective_host_limit() {
        return Verdict::HostSaturated;
    }

    let limit = config.effective_rate_limit();
    match host.window.available_at(now, limit, host.active) {
        Some(at) if at <= now => {}
        until => {
            // Report the later of the two time gates so a wake is not wasted.
            let until = until.map(|at| match host.backoff.cooldown_until() {
                Some(c) if c > at => c,
                _ => at,
            });
            return Verdict::RateLimited { until };
        }
    }

    if host.backoff.is_cooling(now) {
        if let Some(until) = host.backoff.cooldown_until() {
            return Verdict::CoolingDown { until };
        }
    }

    Verdict::Admit
}

/// Boolean form of [`check`].
pub fn can_start(config: &SchedulerConfig, global_active: usize, host: &HostState, now: Instant) -> bool {
    check(config, global_active, host, now).is_admit()
}
