//! Per-host cooldown after overload signals.
//!
//! A heavy signal (429/503) seeds the episode at the heavy base delay, a
//! light signal (transport failure) at the light base. Each further signal
//! doubles the delay up to the ceiling. The cooldown deadline only ever
//! moves later while an episode continues.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::BackoffConfig;

/// Kind of overload evidence observed for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadSignal {
    /// The server said so: 429 Too Many Requests or 503 Service Unavailable.
    Heavy,
    /// The request never produced a response.
    Light,
}

impl OverloadSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverloadSignal::Heavy => "heavy",
            OverloadSignal::Light => "light",
        }
    }
}

/// Backoff bookkeeping for one host.
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    cooldown_until: Option<Instant>,
    next_delay: Option<Duration>,
}

impl BackoffState {
    /// Arm (or extend) the cooldown. Returns the delay applied by this signal.
    pub fn apply(&mut self, now: Instant, signal: OverloadSignal, config: &BackoffConfig) -> Duration {
        let base = match signal {
            OverloadSignal::Heavy => config.heavy_base(),
            OverloadSignal::Light => config.light_base(),
        };
        let ceiling = config.max();
        let current = self.next_delay.unwrap_or(base).min(ceiling);

        let until = now.checked_add(current).unwrap_or(now + ceiling);
        self.cooldown_until = Some(match self.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        self.next_delay = Some(current.checked_mul(2).unwrap_or(ceiling).min(ceiling));

        current
    }

    /// Forget the episode after a clean response.
    ///
    /// A cooldown that is still running keeps blocking unless
    /// `clear_active_cooldown` is set.
    pub fn reset(&mut self, clear_active_cooldown: bool) {
        self.next_delay = None;
        if clear_active_cooldown {
            self.cooldown_until = None;
        }
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    /// Delay the next signal will apply, if an episode is running.
    pub fn next_delay(&self) -> Option<Duration> {
        self.next_delay
    }

    pub fn is_cooling(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}
