//! Per-host sliding window of completion times.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the rate-limit window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Completion timestamps of one host, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    completions: VecDeque<Instant>,
}

impl RateWindow {
    /// Record a settled request and drop expired entries.
    pub fn record(&mut self, now: Instant) {
        self.completions.push_back(now);
        self.prune(now);
    }

    /// Drop entries that have left the window.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.completions.front() {
            if oldest + RATE_WINDOW <= now {
                self.completions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of completions still inside the window at `now`.
    pub fn len_at(&self, now: Instant) -> usize {
        self.live(now).count()
    }

    /// Earliest instant at which one more request may start.
    ///
    /// `reserved` requests are executing and will land in the window when
    /// they settle, so they occupy slots already. Returns `None` when the
    /// window alone cannot free a slot and a settlement is needed first.
    pub fn available_at(&self, now: Instant, limit: usize, reserved: usize) -> Option<Instant> {
        let limit = limit.max(1);
        let count = self.len_at(now);
        let occupied = count + reserved;
        if occupied < limit {
            return Some(now);
        }

        let excess = occupied + 1 - limit;
        if excess > count {
            return None;
        }
        self.live(now).nth(excess - 1).map(|t| t + RATE_WINDOW)
    }

    fn live(&self, now: Instant) -> impl Iterator<Item = Instant> + '_ {
        self.completions
            .iter()
            .copied()
            .skip_while(move |t| *t + RATE_WINDOW <= now)
    }
}
