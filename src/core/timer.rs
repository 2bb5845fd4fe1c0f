use std::time::{Duration, Instant};

/// Tracks the last key press and derives the idle "dimmed" hint from it.
#[derive(Debug, Clone, Copy)]
pub struct IdleTimer {
    last_input: Instant,
    timeout: Duration,
}

impl IdleTimer {
    pub fn new(now: Instant, timeout: Duration) -> Self {
        Self {
            last_input: now,
            timeout,
        }
    }

    pub fn record_input(&mut self, now: Instant) {
        self.last_input = now;
    }

    pub fn last_input(&self) -> Instant {
        self.last_input
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_input)
    }

    /// True once more than `timeout` has passed without input. Callers gate this on
    /// the session being idle.
    pub fn expired(&self, now: Instant) -> bool {
        self.idle_for(now) > self.timeout
    }
}
