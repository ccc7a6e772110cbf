use std::time::{Duration, Instant};

/// A re-arming timer polled from a single-threaded event loop
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    interval: Duration,
    next_due: Instant,
}

impl PeriodicTimer {
    /// Start a timer whose first expiry is one interval from `now`
    pub fn start(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// Start a timer that is due immediately
    pub fn start_immediate(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Consume an expiry if one is pending and re-arm from `now`
    ///
    /// Missed expiries are not queued up; a late poll fires once.
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }

    /// Time left until the next expiry
    pub fn until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }
}
