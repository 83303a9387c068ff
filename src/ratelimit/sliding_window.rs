//! Sliding window log rate limiting.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::{Clock, MonotonicClock};

/// Configuration for a sliding window log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindowConfig {
    /// Maximum admissions inside any trailing window
    pub limit: usize,
    /// Length of the trailing window
    pub window: Duration,
}

impl SlidingWindowConfig {
    /// Create a new sliding window configuration.
    ///
    /// A `limit` of zero rejects everything. A zero `window` is accepted and
    /// only counts admissions made at the very same instant.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// A per-key limiter that keeps the exact instant of every admission made
/// within the trailing window.
///
/// The window is half-open, `(now - window, now]`: an admission made exactly
/// `window` ago no longer counts.
#[derive(Debug)]
pub struct SlidingWindowLog {
    /// Maximum admissions inside the window
    limit: usize,
    /// Window length
    window: Duration,
    /// Admission instants, oldest first
    timestamps: Mutex<VecDeque<Instant>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLog {
    /// Create a new log using the system monotonic clock.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self::with_clock(SlidingWindowConfig::new(limit, window), Arc::new(MonotonicClock))
    }

    /// Create a new log reading time from `clock`.
    pub fn with_clock(config: SlidingWindowConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit: config.limit,
            window: config.window,
            timestamps: Mutex::new(VecDeque::with_capacity(config.limit.min(1024))),
            clock,
        }
    }

    /// Try to admit one request.
    ///
    /// Returns `true` and records the current instant if fewer than `limit`
    /// admissions remain in the window after expired ones are dropped.
    /// A rejection leaves the log untouched apart from that pruning.
    pub fn admit(&self) -> bool {
        let mut timestamps = self.timestamps.lock();
        let now = self.clock.now();
        self.prune(&mut timestamps, now);

        if timestamps.len() < self.limit {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Number of admissions currently inside the window.
    pub fn len(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        let now = self.clock.now();
        self.prune(&mut timestamps, now);
        timestamps.len()
    }

    /// Whether no admission is currently inside the window.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admissions still available in the current window.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.len())
    }

    /// Get the limit for this log.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get the window length for this log.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Drop the expired prefix of the log.
    ///
    /// Entries are chronological, so the first unexpired entry ends the scan.
    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = timestamps.front() {
            let age = now.saturating_duration_since(oldest);
            // With a zero window, same-instant admissions still count.
            if age >= self.window && !age.is_zero() {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
