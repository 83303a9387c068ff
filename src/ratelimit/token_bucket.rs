//! Token bucket rate limiting.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use super::clock::{Clock, MonotonicClock};
use crate::error::{RategateError, Result};

/// Validated configuration for a token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketConfig {
    capacity: u32,
    refill_per_second: f64,
}

impl TokenBucketConfig {
    /// Create a new token bucket configuration.
    ///
    /// A `capacity` of zero rejects everything and a `refill_per_second` of
    /// zero gives a one-shot budget of `capacity` requests. Negative, NaN and
    /// infinite rates are rejected.
    pub fn new(capacity: u32, refill_per_second: f64) -> Result<Self> {
        if !refill_per_second.is_finite() || refill_per_second < 0.0 {
            return Err(RategateError::InvalidConfig(format!(
                "refill rate must be a finite, non-negative number of tokens per second, got {}",
                refill_per_second
            )));
        }

        Ok(Self {
            capacity,
            refill_per_second,
        })
    }

    /// Get the bucket capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Get the refill rate in tokens per second.
    pub fn refill_per_second(&self) -> f64 {
        self.refill_per_second
    }
}

/// A per-key limiter holding a fractional token count that refills
/// continuously with elapsed time.
///
/// The bucket starts full, so up to `capacity` requests are admitted in a
/// burst before the refill rate takes over.
#[derive(Debug)]
pub struct TokenBucket {
    config: TokenBucketConfig,
    state: Mutex<TokenBucketState>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
struct TokenBucketState {
    /// Tokens available, always within `[0, capacity]`
    tokens: f64,
    /// Instant up to which accrual has been applied
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new bucket using the system monotonic clock.
    pub fn new(capacity: u32, refill_per_second: f64) -> Result<Self> {
        let config = TokenBucketConfig::new(capacity, refill_per_second)?;
        Ok(Self::with_clock(config, Arc::new(MonotonicClock)))
    }

    /// Create a new, full bucket reading time from `clock`.
    pub fn with_clock(config: TokenBucketConfig, clock: Arc<dyn Clock>) -> Self {
        let last_refill = clock.now();
        Self {
            config,
            state: Mutex::new(TokenBucketState {
                tokens: config.capacity as f64,
                last_refill,
            }),
            clock,
        }
    }

    /// Try to admit one request.
    ///
    /// Tokens earned since the last call are added first (capped at
    /// capacity). Returns `true` and debits one token if at least one whole
    /// token is available.
    pub fn admit(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.refill(&mut state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after accrual up to now.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.refill(&mut state, now);
        state.tokens
    }

    /// Get the capacity of this bucket.
    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    /// Get the refill rate in tokens per second.
    pub fn refill_per_second(&self) -> f64 {
        self.config.refill_per_second
    }

    /// Accrue tokens for the time elapsed since the last refill.
    ///
    /// `last_refill` always moves to `now`, so elapsed time is counted once.
    fn refill(&self, state: &mut TokenBucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let earned = elapsed.as_secs_f64() * self.config.refill_per_second;
        state.tokens = (state.tokens + earned).min(self.config.capacity as f64);
        state.last_refill = now;
    }
}
