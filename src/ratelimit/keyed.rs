//! Per-key limiter registry.

use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, MonotonicClock};
use super::sliding_window::{SlidingWindowConfig, SlidingWindowLog};
use super::token_bucket::{TokenBucket, TokenBucketConfig};
use crate::error::Result;

/// An algorithm whose state is scoped to a single caller key.
pub trait PerKeyLimiter: Send + Sync + 'static {
    /// Fixed configuration shared by every instance of one registry.
    type Config: Clone + Debug + Send + Sync;

    /// Short algorithm name used in logs.
    const ALGORITHM: &'static str;

    /// Build a fresh instance for a newly seen key.
    fn from_config(config: &Self::Config, clock: Arc<dyn Clock>) -> Self;

    /// Decide whether one more request is admitted.
    fn admit(&self) -> bool;
}

impl PerKeyLimiter for SlidingWindowLog {
    type Config = SlidingWindowConfig;
    const ALGORITHM: &'static str = "sliding_window";

    fn from_config(config: &Self::Config, clock: Arc<dyn Clock>) -> Self {
        SlidingWindowLog::with_clock(*config, clock)
    }

    fn admit(&self) -> bool {
        SlidingWindowLog::admit(self)
    }
}

impl PerKeyLimiter for TokenBucket {
    type Config = TokenBucketConfig;
    const ALGORITHM: &'static str = "token_bucket";

    fn from_config(config: &Self::Config, clock: Arc<dyn Clock>) -> Self {
        TokenBucket::with_clock(*config, clock)
    }

    fn admit(&self) -> bool {
        TokenBucket::admit(self)
    }
}

/// Object-safe admission interface.
///
/// This lets a driver pick an algorithm at runtime (for example from a
/// configuration file) and hand out a single `dyn AdmissionControl`.
pub trait AdmissionControl: Send + Sync {
    /// Decide whether a request from `key` is admitted.
    fn admit(&self, key: &str) -> bool;

    /// Name of the algorithm behind this limiter.
    fn algorithm(&self) -> &'static str;

    /// Number of distinct keys seen so far.
    fn key_count(&self) -> usize;
}

/// A rate limiter that keeps one independent limiter instance per key.
///
/// Instances are created lazily on first sight of a key and live as long as
/// the registry. The registry lock only covers lookup-or-insert; the
/// admission decision runs under the instance's own lock, so unrelated keys
/// never wait on each other.
pub struct KeyedLimiter<A: PerKeyLimiter> {
    /// Per-key instances indexed by caller key
    registry: DashMap<String, Arc<A>>,
    /// Configuration every new instance is built from
    config: A::Config,
    /// Time source shared by all instances
    clock: Arc<dyn Clock>,
}

/// Keyed sliding window log limiter.
pub type SlidingWindowLimiter = KeyedLimiter<SlidingWindowLog>;

/// Keyed token bucket limiter.
pub type TokenBucketLimiter = KeyedLimiter<TokenBucket>;

impl<A: PerKeyLimiter> KeyedLimiter<A> {
    /// Create a new keyed limiter using the system monotonic clock.
    pub fn new(config: A::Config) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    /// Create a new keyed limiter whose instances read time from `clock`.
    pub fn with_clock(config: A::Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: DashMap::new(),
            config,
            clock,
        }
    }

    /// Decide whether a request from `key` is admitted.
    ///
    /// Creates the key's instance if this is the first request for it.
    pub fn admit(&self, key: &str) -> bool {
        let instance = self.get_or_create(key);
        let admitted = instance.admit();

        trace!(
            key = %key,
            algorithm = A::ALGORITHM,
            admitted = admitted,
            "Admission decision"
        );

        if !admitted {
            debug!(key = %key, algorithm = A::ALGORITHM, "Rate limit exceeded");
        }

        admitted
    }

    /// Get the instance for `key` without creating one.
    pub fn get(&self, key: &str) -> Option<Arc<A>> {
        self.registry.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether an instance exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.registry.contains_key(key)
    }

    /// Get the number of keys with an instance.
    pub fn key_count(&self) -> usize {
        self.registry.len()
    }

    /// Get the configuration new instances are built from.
    pub fn config(&self) -> &A::Config {
        &self.config
    }

    /// Fetch the instance for `key`, inserting a fresh one on first sight.
    ///
    /// The entry API holds the shard lock across check-and-insert, so racing
    /// first requests for one key all end up with the same instance. The
    /// guard is dropped before this returns.
    fn get_or_create(&self, key: &str) -> Arc<A> {
        if let Some(existing) = self.get(key) {
            return existing;
        }

        let entry = self.registry.entry(key.to_owned()).or_insert_with(|| {
            debug!(
                key = %key,
                algorithm = A::ALGORITHM,
                config = ?self.config,
                "Creating new per-key limiter"
            );
            Arc::new(A::from_config(&self.config, Arc::clone(&self.clock)))
        });
        Arc::clone(entry.value())
    }
}

impl KeyedLimiter<SlidingWindowLog> {
    /// Create a keyed sliding window log limiter.
    pub fn sliding_window(limit: usize, window: Duration) -> Self {
        Self::new(SlidingWindowConfig::new(limit, window))
    }
}

impl KeyedLimiter<TokenBucket> {
    /// Create a keyed token bucket limiter.
    ///
    /// Fails if `refill_per_second` is negative or not finite.
    pub fn token_bucket(capacity: u32, refill_per_second: f64) -> Result<Self> {
        Ok(Self::new(TokenBucketConfig::new(capacity, refill_per_second)?))
    }
}

impl<A: PerKeyLimiter> AdmissionControl for KeyedLimiter<A> {
    fn admit(&self, key: &str) -> bool {
        KeyedLimiter::admit(self, key)
    }

    fn algorithm(&self) -> &'static str {
        A::ALGORITHM
    }

    fn key_count(&self) -> usize {
        KeyedLimiter::key_count(self)
    }
}
