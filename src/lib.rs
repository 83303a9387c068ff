//! Rategate - Per-key admission control
//!
//! This crate decides, for a stream of concurrent requests tagged by a caller
//! key, whether each request is admitted under a configured rate ceiling.
//! Two interchangeable algorithms are provided: an exact sliding window log
//! and a continuously refilled token bucket. State is kept in-process, one
//! independently locked instance per key.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use error::{RategateError, Result};
pub use ratelimit::{
    AdmissionControl, Clock, KeyedLimiter, ManualClock, MonotonicClock, PerKeyLimiter,
    SlidingWindowConfig, SlidingWindowLimiter, SlidingWindowLog, TokenBucket, TokenBucketConfig,
    TokenBucketLimiter,
};
