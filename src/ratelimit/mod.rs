//! Rate limiting algorithms and per-key state management.

mod clock;
mod keyed;
mod sliding_window;
mod token_bucket;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use keyed::{
    AdmissionControl, KeyedLimiter, PerKeyLimiter, SlidingWindowLimiter, TokenBucketLimiter,
};
pub use sliding_window::{SlidingWindowConfig, SlidingWindowLog};
pub use token_bucket::{TokenBucket, TokenBucketConfig};
