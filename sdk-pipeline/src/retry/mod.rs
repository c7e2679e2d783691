//! Retry policy with configurable backoff and jitter strategies.
//!
//! Provides bounded retries of transient failures, re-entering the rest of
//! the chain on every attempt so that policies declared after the retry
//! policy run again for each attempt.

mod backoff;
mod classifier;
mod options;
mod policy;

pub use backoff::{BackoffStrategy, ExponentialBackoff, FixedDelay, JitterStrategy};
pub use classifier::{FnClassifier, Outcome, RetryClassifier, StatusCodeClassifier};
pub use options::{RetryMode, RetryOptions};
pub use policy::{retry_after, RetryPolicy, DEFAULT_MAX_RETRY_AFTER};
