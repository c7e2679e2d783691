//! Predicates deciding whether an attempt's outcome warrants a retry.

use crate::errors::PipelineError;
use crate::http::Response;
use http::StatusCode;
use std::fmt;

/// The outcome of one attempt, as seen by a classifier.
pub type Outcome<'a> = std::result::Result<&'a Response, &'a PipelineError>;

/// Decides whether an attempt should be retried.
pub trait RetryClassifier: Send + Sync + fmt::Debug {
    /// Returns true if the outcome is transient and worth another attempt.
    fn is_retryable(&self, outcome: Outcome<'_>) -> bool;
}

/// Retries a fixed set of status codes and transient transport errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeClassifier {
    codes: Vec<StatusCode>,
    retry_errors: bool,
}

impl StatusCodeClassifier {
    /// Status codes retried by default.
    pub const DEFAULT_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

    /// Creates a classifier for `codes` that also retries transient errors.
    #[must_use]
    pub fn new(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            retry_errors: true,
        }
    }

    /// Sets whether transient transport errors are retried.
    #[must_use]
    pub fn with_error_retries(mut self, enabled: bool) -> Self {
        self.retry_errors = enabled;
        self
    }

    /// Returns the retried status codes.
    #[must_use]
    pub fn codes(&self) -> &[StatusCode] {
        &self.codes
    }
}

impl Default for StatusCodeClassifier {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_CODES
                .iter()
                .filter_map(|code| StatusCode::from_u16(*code).ok()),
        )
    }
}

impl RetryClassifier for StatusCodeClassifier {
    fn is_retryable(&self, outcome: Outcome<'_>) -> bool {
        match outcome {
            Ok(response) => self.codes.contains(&response.status),
            Err(error) => self.retry_errors && error.is_transient(),
        }
    }
}

/// A classifier backed by a closure.
pub struct FnClassifier<F> {
    predicate: F,
}

impl<F> FnClassifier<F>
where
    F: Fn(Outcome<'_>) -> bool + Send + Sync,
{
    /// Wraps a predicate.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnClassifier").finish_non_exhaustive()
    }
}

impl<F> RetryClassifier for FnClassifier<F>
where
    F: Fn(Outcome<'_>) -> bool + Send + Sync,
{
    fn is_retryable(&self, outcome: Outcome<'_>) -> bool {
        (self.predicate)(outcome)
    }
}
