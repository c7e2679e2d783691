//! The retry policy.

use super::{BackoffStrategy, RetryClassifier, RetryOptions, StatusCodeClassifier};
use crate::context::CancellationToken;
use crate::errors::{PipelineError, Result, RetryCause};
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Longest server-requested delay honoured by `RetryPolicy::new`.
pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retries transient failures by re-entering the rest of the chain.
///
/// Every attempt runs through a fresh fork of the cursor, so policies that
/// sit after this one in the pipeline run again for each attempt. The request
/// is copied before the first attempt; a request whose body is a
/// single-consumption stream fails with `PipelineError::BodyNotReplayable` as
/// soon as a retry is needed.
///
/// When all attempts are used up the last response or error is returned
/// unchanged.
///
/// A `Retry-After` delay sent by the server replaces the backoff but is
/// capped at `max_retry_after`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Arc<dyn BackoffStrategy>,
    classifier: Arc<dyn RetryClassifier>,
    max_retry_after: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy using the default status-code classifier.
    ///
    /// `max_attempts` counts the first attempt; it is raised to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: impl BackoffStrategy + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
            classifier: Arc::new(StatusCodeClassifier::default()),
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }

    /// Creates a retry policy from options.
    ///
    /// Server-requested delays are capped at `max_delay_ms`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if the options are invalid.
    pub fn from_options(options: &RetryOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            max_attempts: options.max_attempts,
            backoff: options.backoff(),
            classifier: Arc::new(options.classifier()?),
            max_retry_after: Duration::from_millis(options.max_delay_ms),
        })
    }

    /// Replaces the retry predicate.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl RetryClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Caps the delay taken from `Retry-After` style response headers.
    #[must_use]
    pub fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before the next attempt, or `None` to stop.
    fn decide(&self, attempt: u32, outcome: &Result<Response>) -> Option<Duration> {
        if !self.classifier.is_retryable(outcome.as_ref()) {
            return None;
        }
        if attempt >= self.max_attempts {
            match outcome {
                Ok(response) => warn!(attempts = attempt, status = %response.status, "retries exhausted"),
                Err(error) => warn!(attempts = attempt, error = %error, "retries exhausted"),
            }
            return None;
        }

        let delay = outcome
            .as_ref()
            .ok()
            .and_then(retry_after)
            .map(|requested| requested.min(self.max_retry_after))
            .unwrap_or_else(|| self.backoff.delay(attempt - 1));
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(response) => debug!(attempt, delay_ms, status = %response.status, "retrying request"),
            Err(error) => debug!(attempt, delay_ms, error = %error, "retrying request"),
        }
        Some(delay)
    }
}

impl Policy for RetryPolicy {
    fn name(&self) -> &str {
        "RetryPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for RetryPolicy {
    async fn process(&self, request: Request, next: Next) -> Result<Response> {
        let token = next.context().cancellation().cloned();
        let mut state = RetryState::begin(&request);
        let mut current = request;

        loop {
            state.attempt += 1;
            let outcome = next.fork().run(current).await;
            let Some(delay) = self.decide(state.attempt, &outcome) else {
                return outcome;
            };
            current = state.replay(outcome)?;
            backoff(delay, token.as_ref()).await?;
        }
    }
}

impl SyncPolicy for RetryPolicy {
    fn process_sync(&self, request: Request, next: NextSync) -> Result<Response> {
        let token = next.context().cancellation().cloned();
        let mut state = RetryState::begin(&request);
        let mut current = request;

        loop {
            state.attempt += 1;
            let outcome = next.fork().run(current);
            let Some(delay) = self.decide(state.attempt, &outcome) else {
                return outcome;
            };
            current = state.replay(outcome)?;
            backoff_blocking(delay, token.as_ref())?;
        }
    }
}

/// Per-call progress of one retried request.
struct RetryState {
    attempt: u32,
    template: Option<Request>,
}

impl RetryState {
    fn begin(request: &Request) -> Self {
        Self {
            attempt: 0,
            template: request.try_clone(),
        }
    }

    /// Copies the original request for the next attempt.
    ///
    /// Fails with `BodyNotReplayable` when the body was a stream, keeping the
    /// outcome that asked for the retry as the cause.
    fn replay(&self, outcome: Result<Response>) -> Result<Request> {
        if let Some(request) = self.template.as_ref().and_then(Request::try_clone) {
            return Ok(request);
        }
        let cause = match outcome {
            Ok(response) => RetryCause::Response(Box::new(response)),
            Err(error) => RetryCause::Error(error),
        };
        Err(PipelineError::BodyNotReplayable {
            attempts: self.attempt,
            last: Box::new(cause),
        })
    }
}

fn cancelled(token: &CancellationToken) -> PipelineError {
    PipelineError::Cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

async fn backoff(delay: Duration, token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(cancelled(token)),
                () = tokio::time::sleep(delay) => Ok(()),
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

fn backoff_blocking(delay: Duration, token: Option<&CancellationToken>) -> Result<()> {
    let started = Instant::now();
    loop {
        if let Some(token) = token.filter(|t| t.is_cancelled()) {
            return Err(cancelled(token));
        }
        let elapsed = started.elapsed();
        if elapsed >= delay {
            return Ok(());
        }
        std::thread::sleep((delay - elapsed).min(CANCEL_POLL));
    }
}

/// Returns the server-requested delay carried by a response, if any.
///
/// Checks `retry-after-ms` and `x-ms-retry-after-ms` (milliseconds), then
/// `retry-after` (delta seconds or an HTTP date).
#[must_use]
pub fn retry_after(response: &Response) -> Option<Duration> {
    retry_after_at(response, Utc::now())
}

fn retry_after_at(response: &Response, now: DateTime<Utc>) -> Option<Duration> {
    for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(ms) = response.header(name).and_then(|v| v.trim().parse::<u64>().ok()) {
            return Some(Duration::from_millis(ms));
        }
    }

    let value = response.header("retry-after")?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
