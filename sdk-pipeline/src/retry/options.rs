//! Serializable retry configuration.

use super::{BackoffStrategy, ExponentialBackoff, FixedDelay, JitterStrategy, StatusCodeClassifier};
use crate::errors::{PipelineError, Result};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// delay = base (constant)
    Fixed,
    /// delay = base * 2^retry
    #[default]
    Exponential,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Backoff mode.
    pub mode: RetryMode,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter strategy for exponential mode.
    pub jitter: JitterStrategy,
    /// Status codes that trigger a retry.
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            mode: RetryMode::Exponential,
            base_delay_ms: 800,
            max_delay_ms: 60_000,
            jitter: JitterStrategy::Full,
            retry_status_codes: StatusCodeClassifier::DEFAULT_CODES.to_vec(),
        }
    }
}

impl RetryOptions {
    /// Creates the default retry options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the backoff mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the retried status codes.
    #[must_use]
    pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    /// Checks the options for values no retry policy can honour.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` for zero attempts, a base delay
    /// above the cap, or an out-of-range status code.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(PipelineError::Configuration(format!(
                "retry base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        self.status_codes().map(|_| ())
    }

    /// Builds the backoff strategy these options describe.
    #[must_use]
    pub fn backoff(&self) -> Arc<dyn BackoffStrategy> {
        let base = Duration::from_millis(self.base_delay_ms);
        match self.mode {
            RetryMode::Fixed => Arc::new(FixedDelay::new(base.min(Duration::from_millis(self.max_delay_ms)))),
            RetryMode::Exponential => Arc::new(
                ExponentialBackoff::new(base, Duration::from_millis(self.max_delay_ms))
                    .with_jitter(self.jitter),
            ),
        }
    }

    /// Builds the status-code classifier these options describe.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` for an out-of-range status code.
    pub fn classifier(&self) -> Result<StatusCodeClassifier> {
        Ok(StatusCodeClassifier::new(self.status_codes()?))
    }

    fn status_codes(&self) -> Result<Vec<StatusCode>> {
        self.retry_status_codes
            .iter()
            .map(|code| {
                StatusCode::from_u16(*code).map_err(|_| {
                    PipelineError::Configuration(format!("invalid retry status code {code}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retry_options_default() {
        let options = RetryOptions::default();
        assert_eq!(options.max_attempts, 4);
        assert_eq!(options.base_delay_ms, 800);
        assert_eq!(options.max_delay_ms, 60_000);
        assert_eq!(options.mode, RetryMode::Exponential);
        assert_eq!(options.retry_status_codes, vec![408, 429, 500, 502, 503, 504]);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_retry_options_builder() {
        let options = RetryOptions::new()
            .with_max_attempts(2)
            .with_mode(RetryMode::Fixed)
            .with_base_delay_ms(10)
            .with_max_delay_ms(20)
            .with_jitter(JitterStrategy::None)
            .with_status_codes([503]);

        assert_eq!(options.max_attempts, 2);
        assert_eq!(options.backoff().delay(3), Duration::from_millis(10));
        assert_eq!(
            options.classifier().unwrap().codes(),
            &[StatusCode::SERVICE_UNAVAILABLE]
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RetryOptions::new().with_max_attempts(0).validate().is_err());
        assert!(RetryOptions::new()
            .with_base_delay_ms(10)
            .with_max_delay_ms(5)
            .validate()
            .is_err());
        assert!(RetryOptions::new().with_status_codes([42]).validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let options: RetryOptions =
            serde_json::from_str(r#"{"max_attempts": 6, "mode": "fixed", "jitter": "equal"}"#).unwrap();
        assert_eq!(options.max_attempts, 6);
        assert_eq!(options.mode, RetryMode::Fixed);
        assert_eq!(options.jitter, JitterStrategy::Equal);
        assert_eq!(options.base_delay_ms, 800);
    }
}
