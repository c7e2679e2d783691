//! Date stamping policy.

use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use http::{HeaderName, HeaderValue};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Header `DatePolicy::new` writes to.
pub const DATE_HEADER: &str = "x-ms-date";

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// How the timestamp is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// `Sun, 06 Nov 1994 08:49:37 GMT`
    ///
    /// Whole seconds only: two stamps taken within the same second are equal.
    Rfc1123,
    /// `1994-11-06T08:49:37.000Z`
    #[default]
    Rfc3339,
}

impl DateFormat {
    /// Formats a timestamp.
    #[must_use]
    pub fn format(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Rfc1123 => at.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            Self::Rfc3339 => at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Stamps the current time into a request header.
///
/// The time is read when the request passes through the policy, so a policy
/// placed after a retry policy stamps every attempt afresh. With the default
/// RFC 3339 format the stamps written by one policy are strictly increasing:
/// a stamp that would repeat the previous millisecond is moved one
/// millisecond forward.
#[derive(Clone)]
pub struct DatePolicy {
    header: HeaderName,
    format: DateFormat,
    clock: Clock,
    last_millis: Arc<AtomicI64>,
}

impl DatePolicy {
    /// Creates a policy writing an RFC 3339 timestamp into `x-ms-date`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: HeaderName::from_static(DATE_HEADER),
            format: DateFormat::Rfc3339,
            clock: Arc::new(Utc::now),
            last_millis: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    /// Sets the header name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if `name` is not a valid header name.
    pub fn with_header_name(mut self, name: &str) -> Result<Self> {
        self.header = HeaderName::try_from(name)
            .map_err(|e| PipelineError::InvalidHeader(format!("{name}: {e}")))?;
        Ok(self)
    }

    /// Sets the timestamp format.
    #[must_use]
    pub fn with_format(mut self, format: DateFormat) -> Self {
        self.format = format;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        let now = (self.clock)();
        if self.format != DateFormat::Rfc3339 {
            return now;
        }
        let wall = now.timestamp_millis();
        let mut previous = self.last_millis.load(Ordering::Acquire);
        loop {
            let next = wall.max(previous.saturating_add(1));
            match self.last_millis.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return DateTime::from_timestamp_millis(next).unwrap_or(now),
                Err(actual) => previous = actual,
            }
        }
    }

    fn stamp(&self, request: &mut Request) -> Result<()> {
        let value = self.format.format(self.now());
        let value = HeaderValue::try_from(value).map_err(|e| PipelineError::InvalidHeader(e.to_string()))?;
        request.headers.insert(self.header.clone(), value);
        Ok(())
    }
}

impl Default for DatePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatePolicy")
            .field("header", &self.header)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Policy for DatePolicy {
    fn name(&self) -> &str {
        "DatePolicy"
    }
}

#[async_trait]
impl AsyncPolicy for DatePolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.stamp(&mut request)?;
        next.run(request).await
    }
}

impl SyncPolicy for DatePolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.stamp(&mut request)?;
        next.run(request)
    }
}
