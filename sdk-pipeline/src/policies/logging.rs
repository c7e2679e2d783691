//! Request/response logging with redaction.

use crate::errors::Result;
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

const REDACTED: &str = "REDACTED";

const DEFAULT_ALLOWED_HEADERS: [&str; 23] = [
    "x-ms-request-id",
    "x-ms-date",
    "x-ms-client-request-id",
    "x-ms-return-client-request-id",
    "traceparent",
    "accept",
    "cache-control",
    "connection",
    "content-length",
    "content-type",
    "date",
    "etag",
    "expires",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-unmodified-since",
    "last-modified",
    "pragma",
    "request-id",
    "retry-after",
    "server",
    "user-agent",
];

/// Verbosity of the HTTP log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// `tracing::Level::TRACE`
    Trace,
    /// `tracing::Level::DEBUG`
    #[default]
    Debug,
    /// `tracing::Level::INFO`
    Info,
}

/// Configuration for `HttpLoggingPolicy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Whether the policy is installed by `PipelineBuilder::with_options`.
    pub enabled: bool,
    /// Level of the log lines.
    pub level: LogLevel,
    /// Header names whose values are logged verbatim, besides the defaults.
    pub allowed_header_names: Vec<String>,
    /// Query parameter names whose values are logged verbatim.
    pub allowed_query_params: Vec<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Debug,
            allowed_header_names: Vec::new(),
            allowed_query_params: Vec::new(),
        }
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($arg)+),
            LogLevel::Debug => tracing::debug!($($arg)+),
            LogLevel::Info => tracing::info!($($arg)+),
        }
    };
}

/// Logs each request and its outcome.
///
/// Header values are written only for allow-listed names; every other value,
/// and `authorization` regardless of the allow-list, is written as
/// `REDACTED`. Query parameter values are redacted the same way.
#[derive(Debug, Clone)]
pub struct HttpLoggingPolicy {
    level: LogLevel,
    allowed_headers: HashSet<String>,
    allowed_query: HashSet<String>,
}

impl HttpLoggingPolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new(options: &LoggingOptions) -> Self {
        let allowed_headers = DEFAULT_ALLOWED_HEADERS
            .iter()
            .map(|h| (*h).to_string())
            .chain(options.allowed_header_names.iter().map(|h| h.to_ascii_lowercase()))
            .filter(|h| h != "authorization")
            .collect();
        Self {
            level: options.level,
            allowed_headers,
            allowed_query: options.allowed_query_params.iter().cloned().collect(),
        }
    }

    /// Renders headers with non-allow-listed values redacted.
    #[must_use]
    pub fn redact_headers(&self, headers: &HeaderMap) -> String {
        headers
            .iter()
            .map(|(name, value)| {
                let shown = if self.allowed_headers.contains(name.as_str()) {
                    value.to_str().unwrap_or(REDACTED)
                } else {
                    REDACTED
                };
                format!("{name}: {shown}")
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Renders a URI with non-allow-listed query values redacted.
    #[must_use]
    pub fn redact_uri(&self, uri: &Uri) -> String {
        let mut out = match (uri.scheme_str(), uri.authority()) {
            (Some(scheme), Some(authority)) => format!("{scheme}://{}{}", authority.host(), port_suffix(uri)),
            _ => String::new(),
        };
        out.push_str(uri.path());
        if let Some(query) = uri.query() {
            let redacted: Vec<String> = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((name, value)) if self.allowed_query.contains(name) => format!("{name}={value}"),
                    Some((name, _)) => format!("{name}={REDACTED}"),
                    None if self.allowed_query.contains(pair) => pair.to_string(),
                    None => REDACTED.to_string(),
                })
                .collect();
            out.push('?');
            out.push_str(&redacted.join("&"));
        }
        out
    }

    fn log_request(&self, request: &Request) {
        log_at!(
            self.level,
            method = %request.method,
            uri = %self.redact_uri(&request.uri),
            headers = %self.redact_headers(&request.headers),
            "sending request"
        );
    }

    fn log_outcome(&self, outcome: &Result<Response>, started: Instant) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(response) => log_at!(
                self.level,
                status = %response.status,
                elapsed_ms,
                headers = %self.redact_headers(&response.headers),
                "received response"
            ),
            Err(error) => log_at!(self.level, elapsed_ms, error = %error, "request failed"),
        }
    }
}

fn port_suffix(uri: &Uri) -> String {
    uri.port_u16().map(|p| format!(":{p}")).unwrap_or_default()
}

impl Default for HttpLoggingPolicy {
    fn default() -> Self {
        Self::new(&LoggingOptions::default())
    }
}

impl Policy for HttpLoggingPolicy {
    fn name(&self) -> &str {
        "HttpLoggingPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for HttpLoggingPolicy {
    async fn process(&self, request: Request, next: Next) -> Result<Response> {
        self.log_request(&request);
        let started = Instant::now();
        let outcome = next.run(request).await;
        self.log_outcome(&outcome, started);
        outcome
    }
}

impl SyncPolicy for HttpLoggingPolicy {
    fn process_sync(&self, request: Request, next: NextSync) -> Result<Response> {
        self.log_request(&request);
        let started = Instant::now();
        let outcome = next.run(request);
        self.log_outcome(&outcome, started);
        outcome
    }
}
