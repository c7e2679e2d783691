//! Mock transports and policies for testing.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::Context;
use crate::errors::{PipelineError, Result, TransportErrorKind};
use crate::http::{Body, Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use crate::transport::HttpClient;

/// Header each `RecordingPolicy` appends its name to.
pub const TRAIL_HEADER: &str = "x-policy-trail";

/// What the mock transport answers with.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// A response with this status and no body.
    Status(StatusCode),
    /// A fully specified response.
    Response(Response),
    /// A transport failure.
    Error(TransportErrorKind, String),
}

impl MockOutcome {
    fn materialize(&self) -> Result<Response> {
        match self {
            Self::Status(status) => Ok(Response::new(*status)),
            Self::Response(response) => Ok(response.clone()),
            Self::Error(kind, message) => Err(PipelineError::transport(*kind, message.clone())),
        }
    }
}

/// A request as it reached the transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The request method.
    pub method: Method,
    /// The request URI.
    pub uri: Uri,
    /// The request headers.
    pub headers: HeaderMap,
    /// The buffered body, or `None` for a stream.
    pub body: Option<Bytes>,
    /// When the request arrived.
    pub received_at: Instant,
}

impl RecordedRequest {
    /// Returns a header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A transport that answers from a script and records every request.
///
/// Scripted outcomes are consumed in order; once the script is empty every
/// request gets the fallback outcome.
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
    async_calls: AtomicUsize,
    sync_calls: AtomicUsize,
}

impl MockTransport {
    /// Creates a transport that always answers with `outcome`.
    #[must_use]
    pub fn always(outcome: MockOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: outcome,
            delay: None,
            requests: Mutex::new(Vec::new()),
            async_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a transport that always answers `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self::always(MockOutcome::Status(StatusCode::OK))
    }

    /// Creates a transport that always answers with `status`.
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self::always(MockOutcome::Status(status))
    }

    /// Answers the first `count` requests with `outcome` before the fallback.
    #[must_use]
    pub fn with_failures(self, count: usize, outcome: MockOutcome) -> Self {
        self.script.lock().extend(std::iter::repeat(outcome).take(count));
        self
    }

    /// Queues one scripted outcome.
    #[must_use]
    pub fn then(self, outcome: MockOutcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of requests received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns every request received, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns how many times the asynchronous path ran.
    #[must_use]
    pub fn async_calls(&self) -> usize {
        self.async_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times the synchronous path ran.
    #[must_use]
    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, request: Request) -> Result<Response> {
        let body = match request.body {
            Body::Empty => Some(Bytes::new()),
            Body::Bytes(bytes) => Some(bytes),
            Body::Stream(_) => None,
        };
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            uri: request.uri,
            headers: request.headers,
            body,
            received_at: Instant::now(),
        });

        let scripted = self.script.lock().pop_front();
        scripted.as_ref().unwrap_or(&self.fallback).materialize()
    }
}

#[async_trait]
impl HttpClient for MockTransport {
    async fn send(&self, request: Request, _context: &Context) -> Result<Response> {
        self.async_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(request)
    }

    fn send_sync(&self, request: Request, _context: &Context) -> Result<Response> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.answer(request)
    }

    fn has_native_sync(&self) -> bool {
        true
    }
}

/// A pass-through policy that counts invocations per execution path.
#[derive(Debug)]
pub struct CountingPolicy {
    name: String,
    async_calls: AtomicUsize,
    sync_calls: AtomicUsize,
}

impl CountingPolicy {
    /// Creates a counting policy.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            async_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the asynchronous path ran.
    #[must_use]
    pub fn async_calls(&self) -> usize {
        self.async_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times the synchronous path ran.
    #[must_use]
    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Resets both counters.
    pub fn reset(&self) {
        self.async_calls.store(0, Ordering::SeqCst);
        self.sync_calls.store(0, Ordering::SeqCst);
    }
}

impl Policy for CountingPolicy {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl AsyncPolicy for CountingPolicy {
    async fn process(&self, request: Request, next: Next) -> Result<Response> {
        self.async_calls.fetch_add(1, Ordering::SeqCst);
        next.run(request).await
    }
}

impl SyncPolicy for CountingPolicy {
    fn process_sync(&self, request: Request, next: NextSync) -> Result<Response> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        next.run(request)
    }
}

/// A log shared between recording policies.
pub type SharedLog = Arc<Mutex<Vec<String>>>;

/// A policy that logs when it sees the request and the response.
///
/// On the way down it appends its name to the `x-policy-trail` header, so
/// the transport can see the order in which policies touched the request.
#[derive(Debug)]
pub struct RecordingPolicy {
    name: String,
    log: SharedLog,
}

impl RecordingPolicy {
    /// Creates a recording policy writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: SharedLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }

    /// Creates an empty shared log.
    #[must_use]
    pub fn shared_log() -> SharedLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn before(&self, request: &mut Request) -> Result<()> {
        self.log.lock().push(format!("{}:request", self.name));
        let trail = match request.header(TRAIL_HEADER) {
            Some(existing) => format!("{existing},{}", self.name),
            None => self.name.clone(),
        };
        let value = HeaderValue::try_from(trail)
            .map_err(|e| PipelineError::InvalidHeader(e.to_string()))?;
        request.headers.insert(TRAIL_HEADER, value);
        Ok(())
    }

    fn after(&self) {
        self.log.lock().push(format!("{}:response", self.name));
    }
}

impl Policy for RecordingPolicy {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl AsyncPolicy for RecordingPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.before(&mut request)?;
        let response = next.run(request).await;
        self.after();
        response
    }
}

impl SyncPolicy for RecordingPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.before(&mut request)?;
        let response = next.run(request);
        self.after();
        response
    }
}
