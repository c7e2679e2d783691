//! End-to-end behaviour of the policy chain in both execution modes.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, StatusCode};
use pretty_assertions::assert_eq;
use sdk_pipeline::context::Context;
use sdk_pipeline::errors::{PipelineError, Result, TransportErrorKind};
use sdk_pipeline::http::{Request, Response};
use sdk_pipeline::pipeline::{Next, NextSync, Pipeline, Step};
use sdk_pipeline::config::PipelineOptions;
use sdk_pipeline::policies::{AddHeadersFromContextPolicy, DATE_HEADER};
use sdk_pipeline::policy::{AsyncPolicy, PipelinePolicy, Policy, SyncPolicy};
use sdk_pipeline::retry::{FixedDelay, RetryMode, RetryOptions, RetryPolicy};
use sdk_pipeline::testing::{
    assert_header, assert_trail, CountingPolicy, MockOutcome, MockTransport, RecordingPolicy,
};
use sdk_pipeline::transport::HttpClient;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn get() -> Request {
    Request::get("https://account.example.net/items").unwrap()
}

#[tokio::test]
async fn test_chain_order_async() {
    let log = RecordingPolicy::shared_log();
    let transport = Arc::new(MockTransport::ok());
    let pipeline = Pipeline::builder()
        .policy(RecordingPolicy::new("p1", log.clone()))
        .policy(RecordingPolicy::new("p2", log.clone()))
        .policy(RecordingPolicy::new("p3", log.clone()))
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    pipeline.send(get(), Context::new()).await.unwrap();

    assert_trail(&transport.last_request().unwrap(), &["p1", "p2", "p3"]);
    assert_eq!(
        log.lock().clone(),
        vec![
            "p1:request",
            "p2:request",
            "p3:request",
            "p3:response",
            "p2:response",
            "p1:response"
        ]
    );
}

#[test]
fn test_chain_order_sync_with_bridged_policies() {
    let log = RecordingPolicy::shared_log();
    let transport = Arc::new(MockTransport::ok());
    let pipeline = Pipeline::builder()
        .policy(RecordingPolicy::new("p1", log.clone()))
        .async_policy(RecordingPolicy::new("p2", log.clone()))
        .sync_policy(RecordingPolicy::new("p3", log.clone()))
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    pipeline.send_sync(get(), Context::new()).unwrap();

    assert_trail(&transport.last_request().unwrap(), &["p1", "p2", "p3"]);
    assert_eq!(
        log.lock().clone(),
        vec![
            "p1:request",
            "p2:request",
            "p3:request",
            "p3:response",
            "p2:response",
            "p1:response"
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_chain_order_async_with_bridged_policies() {
    let log = RecordingPolicy::shared_log();
    let transport = Arc::new(MockTransport::ok());
    let pipeline = Pipeline::builder()
        .sync_policy(RecordingPolicy::new("p1", log.clone()))
        .async_policy(RecordingPolicy::new("p2", log.clone()))
        .policy(RecordingPolicy::new("p3", log.clone()))
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    pipeline.send(get(), Context::new()).await.unwrap();

    assert_trail(&transport.last_request().unwrap(), &["p1", "p2", "p3"]);
    assert_eq!(log.lock().first().map(String::as_str), Some("p1:request"));
    assert_eq!(log.lock().last().map(String::as_str), Some("p1:response"));
}

#[test]
fn test_execution_modes_are_mutually_exclusive() {
    let first = Arc::new(CountingPolicy::new("first"));
    let second = Arc::new(CountingPolicy::new("second"));
    let transport = Arc::new(MockTransport::ok());
    let pipeline = Pipeline::builder()
        .add(PipelinePolicy::both(first.clone()))
        .add(PipelinePolicy::both(second.clone()))
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(pipeline.send(get(), Context::new())).unwrap();

    for policy in [&first, &second] {
        assert_eq!((policy.async_calls(), policy.sync_calls()), (1, 0));
    }
    assert_eq!((transport.async_calls(), transport.sync_calls()), (1, 0));

    first.reset();
    second.reset();
    pipeline.send_sync(get(), Context::new()).unwrap();

    for policy in [&first, &second] {
        assert_eq!((policy.async_calls(), policy.sync_calls()), (0, 1));
    }
    assert_eq!((transport.async_calls(), transport.sync_calls()), (1, 1));
}

/// The standard policy set with retries that do not wait at all.
fn stamped_pipeline(transport: Arc<MockTransport>) -> Pipeline {
    let retry = RetryOptions::new()
        .with_max_attempts(10)
        .with_mode(RetryMode::Fixed)
        .with_base_delay_ms(0)
        .with_max_delay_ms(0);
    Pipeline::builder()
        .with_options(&PipelineOptions::new().with_retry(retry))
        .unwrap()
        .transport_arc(transport)
        .build()
        .unwrap()
}

fn stamps(transport: &MockTransport) -> Vec<String> {
    transport
        .requests()
        .iter()
        .map(|r| r.header(DATE_HEADER).unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_retry_restamps_every_attempt_async() {
    let transport = Arc::new(
        MockTransport::ok().with_failures(3, MockOutcome::Status(StatusCode::SERVICE_UNAVAILABLE)),
    );
    let response = stamped_pipeline(transport.clone())
        .send(get(), Context::new())
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    let stamps = stamps(&transport);
    assert_eq!(stamps.len(), 4);
    for pair in stamps.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn test_retry_restamps_every_attempt_sync() {
    let transport = Arc::new(MockTransport::ok().with_failures(
        2,
        MockOutcome::Error(TransportErrorKind::Connect, "refused".into()),
    ));
    stamped_pipeline(transport.clone())
        .send_sync(get(), Context::new())
        .unwrap();

    let stamps = stamps(&transport);
    assert_eq!(stamps.len(), 3);
    assert_ne!(stamps[0], stamps[1]);
    assert_ne!(stamps[1], stamps[2]);
}

#[tokio::test]
async fn test_retry_exhaustion_surfaces_last_failure() {
    let transport = Arc::new(
        MockTransport::always(MockOutcome::Error(TransportErrorKind::Io, "final".into()))
            .then(MockOutcome::Error(TransportErrorKind::Connect, "first".into()))
            .then(MockOutcome::Error(TransportErrorKind::Timeout, "second".into())),
    );
    let pipeline = Pipeline::builder()
        .policy(RetryPolicy::new(3, FixedDelay::new(Duration::from_millis(1))))
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    let err = pipeline.send(get(), Context::new()).await.unwrap_err();
    assert_eq!(transport.request_count(), 3);
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Io));
    assert!(err.to_string().contains("final"));
}

#[test]
fn test_retry_exhaustion_returns_last_response_sync() {
    let failing = Response::new(StatusCode::BAD_GATEWAY).with_body("upstream down");
    let transport = Arc::new(MockTransport::always(MockOutcome::Response(failing)));
    let pipeline = Pipeline::builder()
        .policy(RetryPolicy::new(4, FixedDelay::new(Duration::from_millis(1))))
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    let response = pipeline.send_sync(get(), Context::new()).unwrap();
    assert_eq!(transport.request_count(), 4);
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.text(), "upstream down");
}

/// Advances its cursor twice, the way a policy with a double-delegation bug would.
#[derive(Debug)]
struct DoubleAdvancePolicy;

impl Policy for DoubleAdvancePolicy {}

#[async_trait]
impl AsyncPolicy for DoubleAdvancePolicy {
    async fn process(&self, _request: Request, next: Next) -> Result<Response> {
        let (reached, step) = next.state().advance()?;
        assert!(matches!(step, Step::Transport(_)));
        assert!(reached.is_exhausted());
        assert_eq!(reached.index(), Some(reached.policy_count()));
        reached.advance().map(|_| Response::ok())
    }
}

#[tokio::test]
async fn test_cursor_cannot_pass_transport() {
    let transport = Arc::new(MockTransport::ok());
    let pipeline = Pipeline::builder()
        .async_policy(DoubleAdvancePolicy)
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    let err = pipeline.send(get(), Context::new()).await.unwrap_err();
    assert!(err.to_string().starts_with("no more policies to execute"));
    match err {
        PipelineError::NoMorePolicies { index, policy_count } => {
            assert_eq!(policy_count, 1);
            assert_eq!(index, policy_count + 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_context_headers_take_precedence_every_time() {
    let transport = Arc::new(MockTransport::ok());
    let pipeline = Pipeline::builder()
        .policy(AddHeadersFromContextPolicy::new())
        .transport_arc(transport.clone())
        .build()
        .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert("x-ms-version", HeaderValue::from_static("2024-08-04"));
    let ctx = Context::new().with_headers(headers);

    for run in 0..20 {
        let request = get().with_header("x-ms-version", "2019-02-02").unwrap();
        if run % 2 == 0 {
            pipeline.send(request, ctx.clone()).await.unwrap();
        } else {
            let pipeline = pipeline.clone();
            let ctx = ctx.clone();
            tokio::task::spawn_blocking(move || pipeline.send_sync(request, ctx))
                .await
                .unwrap()
                .unwrap();
        }
        assert_header(&transport.last_request().unwrap(), "x-ms-version", "2024-08-04");
    }
}

/// Slow on the asynchronous path, instant on the blocking path.
#[derive(Debug)]
struct SlowAsyncTransport {
    delay: Duration,
}

#[async_trait]
impl HttpClient for SlowAsyncTransport {
    async fn send(&self, _request: Request, _context: &Context) -> Result<Response> {
        tokio::time::sleep(self.delay).await;
        Ok(Response::ok())
    }

    fn send_sync(&self, _request: Request, _context: &Context) -> Result<Response> {
        Ok(Response::new(StatusCode::ACCEPTED))
    }

    fn has_native_sync(&self) -> bool {
        true
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_call_does_not_stall_sync_caller() {
    let pipeline = Pipeline::builder()
        .policy(CountingPolicy::new("outer"))
        .transport(SlowAsyncTransport {
            delay: Duration::from_millis(500),
        })
        .build()
        .unwrap();

    let in_flight = tokio::spawn(pipeline.send(get(), Context::new()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let sync_pipeline = pipeline.clone();
    let (response, elapsed) = std::thread::spawn(move || {
        let started = Instant::now();
        let response = sync_pipeline.send_sync(get(), Context::new());
        (response, started.elapsed())
    })
    .join()
    .unwrap();

    assert_eq!(response.unwrap().status, StatusCode::ACCEPTED);
    assert!(elapsed < Duration::from_millis(250), "sync call took {elapsed:?}");
    assert!(!in_flight.is_finished());
    assert_eq!(in_flight.await.unwrap().unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_async_call_yields_initiating_thread() {
    let pipeline = Pipeline::builder()
        .transport(SlowAsyncTransport {
            delay: Duration::from_millis(300),
        })
        .build()
        .unwrap();

    let in_flight = tokio::spawn(pipeline.send(get(), Context::new()));
    let started = Instant::now();
    let mut ticks = 0;
    while ticks < 5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        ticks += 1;
    }

    assert!(started.elapsed() < Duration::from_millis(250));
    assert!(!in_flight.is_finished());
    assert_eq!(in_flight.await.unwrap().unwrap().status, StatusCode::OK);
}
