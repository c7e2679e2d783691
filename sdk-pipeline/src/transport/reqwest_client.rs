//! Transport backed by `reqwest`.

use super::HttpClient;
use crate::context::Context;
use crate::errors::{PipelineError, Result, TransportErrorKind};
use crate::http::{Request, Response};
use async_trait::async_trait;

/// A transport that sends requests with a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_body() || error.is_request() {
        TransportErrorKind::Io
    } else if error.is_decode() || error.is_redirect() {
        TransportErrorKind::Protocol
    } else {
        TransportErrorKind::Other
    }
}

fn transport_error(error: reqwest::Error) -> PipelineError {
    let kind = classify(&error);
    PipelineError::transport_with_source(kind, "reqwest request failed", error)
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: Request, _context: &Context) -> Result<Response> {
        if request.uri.scheme().is_none() || request.uri.authority().is_none() {
            return Err(PipelineError::Configuration(format!(
                "transport requires an absolute uri, got '{}'",
                request.uri.path()
            )));
        }

        let body = request.body.collect().await.map_err(|e| {
            PipelineError::transport_with_source(TransportErrorKind::Io, "failed to read request body", e)
        })?;

        let response = self
            .client
            .request(request.method, request.uri.to_string())
            .headers(request.headers)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
