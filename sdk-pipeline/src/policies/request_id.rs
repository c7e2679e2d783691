//! Client request id policy.

use crate::context::Context;
use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use http::{HeaderName, HeaderValue};
use uuid::Uuid;

/// Default header carrying the client request id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Tags every request with a client request id.
///
/// An id bound with `Context::with_client_request_id` always wins. Otherwise
/// an id already on the request is kept, and a fresh UUID v4 is generated
/// only when there is none. Placed before a retry policy, every attempt of a
/// call carries the same id.
#[derive(Debug, Clone)]
pub struct RequestIdPolicy {
    header: HeaderName,
}

impl RequestIdPolicy {
    /// Creates a policy using `x-ms-client-request-id`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: HeaderName::from_static(CLIENT_REQUEST_ID_HEADER),
        }
    }

    /// Creates a policy using a custom header name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if `name` is not a valid header name.
    pub fn with_header_name(name: &str) -> Result<Self> {
        let header = HeaderName::try_from(name)
            .map_err(|e| PipelineError::InvalidHeader(format!("{name}: {e}")))?;
        Ok(Self { header })
    }

    fn tag(&self, request: &mut Request, context: &Context) -> Result<()> {
        let value = match context.client_request_id() {
            Some(id) => HeaderValue::try_from(id)
                .map_err(|e| PipelineError::InvalidHeader(format!("{}: {e}", self.header)))?,
            None if request.headers.contains_key(&self.header) => return Ok(()),
            None => HeaderValue::try_from(Uuid::new_v4().to_string())
                .map_err(|e| PipelineError::InvalidHeader(e.to_string()))?,
        };
        request.headers.insert(self.header.clone(), value);
        Ok(())
    }
}

impl Default for RequestIdPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for RequestIdPolicy {
    fn name(&self) -> &str {
        "RequestIdPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for RequestIdPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.tag(&mut request, next.context())?;
        next.run(request).await
    }
}

impl SyncPolicy for RequestIdPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.tag(&mut request, next.context())?;
        next.run(request)
    }
}
