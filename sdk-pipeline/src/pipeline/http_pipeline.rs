//! The immutable policy chain and its entry points.

use super::{CallState, Next, NextSync, PipelineBuilder};
use crate::context::Context;
use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::policy::PipelinePolicy;
use crate::transport::HttpClient;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// The policies and transport shared by every call through a pipeline.
pub(crate) struct Chain {
    pub(crate) policies: Vec<PipelinePolicy>,
    pub(crate) transport: Arc<dyn HttpClient>,
}

/// An ordered chain of policies terminated by a transport.
///
/// The chain is fixed at construction. Cloning a pipeline is cheap and the
/// clones share the same policies, so one pipeline can serve any number of
/// concurrent calls in either execution mode.
#[derive(Clone)]
pub struct Pipeline {
    chain: Arc<Chain>,
}

impl Pipeline {
    pub(crate) fn from_parts(policies: Vec<PipelinePolicy>, transport: Arc<dyn HttpClient>) -> Self {
        Self {
            chain: Arc::new(Chain {
                policies,
                transport,
            }),
        }
    }

    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the number of policies.
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.chain.policies.len()
    }

    /// Returns the policy at `index`.
    #[must_use]
    pub fn policy(&self, index: usize) -> Option<&PipelinePolicy> {
        self.chain.policies.get(index)
    }

    /// Returns all policies in declaration order.
    #[must_use]
    pub fn policies(&self) -> &[PipelinePolicy] {
        &self.chain.policies
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn HttpClient> {
        &self.chain.transport
    }

    /// Sends a request through the chain asynchronously.
    ///
    /// Nothing runs until the returned future is polled. Dropping the future
    /// abandons the call and everything in flight under it, including
    /// backoff timers. A `CancellationToken` in the context cancels the call
    /// with `PipelineError::Cancelled`; a timeout in the context bounds it
    /// with `PipelineError::Timeout`.
    pub fn send(
        &self,
        request: Request,
        context: Context,
    ) -> impl Future<Output = Result<Response>> + Send + 'static {
        let chain = Arc::clone(&self.chain);
        async move {
            debug!(method = %request.method, path = request.uri.path(), "pipeline send");
            let deadline = context.timeout();
            let token = context.cancellation().cloned();
            let call = Next::new(CallState::new(chain, context)).run(request);

            let call = async move {
                match deadline {
                    Some(limit) => match tokio::time::timeout(limit, call).await {
                        Ok(result) => result,
                        Err(_) => Err(PipelineError::Timeout(limit)),
                    },
                    None => call.await,
                }
            };

            match token {
                Some(token) => {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => Err(PipelineError::Cancelled(
                            token.reason().unwrap_or_else(|| "cancelled".to_string()),
                        )),
                        result = call => result,
                    }
                }
                None => call.await,
            }
        }
    }

    /// Sends a request through the chain on the calling thread.
    ///
    /// Blocks until the transport and every policy have finished. There is no
    /// mid-flight interruption; bound the call with the transport's own
    /// timeout. A context `CancellationToken` that is already cancelled fails
    /// the call before it starts.
    ///
    /// # Errors
    ///
    /// Returns whatever the policies or the transport return.
    pub fn send_sync(&self, request: Request, context: Context) -> Result<Response> {
        if let Some(token) = context.cancellation() {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled(
                    token.reason().unwrap_or_else(|| "cancelled".to_string()),
                ));
            }
        }
        debug!(method = %request.method, path = request.uri.path(), "pipeline send_sync");
        let state = CallState::new(Arc::clone(&self.chain), context);
        NextSync::new(state).run(request)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.chain.policies.iter().map(PipelinePolicy::name).collect();
        f.debug_struct("Pipeline")
            .field("policies", &names)
            .field("transport", &self.chain.transport)
            .finish()
    }
}
