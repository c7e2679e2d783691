//! Next-policy cursors handed to each policy.

use super::{bridge, CallState, Step};
use crate::context::Context;
use crate::errors::Result;
use crate::http::{Request, Response};
use crate::policy::PipelinePolicy;
use futures::future::BoxFuture;

/// Asynchronous cursor over the remainder of a chain.
///
/// `run` consumes the cursor, so a policy cannot enter the remainder twice
/// through the same handle.
#[derive(Debug)]
pub struct Next {
    state: CallState,
}

impl Next {
    pub(crate) fn new(state: CallState) -> Self {
        Self { state }
    }

    /// Returns the per-call context.
    #[must_use]
    pub fn context(&self) -> &Context {
        self.state.context()
    }

    /// Returns the call state this cursor will advance from.
    #[must_use]
    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// Forks an independent cursor at the same position.
    ///
    /// Each fork re-runs every later policy when invoked.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }

    /// Runs the rest of the chain asynchronously.
    pub fn run(self, request: Request) -> BoxFuture<'static, Result<Response>> {
        Box::pin(async move {
            let (state, step) = self.state.advance()?;
            match step {
                Step::Policy(_, PipelinePolicy::Async(policy)) => {
                    policy.process(request, Next::new(state)).await
                }
                Step::Policy(_, PipelinePolicy::Both(policy)) => {
                    policy.process(request, Next::new(state)).await
                }
                Step::Policy(_, PipelinePolicy::Sync(policy)) => {
                    bridge::offload(policy, request, NextSync::new(state)).await
                }
                Step::Transport(transport) => transport.send(request, state.context()).await,
            }
        })
    }
}

/// Synchronous cursor over the remainder of a chain.
#[derive(Debug)]
pub struct NextSync {
    state: CallState,
}

impl NextSync {
    pub(crate) fn new(state: CallState) -> Self {
        Self { state }
    }

    /// Returns the per-call context.
    #[must_use]
    pub fn context(&self) -> &Context {
        self.state.context()
    }

    /// Returns the call state this cursor will advance from.
    #[must_use]
    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// Forks an independent cursor at the same position.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }

    /// Runs the rest of the chain on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns whatever the remaining policies or the transport return.
    pub fn run(self, request: Request) -> Result<Response> {
        let (state, step) = self.state.advance()?;
        match step {
            Step::Policy(_, PipelinePolicy::Sync(policy)) => {
                policy.process_sync(request, NextSync::new(state))
            }
            Step::Policy(_, PipelinePolicy::Both(policy)) => {
                policy.process_sync(request, NextSync::new(state))
            }
            Step::Policy(_, PipelinePolicy::Async(policy)) => {
                bridge::block_on(policy.process(request, Next::new(state)))?
            }
            Step::Transport(transport) => transport.send_sync(request, state.context()),
        }
    }
}
