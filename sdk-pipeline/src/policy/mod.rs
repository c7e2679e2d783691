//! Policy traits.
//!
//! A policy intercepts the request on its way to the transport and the
//! response on its way back. Policies declare which execution paths they
//! implement natively; the pipeline bridges the missing one:
//!
//! - `AsyncPolicy` only: `send_sync` blocks on the asynchronous path.
//! - `SyncPolicy` only: `send` runs the synchronous path on the blocking pool.
//! - both (`DualPolicy`): each entry point uses its matching path directly.

use crate::errors::Result;
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Common identity of every policy.
pub trait Policy: Send + Sync + Debug {
    /// Returns the policy name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A policy with a native asynchronous path.
#[async_trait]
pub trait AsyncPolicy: Policy {
    /// Processes the request, delegating to `next` to run the rest of the chain.
    ///
    /// `next` is consumed by `Next::run`, so the remainder of the chain can be
    /// entered at most once through it. Policies that need to re-enter the
    /// chain (retry, redirect) take explicit forks with `Next::fork`.
    async fn process(&self, request: Request, next: Next) -> Result<Response>;
}

/// A policy with a native synchronous path.
pub trait SyncPolicy: Policy {
    /// Processes the request on the calling thread.
    fn process_sync(&self, request: Request, next: NextSync) -> Result<Response>;
}

/// A policy implementing both paths natively.
pub trait DualPolicy: AsyncPolicy + SyncPolicy {}

impl<T: AsyncPolicy + SyncPolicy + ?Sized> DualPolicy for T {}

/// The execution paths a policy implements natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Asynchronous only.
    Async,
    /// Synchronous only.
    Sync,
    /// Both paths.
    Both,
}

/// A policy as stored in a pipeline, tagged with its capabilities.
#[derive(Debug, Clone)]
pub enum PipelinePolicy {
    /// Asynchronous only.
    Async(Arc<dyn AsyncPolicy>),
    /// Synchronous only.
    Sync(Arc<dyn SyncPolicy>),
    /// Both paths.
    Both(Arc<dyn DualPolicy>),
}

impl PipelinePolicy {
    /// Wraps a policy that only implements the asynchronous path.
    pub fn async_only<P: AsyncPolicy + 'static>(policy: Arc<P>) -> Self {
        Self::Async(policy)
    }

    /// Wraps a policy that only implements the synchronous path.
    pub fn sync_only<P: SyncPolicy + 'static>(policy: Arc<P>) -> Self {
        Self::Sync(policy)
    }

    /// Wraps a policy implementing both paths.
    pub fn both<P: AsyncPolicy + SyncPolicy + 'static>(policy: Arc<P>) -> Self {
        Self::Both(policy)
    }

    /// Returns the native capabilities.
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Async(_) => PolicyKind::Async,
            Self::Sync(_) => PolicyKind::Sync,
            Self::Both(_) => PolicyKind::Both,
        }
    }

    /// Returns the policy name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Async(p) => p.name(),
            Self::Sync(p) => p.name(),
            Self::Both(p) => p.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingPolicy;

    #[derive(Debug)]
    struct Named;

    impl Policy for Named {}

    #[test]
    fn test_default_name_is_type_name() {
        assert!(Named.name().ends_with("Named"));
    }

    #[test]
    fn test_kind_tags() {
        let policy = Arc::new(CountingPolicy::new("c"));
        assert_eq!(PipelinePolicy::both(policy.clone()).kind(), PolicyKind::Both);
        assert_eq!(PipelinePolicy::async_only(policy.clone()).kind(), PolicyKind::Async);
        assert_eq!(PipelinePolicy::sync_only(policy.clone()).kind(), PolicyKind::Sync);
        assert_eq!(PipelinePolicy::both(policy).name(), "c");
    }
}
