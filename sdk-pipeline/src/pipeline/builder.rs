//! Pipeline builder.

use super::Pipeline;
use crate::errors::{PipelineError, Result};
use crate::policy::{AsyncPolicy, PipelinePolicy, SyncPolicy};
use crate::transport::HttpClient;
use std::sync::Arc;
use tracing::warn;

/// Builder for assembling a pipeline.
///
/// Policies run in the order they are added: the first policy added is the
/// first to see the request and the last to see the response.
#[derive(Debug, Default, Clone)]
pub struct PipelineBuilder {
    policies: Vec<PipelinePolicy>,
    transport: Option<Arc<dyn HttpClient>>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a policy implementing both execution paths.
    #[must_use]
    pub fn policy<P: AsyncPolicy + SyncPolicy + 'static>(self, policy: P) -> Self {
        self.add(PipelinePolicy::both(Arc::new(policy)))
    }

    /// Appends a policy implementing only the asynchronous path.
    #[must_use]
    pub fn async_policy<P: AsyncPolicy + 'static>(self, policy: P) -> Self {
        self.add(PipelinePolicy::async_only(Arc::new(policy)))
    }

    /// Appends a policy implementing only the synchronous path.
    #[must_use]
    pub fn sync_policy<P: SyncPolicy + 'static>(self, policy: P) -> Self {
        self.add(PipelinePolicy::sync_only(Arc::new(policy)))
    }

    /// Appends an already tagged policy.
    #[must_use]
    pub fn add(mut self, policy: PipelinePolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Appends several tagged policies in order.
    #[must_use]
    pub fn policies(mut self, policies: impl IntoIterator<Item = PipelinePolicy>) -> Self {
        self.policies.extend(policies);
        self
    }

    /// Sets the transport.
    #[must_use]
    pub fn transport<T: HttpClient + 'static>(self, transport: T) -> Self {
        self.transport_arc(Arc::new(transport))
    }

    /// Sets a shared transport.
    #[must_use]
    pub fn transport_arc(mut self, transport: Arc<dyn HttpClient>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Returns the number of policies added so far.
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Builds the pipeline.
    ///
    /// Policies that lack a native path for one of the execution modes are
    /// reported with a warning, since calls in that mode go through the bridge.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no transport was set.
    pub fn build(self) -> Result<Pipeline> {
        let transport = self.transport.ok_or_else(|| {
            PipelineError::Configuration("pipeline requires a transport".to_string())
        })?;

        for (index, policy) in self.policies.iter().enumerate() {
            match policy {
                PipelinePolicy::Async(p) => warn!(
                    policy = p.name(),
                    index,
                    "policy has no native sync implementation; send_sync will block on its async path"
                ),
                PipelinePolicy::Sync(p) => warn!(
                    policy = p.name(),
                    index,
                    "policy has no native async implementation; send will run it on the blocking pool"
                ),
                PipelinePolicy::Both(_) => {}
            }
        }
        if !transport.has_native_sync() {
            warn!(
                transport = ?transport,
                "transport has no native sync implementation; send_sync will block on its async path"
            );
        }

        Ok(Pipeline::from_parts(self.policies, transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyKind;
    use crate::testing::{CountingPolicy, MockTransport};

    #[test]
    fn test_build_without_transport_fails() {
        let result = PipelineBuilder::new()
            .policy(CountingPolicy::new("only"))
            .build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_build_preserves_order_and_kinds() {
        let pipeline = PipelineBuilder::new()
            .policy(CountingPolicy::new("both"))
            .async_policy(CountingPolicy::new("async"))
            .sync_policy(CountingPolicy::new("sync"))
            .transport(MockTransport::ok())
            .build()
            .unwrap();

        let kinds: Vec<PolicyKind> = pipeline.policies().iter().map(PipelinePolicy::kind).collect();
        assert_eq!(kinds, vec![PolicyKind::Both, PolicyKind::Async, PolicyKind::Sync]);

        let names: Vec<&str> = pipeline.policies().iter().map(PipelinePolicy::name).collect();
        assert_eq!(names, vec!["both", "async", "sync"]);
    }

    #[test]
    fn test_empty_chain_is_allowed() {
        let builder = PipelineBuilder::new().transport(MockTransport::ok());
        assert_eq!(builder.policy_count(), 0);
        assert_eq!(builder.build().unwrap().policy_count(), 0);
    }
}
