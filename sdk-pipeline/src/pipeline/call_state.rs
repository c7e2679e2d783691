//! Per-call traversal state.

use super::Chain;
use crate::context::Context;
use crate::errors::{PipelineError, Result};
use crate::policy::PipelinePolicy;
use crate::transport::HttpClient;
use std::fmt;
use std::sync::Arc;

/// What a cursor advance resolved to.
#[derive(Debug, Clone)]
pub enum Step {
    /// Run the policy at this position.
    Policy(usize, PipelinePolicy),
    /// Every policy has run; hand the request to the transport.
    Transport(Arc<dyn HttpClient>),
}

/// The position of one call within a pipeline, plus its context.
///
/// A call state is an immutable value: `advance` returns a new state one step
/// further along instead of moving a shared cursor. Cloning it forks an
/// independent cursor at the same position, which is how retrying policies
/// replay the remainder of the chain without touching other attempts.
#[derive(Clone)]
pub struct CallState {
    chain: Arc<Chain>,
    context: Context,
    /// Slot of the next policy to run; `policy_count` means the transport,
    /// `policy_count + 1` means the chain is exhausted.
    next: usize,
}

impl CallState {
    pub(crate) fn new(chain: Arc<Chain>, context: Context) -> Self {
        Self {
            chain,
            context,
            next: 0,
        }
    }

    /// Returns the per-call context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the number of policies in the pipeline.
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.chain.policies.len()
    }

    /// Returns the slot most recently entered, or `None` before the first
    /// advance. The transport occupies slot `policy_count`.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.next.checked_sub(1)
    }

    /// Returns true once the transport has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next > self.chain.policies.len()
    }

    /// Moves one step along the chain.
    ///
    /// # Errors
    ///
    /// Returns `NoMorePolicies` when called on a state that has already
    /// reached the transport.
    pub fn advance(&self) -> Result<(Self, Step)> {
        let count = self.chain.policies.len();
        let step = match self.next.cmp(&count) {
            std::cmp::Ordering::Less => {
                Step::Policy(self.next, self.chain.policies[self.next].clone())
            }
            std::cmp::Ordering::Equal => Step::Transport(Arc::clone(&self.chain.transport)),
            std::cmp::Ordering::Greater => {
                return Err(PipelineError::NoMorePolicies {
                    index: self.next,
                    policy_count: count,
                })
            }
        };

        let advanced = Self {
            chain: Arc::clone(&self.chain),
            context: self.context.clone(),
            next: self.next + 1,
        };
        Ok((advanced, step))
    }
}

impl fmt::Debug for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallState")
            .field("index", &self.index())
            .field("policy_count", &self.policy_count())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingPolicy, MockTransport};

    fn chain(policies: usize) -> Arc<Chain> {
        let policies = (0..policies)
            .map(|i| PipelinePolicy::both(Arc::new(CountingPolicy::new(format!("p{i}")))))
            .collect();
        Arc::new(Chain {
            policies,
            transport: Arc::new(MockTransport::ok()),
        })
    }

    #[test]
    fn test_fresh_state_has_no_index() {
        let state = CallState::new(chain(2), Context::new());
        assert_eq!(state.index(), None);
        assert!(!state.is_exhausted());
    }

    #[test]
    fn test_advance_walks_policies_then_transport() {
        let state = CallState::new(chain(2), Context::new());

        let (state, step) = state.advance().unwrap();
        assert!(matches!(step, Step::Policy(0, _)));
        assert_eq!(state.index(), Some(0));

        let (state, step) = state.advance().unwrap();
        assert!(matches!(step, Step::Policy(1, ref p) if p.name() == "p1"));

        let (state, step) = state.advance().unwrap();
        assert!(matches!(step, Step::Transport(_)));
        assert_eq!(state.index(), Some(2));
        assert!(state.is_exhausted());
    }

    #[test]
    fn test_advance_past_transport_fails() {
        let state = CallState::new(chain(1), Context::new());
        let (state, _) = state.advance().unwrap();
        let (state, _) = state.advance().unwrap();

        let err = state.advance().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoMorePolicies {
                index: 2,
                policy_count: 1
            }
        ));
        // The failed advance leaves the state where it was.
        assert_eq!(state.index(), Some(1));
    }

    #[test]
    fn test_empty_chain_goes_straight_to_transport() {
        let state = CallState::new(chain(0), Context::new());
        let (_, step) = state.advance().unwrap();
        assert!(matches!(step, Step::Transport(_)));
    }

    #[test]
    fn test_fork_is_independent() {
        let state = CallState::new(chain(3), Context::new());
        let (state, _) = state.advance().unwrap();
        let fork = state.clone();

        let (advanced, _) = state.advance().unwrap();
        assert_eq!(advanced.index(), Some(1));
        assert_eq!(fork.index(), Some(0));
    }
}
