//! Persistent key-value context.

use super::{keys, CancellationToken};
use http::HeaderMap;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

struct Node {
    key: Cow<'static, str>,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// An immutable, per-call key-value bag.
///
/// Each `with` returns a new context whose head points at the previous one,
/// so contexts handed to concurrent calls never observe each other's writes.
/// Lookups walk from the newest entry to the oldest; a newer entry shadows an
/// older one with the same key.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with `key` bound to `value`.
    #[must_use]
    pub fn with<V>(&self, key: impl Into<Cow<'static, str>>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Node {
                key: key.into(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Returns the newest value bound to `key`, if it has type `V`.
    #[must_use]
    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.nodes()
            .find(|node| node.key == key)
            .and_then(|node| (*node.value).downcast_ref::<V>())
    }

    /// Returns true if any entry is bound to `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.nodes().any(|node| node.key == key)
    }

    /// Returns the distinct keys, newest first.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for node in self.nodes() {
            let key: &str = &node.key;
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns true if the context has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Binds headers to merge into the outgoing request.
    #[must_use]
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        self.with(keys::HEADERS, headers)
    }

    /// Returns the headers bound for merging, if any.
    #[must_use]
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.get(keys::HEADERS)
    }

    /// Binds a cancellation token.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        self.with(keys::CANCELLATION, token)
    }

    /// Returns the bound cancellation token, if any.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.get(keys::CANCELLATION)
    }

    /// Binds a deadline for asynchronous calls.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with(keys::TIMEOUT, timeout)
    }

    /// Returns the bound deadline, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.get::<Duration>(keys::TIMEOUT).copied()
    }

    /// Binds an explicit client request id.
    #[must_use]
    pub fn with_client_request_id(&self, id: impl Into<String>) -> Self {
        self.with(keys::CLIENT_REQUEST_ID, id.into())
    }

    /// Returns the explicit client request id, if any.
    #[must_use]
    pub fn client_request_id(&self) -> Option<&str> {
        self.get::<String>(keys::CLIENT_REQUEST_ID).map(String::as_str)
    }

    /// Binds a suffix appended to the user agent.
    #[must_use]
    pub fn with_user_agent_suffix(&self, suffix: impl Into<String>) -> Self {
        self.with(keys::USER_AGENT_SUFFIX, suffix.into())
    }

    /// Returns the bound user agent suffix, if any.
    #[must_use]
    pub fn user_agent_suffix(&self) -> Option<&str> {
        self.get::<String>(keys::USER_AGENT_SUFFIX).map(String::as_str)
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        let mut cursor = self.head.as_deref();
        std::iter::from_fn(move || {
            let node = cursor?;
            cursor = node.parent.as_deref();
            Some(node)
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .finish()
    }
}
