//! Host and protocol rewrite policies.

use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::Uri;
use serde::{Deserialize, Serialize};

/// When a rewrite policy replaces the URI component it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteMode {
    /// Always replace the component.
    #[default]
    Always,
    /// Only fill the component in when the request has none.
    IfAbsent,
}

fn rebuild(uri: &Uri, scheme: Option<Scheme>, authority: Option<Authority>) -> Result<Uri> {
    let mut parts = uri.clone().into_parts();
    if let Some(scheme) = scheme {
        parts.scheme = Some(scheme);
    }
    if let Some(authority) = authority {
        parts.authority = Some(authority);
    }
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    if parts.authority.is_some() && parts.scheme.is_none() {
        parts.scheme = Some(Scheme::HTTPS);
    }
    if parts.scheme.is_some() && parts.authority.is_none() {
        return Err(PipelineError::Configuration(format!(
            "cannot set a scheme on '{uri}' without a host"
        )));
    }
    Uri::from_parts(parts).map_err(|e| PipelineError::Configuration(format!("cannot rewrite '{uri}': {e}")))
}

/// Replaces the authority (host and port) of the request URI.
///
/// A relative request URI that gains a host this way is given the `https`
/// scheme; a later `ProtocolPolicy` can change it.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    authority: Authority,
    mode: RewriteMode,
}

impl HostPolicy {
    /// Creates a policy that always rewrites the host.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `host` is not a valid authority.
    pub fn new(host: &str) -> Result<Self> {
        let authority = Authority::try_from(host)
            .map_err(|e| PipelineError::Configuration(format!("invalid host '{host}': {e}")))?;
        Ok(Self {
            authority,
            mode: RewriteMode::Always,
        })
    }

    /// Sets the rewrite mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.mode = mode;
        self
    }

    fn apply(&self, request: &mut Request) -> Result<()> {
        if self.mode == RewriteMode::IfAbsent && request.uri.authority().is_some() {
            return Ok(());
        }
        request.uri = rebuild(&request.uri, None, Some(self.authority.clone()))?;
        Ok(())
    }
}

impl Policy for HostPolicy {
    fn name(&self) -> &str {
        "HostPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for HostPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.apply(&mut request)?;
        next.run(request).await
    }
}

impl SyncPolicy for HostPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.apply(&mut request)?;
        next.run(request)
    }
}

/// Replaces the scheme of the request URI.
///
/// A relative request URI has no authority to pair the scheme with, so this
/// policy must run after `HostPolicy` for such requests; otherwise it fails
/// with `PipelineError::Configuration`.
#[derive(Debug, Clone)]
pub struct ProtocolPolicy {
    scheme: Scheme,
    mode: RewriteMode,
}

impl ProtocolPolicy {
    /// Creates a policy that always rewrites the scheme.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `protocol` is not a valid scheme.
    pub fn new(protocol: &str) -> Result<Self> {
        let scheme = Scheme::try_from(protocol)
            .map_err(|e| PipelineError::Configuration(format!("invalid protocol '{protocol}': {e}")))?;
        Ok(Self {
            scheme,
            mode: RewriteMode::Always,
        })
    }

    /// Sets the rewrite mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.mode = mode;
        self
    }

    fn apply(&self, request: &mut Request) -> Result<()> {
        if self.mode == RewriteMode::IfAbsent && request.uri.scheme().is_some() {
            return Ok(());
        }
        request.uri = rebuild(&request.uri, Some(self.scheme.clone()), None)?;
        Ok(())
    }
}

impl Policy for ProtocolPolicy {
    fn name(&self) -> &str {
        "ProtocolPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for ProtocolPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.apply(&mut request)?;
        next.run(request).await
    }
}

impl SyncPolicy for ProtocolPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.apply(&mut request)?;
        next.run(request)
    }
}
