//! Redirect following.

use crate::errors::Result;
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use http::header::{AUTHORIZATION, COOKIE, LOCATION};
use http::uri::PathAndQuery;
use http::{Method, StatusCode, Uri};
use tracing::{debug, warn};

/// Default limit on redirects followed per call.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

fn is_redirect_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn default_port(uri: &Uri) -> Option<u16> {
    uri.port_u16().or_else(|| match uri.scheme_str() {
        Some("https") => Some(443),
        Some("http") => Some(80),
        _ => None,
    })
}

fn same_origin(left: &Uri, right: &Uri) -> bool {
    let scheme = |uri: &Uri| uri.scheme_str().unwrap_or_default().to_ascii_lowercase();
    let host = |uri: &Uri| uri.host().unwrap_or_default().to_ascii_lowercase();
    scheme(left) == scheme(right) && host(left) == host(right) && default_port(left) == default_port(right)
}

/// Resolves a `Location` value against the URI that produced it.
fn resolve_location(current: &Uri, location: &str) -> Option<Uri> {
    let target = Uri::try_from(location).ok()?;
    if target.scheme().is_some() && target.authority().is_some() {
        return Some(target);
    }

    let path = if location.starts_with('/') {
        location.to_string()
    } else {
        let base = current.path();
        let dir = base.rfind('/').map_or("/", |i| &base[..=i]);
        format!("{dir}{location}")
    };
    let mut parts = current.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path).ok()?);
    Uri::from_parts(parts).ok()
}

/// Follows `301`, `302`, `307` and `308` responses for `GET` and `HEAD`.
///
/// Each hop re-enters the rest of the chain from this policy's position.
/// The policy stops and returns the redirect response as-is when the limit is
/// reached, the `Location` header is missing or unusable, or the target was
/// already visited during this call. Credentials and cookies are dropped when
/// a hop leaves the original origin.
#[derive(Debug, Clone, Copy)]
pub struct RedirectPolicy {
    max_redirects: usize,
}

impl RedirectPolicy {
    /// Creates a policy following at most `max_redirects` hops.
    #[must_use]
    pub fn new(max_redirects: usize) -> Self {
        Self { max_redirects }
    }

    /// Returns the hop limit.
    #[must_use]
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    fn follows(method: &Method) -> bool {
        *method == Method::GET || *method == Method::HEAD
    }

    /// Builds the request for the next hop, or `None` to stop here.
    fn next_hop(&self, template: &Request, visited: &mut Vec<Uri>, response: &Response) -> Option<Request> {
        if !is_redirect_status(response.status) {
            return None;
        }
        let hops = visited.len() - 1;
        if hops >= self.max_redirects {
            warn!(max_redirects = self.max_redirects, "redirect limit reached");
            return None;
        }
        let current = visited.last()?;
        let location = response.headers.get(LOCATION)?.to_str().ok()?;
        let target = resolve_location(current, location)?;
        if visited.contains(&target) {
            warn!(path = target.path(), "redirect loop detected");
            return None;
        }

        let mut request = template.try_clone()?;
        if !same_origin(&template.uri, &target) {
            request.headers.remove(AUTHORIZATION);
            request.headers.remove(COOKIE);
        }
        debug!(status = %response.status, hop = hops + 1, path = target.path(), "following redirect");
        request.uri = target.clone();
        visited.push(target);
        Some(request)
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REDIRECTS)
    }
}

impl Policy for RedirectPolicy {
    fn name(&self) -> &str {
        "RedirectPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for RedirectPolicy {
    async fn process(&self, request: Request, next: Next) -> Result<Response> {
        if !Self::follows(&request.method) {
            return next.run(request).await;
        }
        let Some(template) = request.try_clone() else {
            return next.run(request).await;
        };
        let mut visited = vec![request.uri.clone()];
        let mut current = request;

        loop {
            let response = next.fork().run(current).await?;
            match self.next_hop(&template, &mut visited, &response) {
                Some(hop) => current = hop,
                None => return Ok(response),
            }
        }
    }
}

impl SyncPolicy for RedirectPolicy {
    fn process_sync(&self, request: Request, next: NextSync) -> Result<Response> {
        if !Self::follows(&request.method) {
            return next.run(request);
        }
        let Some(template) = request.try_clone() else {
            return next.run(request);
        };
        let mut visited = vec![request.uri.clone()];
        let mut current = request;

        loop {
            let response = next.fork().run(current)?;
            match self.next_hop(&template, &mut visited, &response) {
                Some(hop) => current = hop,
                None => return Ok(response),
            }
        }
    }
}
