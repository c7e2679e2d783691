//! Header injection policies.

use crate::errors::Result;
use crate::http::{header_pair, Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use http::HeaderMap;

/// Copies `source` into `target`; each name in `source` replaces every
/// existing value of that name in `target`.
pub(crate) fn merge_overriding(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        target.remove(name);
    }
    for (name, value) in source {
        target.append(name.clone(), value.clone());
    }
}

/// Sets a fixed set of headers on every request, replacing existing values.
#[derive(Debug, Clone, Default)]
pub struct AddHeadersPolicy {
    headers: HeaderMap,
}

impl AddHeadersPolicy {
    /// Creates the policy from a header map.
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Creates the policy from name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if a name or value is not valid HTTP.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let (name, value) = header_pair(name.as_ref(), value.as_ref())?;
            headers.append(name, value);
        }
        Ok(Self { headers })
    }

    /// Returns the configured headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Policy for AddHeadersPolicy {
    fn name(&self) -> &str {
        "AddHeadersPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for AddHeadersPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        merge_overriding(&mut request.headers, &self.headers);
        next.run(request).await
    }
}

impl SyncPolicy for AddHeadersPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        merge_overriding(&mut request.headers, &self.headers);
        next.run(request)
    }
}

/// Merges per-call headers from the context into the request.
///
/// Headers bound with `Context::with_headers` win over headers already on the
/// request: every value of a context-supplied name replaces every existing
/// value of that name. Names the context does not mention are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddHeadersFromContextPolicy;

impl AddHeadersFromContextPolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Policy for AddHeadersFromContextPolicy {
    fn name(&self) -> &str {
        "AddHeadersFromContextPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for AddHeadersFromContextPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        if let Some(headers) = next.context().headers() {
            merge_overriding(&mut request.headers, headers);
        }
        next.run(request).await
    }
}

impl SyncPolicy for AddHeadersFromContextPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        if let Some(headers) = next.context().headers() {
            merge_overriding(&mut request.headers, headers);
        }
        next.run(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::pipeline::Pipeline;
    use crate::testing::{assert_header, MockTransport};
    use http::HeaderValue;
    use std::sync::Arc;

    fn context_headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    #[test]
    fn test_merge_replaces_all_values() {
        let mut target = context_headers(&[("x-a", "1"), ("x-a", "2"), ("x-keep", "k")]);
        let source = context_headers(&[("x-a", "3")]);
        merge_overriding(&mut target, &source);

        let values: Vec<_> = target.get_all("x-a").iter().collect();
        assert_eq!(values, vec![&HeaderValue::from_static("3")]);
        assert_eq!(target.get("x-keep"), Some(&HeaderValue::from_static("k")));
    }

    #[test]
    fn test_static_headers_overwrite() {
        let transport = Arc::new(MockTransport::ok());
        let pipeline = Pipeline::builder()
            .policy(AddHeadersPolicy::from_pairs([("x-tenant", "contoso")]).unwrap())
            .transport_arc(transport.clone())
            .build()
            .unwrap();

        let request = Request::get("https://example.com")
            .unwrap()
            .with_header("x-tenant", "fabrikam")
            .unwrap();
        pipeline.send_sync(request, Context::new()).unwrap();
        assert_header(&transport.last_request().unwrap(), "x-tenant", "contoso");
    }

    #[test]
    fn test_from_pairs_rejects_invalid_name() {
        let result = AddHeadersPolicy::from_pairs([("bad header", "x")]);
        assert!(matches!(result, Err(crate::errors::PipelineError::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_context_headers_override_request() {
        let transport = Arc::new(MockTransport::ok());
        let pipeline = Pipeline::builder()
            .policy(AddHeadersFromContextPolicy::new())
            .transport_arc(transport.clone())
            .build()
            .unwrap();

        let ctx = Context::new().with_headers(context_headers(&[("x-trace", "from-context")]));
        let request = Request::get("https://example.com")
            .unwrap()
            .with_header("x-trace", "from-request")
            .unwrap()
            .with_header("x-other", "untouched")
            .unwrap();
        pipeline.send(request, ctx).await.unwrap();

        let recorded = transport.last_request().unwrap();
        assert_header(&recorded, "x-trace", "from-context");
        assert_header(&recorded, "x-other", "untouched");
    }

    #[test]
    fn test_without_context_headers_is_noop() {
        let transport = Arc::new(MockTransport::ok());
        let pipeline = Pipeline::builder()
            .policy(AddHeadersFromContextPolicy::new())
            .transport_arc(transport.clone())
            .build()
            .unwrap();

        let request = Request::get("https://example.com")
            .unwrap()
            .with_header("x-trace", "from-request")
            .unwrap();
        pipeline.send_sync(request, Context::new()).unwrap();
        assert_header(&transport.last_request().unwrap(), "x-trace", "from-request");
    }
}
