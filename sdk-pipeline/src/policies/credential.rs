//! Credential attachment policies.
//!
//! `KeyCredentialPolicy` writes a static key into a header and runs in both
//! execution modes. `BearerTokenPolicy` obtains tokens from a
//! `TokenCredential`, which usually performs network I/O, so it only has an
//! asynchronous path; `send_sync` reaches it through the bridge.

use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// A string that never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(REDACTED)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("REDACTED")
    }
}

fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::try_from(value)
        .map_err(|_| PipelineError::Credential("credential is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Attaches a static key to every request.
#[derive(Debug, Clone)]
pub struct KeyCredentialPolicy {
    header: HeaderName,
    key: Secret,
    prefix: Option<String>,
}

impl KeyCredentialPolicy {
    /// Creates a policy writing `key` into `header`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if `header` is not a valid header name.
    pub fn new(header: &str, key: Secret) -> Result<Self> {
        let header = HeaderName::try_from(header)
            .map_err(|e| PipelineError::InvalidHeader(format!("{header}: {e}")))?;
        Ok(Self {
            header,
            key,
            prefix: None,
        })
    }

    /// Prefixes the key, e.g. `SharedAccessKey`, separated by a space.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn attach(&self, request: &mut Request) -> Result<()> {
        let value = match &self.prefix {
            Some(prefix) => sensitive_value(&format!("{prefix} {}", self.key.expose()))?,
            None => sensitive_value(self.key.expose())?,
        };
        request.headers.insert(self.header.clone(), value);
        Ok(())
    }
}

impl Policy for KeyCredentialPolicy {
    fn name(&self) -> &str {
        "KeyCredentialPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for KeyCredentialPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.attach(&mut request)?;
        next.run(request).await
    }
}

impl SyncPolicy for KeyCredentialPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.attach(&mut request)?;
        next.run(request)
    }
}

/// A bearer token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The token value.
    pub token: Secret,
    /// When the token stops being valid.
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Creates an access token.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: Secret::new(token),
            expires_on,
        }
    }

    /// Returns true if the token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => self.expires_on.signed_duration_since(now) <= window,
            Err(_) => true,
        }
    }
}

/// Source of bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync + fmt::Debug {
    /// Obtains a token valid for `scopes`.
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken>;
}

/// Attaches `Authorization: Bearer <token>` to every request.
///
/// Tokens are cached and refreshed once they come within the refresh window
/// of expiring. Concurrent calls share one refresh. Requests to plain `http`
/// URIs are refused before a token is requested.
#[derive(Debug)]
pub struct BearerTokenPolicy {
    credential: Arc<dyn TokenCredential>,
    scopes: Vec<String>,
    refresh_window: Duration,
    cache: Mutex<Option<AccessToken>>,
}

impl BearerTokenPolicy {
    /// Default refresh window before expiry.
    pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(300);

    /// Creates a policy requesting tokens for `scopes`.
    #[must_use]
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            credential,
            scopes: scopes.into_iter().map(Into::into).collect(),
            refresh_window: Self::DEFAULT_REFRESH_WINDOW,
            cache: Mutex::new(None),
        }
    }

    /// Sets how long before expiry a cached token is refreshed.
    #[must_use]
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    async fn token(&self) -> Result<Secret> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if !cached.expires_within(self.refresh_window, Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        debug!(scopes = ?self.scopes, "requesting access token");
        let fresh = self.credential.get_token(&self.scopes).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

impl Policy for BearerTokenPolicy {
    fn name(&self) -> &str {
        "BearerTokenPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for BearerTokenPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        if request.uri.scheme() != Some(&http::uri::Scheme::HTTPS) {
            return Err(PipelineError::Credential(
                "bearer token authentication requires https".to_string(),
            ));
        }
        let token = self.token().await?;
        let value = sensitive_value(&format!("Bearer {}", token.expose()))?;
        request.headers.insert(http::header::AUTHORIZATION, value);
        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::pipeline::Pipeline;
    use crate::testing::{assert_header, MockTransport};
    use pretty_assertions::assert_eq;

    mockall::mock! {
        Credential {}

        #[async_trait]
        impl TokenCredential for Credential {
            async fn get_token(&self, scopes: &[String]) -> Result<AccessToken>;
        }
    }

    impl fmt::Debug for MockCredential {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("MockCredential")
        }
    }

    fn bearer_pipeline(credential: MockCredential, transport: Arc<MockTransport>) -> Pipeline {
        Pipeline::builder()
            .async_policy(BearerTokenPolicy::new(Arc::new(credential), ["https://storage.example/.default"]))
            .transport_arc(transport)
            .build()
            .unwrap()
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(REDACTED)");
        assert_eq!(secret.to_string(), "REDACTED");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_key_credential_with_prefix() {
        let transport = Arc::new(MockTransport::ok());
        let policy = KeyCredentialPolicy::new("authorization", Secret::new("abc"))
            .unwrap()
            .with_prefix("SharedAccessKey");
        assert!(!format!("{policy:?}").contains("abc"));

        let pipeline = Pipeline::builder()
            .policy(policy)
            .transport_arc(transport.clone())
            .build()
            .unwrap();
        pipeline
            .send_sync(Request::get("https://example.com").unwrap(), Context::new())
            .unwrap();

        let recorded = transport.last_request().unwrap();
        assert_header(&recorded, "authorization", "SharedAccessKey abc");
        assert!(recorded.headers["authorization"].is_sensitive());
    }

    #[tokio::test]
    async fn test_bearer_token_is_cached() {
        let mut credential = MockCredential::new();
        credential
            .expect_get_token()
            .times(1)
            .returning(|_| Ok(AccessToken::new("tok", Utc::now() + chrono::Duration::hours(1))));

        let transport = Arc::new(MockTransport::ok());
        let pipeline = bearer_pipeline(credential, transport.clone());

        for _ in 0..3 {
            pipeline
                .send(Request::get("https://example.com").unwrap(), Context::new())
                .await
                .unwrap();
        }
        assert_eq!(transport.request_count(), 3);
        assert_header(&transport.last_request().unwrap(), "authorization", "Bearer tok");
    }

    #[tokio::test]
    async fn test_bearer_token_refreshed_inside_window() {
        let mut credential = MockCredential::new();
        let mut seq = mockall::Sequence::new();
        credential
            .expect_get_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(AccessToken::new("old", Utc::now() + chrono::Duration::minutes(2))));
        credential
            .expect_get_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(AccessToken::new("new", Utc::now() + chrono::Duration::hours(1))));

        let transport = Arc::new(MockTransport::ok());
        let pipeline = bearer_pipeline(credential, transport.clone());

        for _ in 0..2 {
            pipeline
                .send(Request::get("https://example.com").unwrap(), Context::new())
                .await
                .unwrap();
        }
        assert_header(&transport.last_request().unwrap(), "authorization", "Bearer new");
    }

    #[tokio::test]
    async fn test_bearer_rejects_plain_http() {
        let mut credential = MockCredential::new();
        credential.expect_get_token().times(0);

        let transport = Arc::new(MockTransport::ok());
        let pipeline = bearer_pipeline(credential, transport.clone());

        let result = pipeline
            .send(Request::get("http://example.com").unwrap(), Context::new())
            .await;
        assert!(matches!(result, Err(PipelineError::Credential(_))));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_credential_failure_propagates() {
        let mut credential = MockCredential::new();
        credential
            .expect_get_token()
            .returning(|_| Err(PipelineError::Credential("login required".to_string())));

        let transport = Arc::new(MockTransport::ok());
        let pipeline = bearer_pipeline(credential, transport.clone());

        let result = pipeline
            .send(Request::get("https://example.com").unwrap(), Context::new())
            .await;
        assert!(matches!(result, Err(PipelineError::Credential(msg)) if msg == "login required"));
    }

    #[test]
    fn test_bearer_under_send_sync_uses_bridge() {
        let mut credential = MockCredential::new();
        credential
            .expect_get_token()
            .returning(|_| Ok(AccessToken::new("tok", Utc::now() + chrono::Duration::hours(1))));

        let transport = Arc::new(MockTransport::ok());
        let pipeline = bearer_pipeline(credential, transport.clone());

        pipeline
            .send_sync(Request::get("https://example.com").unwrap(), Context::new())
            .unwrap();
        // the rest of the chain stays on the asynchronous path inside the bridge
        assert_eq!(transport.async_calls(), 1);
        assert_header(&transport.last_request().unwrap(), "authorization", "Bearer tok");
    }
}
