//! User agent policy.

use crate::context::Context;
use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::pipeline::{Next, NextSync};
use crate::policy::{AsyncPolicy, Policy, SyncPolicy};
use async_trait::async_trait;
use http::header::USER_AGENT;
use http::HeaderValue;
use serde::{Deserialize, Serialize};

const MAX_APPLICATION_ID_LEN: usize = 24;

/// Configuration for the `user-agent` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAgentOptions {
    /// Name of the client library.
    pub sdk_name: String,
    /// Version of the client library.
    pub sdk_version: String,
    /// Application id placed in front of the library token.
    pub application_id: Option<String>,
}

impl Default for UserAgentOptions {
    fn default() -> Self {
        Self {
            sdk_name: env!("CARGO_PKG_NAME").to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            application_id: None,
        }
    }
}

impl UserAgentOptions {
    /// Creates options for a client library.
    #[must_use]
    pub fn new(sdk_name: impl Into<String>, sdk_version: impl Into<String>) -> Self {
        Self {
            sdk_name: sdk_name.into(),
            sdk_version: sdk_version.into(),
            application_id: None,
        }
    }

    /// Sets the application id.
    #[must_use]
    pub fn with_application_id(mut self, id: impl Into<String>) -> Self {
        self.application_id = Some(id.into());
        self
    }
}

/// Sets `user-agent` to identify the client library and platform.
///
/// The value has the form
/// `[<application id> ]azsdk-rust-<sdk>/<version> (<os>; <arch>)`, followed by
/// the suffix bound with `Context::with_user_agent_suffix`, if any.
#[derive(Debug, Clone)]
pub struct UserAgentPolicy {
    base: String,
}

impl UserAgentPolicy {
    /// Creates the policy.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the application id is longer than 24
    /// characters or contains whitespace.
    pub fn new(options: &UserAgentOptions) -> Result<Self> {
        let sdk = options.sdk_name.trim_start_matches("azure_");
        let mut base = format!(
            "azsdk-rust-{sdk}/{} ({}; {})",
            options.sdk_version,
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        if let Some(id) = &options.application_id {
            if id.chars().count() > MAX_APPLICATION_ID_LEN || id.chars().any(char::is_whitespace) {
                return Err(PipelineError::Configuration(format!(
                    "application id '{id}' must be at most {MAX_APPLICATION_ID_LEN} characters without whitespace"
                )));
            }
            base = format!("{id} {base}");
        }
        HeaderValue::try_from(base.as_str()).map_err(|e| PipelineError::InvalidHeader(format!("user-agent: {e}")))?;
        Ok(Self { base })
    }

    /// Returns the value without a per-call suffix.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.base
    }

    fn apply(&self, request: &mut Request, context: &Context) -> Result<()> {
        let value = match context.user_agent_suffix() {
            Some(suffix) => HeaderValue::try_from(format!("{} {suffix}", self.base)),
            None => HeaderValue::try_from(self.base.as_str()),
        }
        .map_err(|e| PipelineError::InvalidHeader(format!("user-agent: {e}")))?;
        request.headers.insert(USER_AGENT, value);
        Ok(())
    }
}

impl Policy for UserAgentPolicy {
    fn name(&self) -> &str {
        "UserAgentPolicy"
    }
}

#[async_trait]
impl AsyncPolicy for UserAgentPolicy {
    async fn process(&self, mut request: Request, next: Next) -> Result<Response> {
        self.apply(&mut request, next.context())?;
        next.run(request).await
    }
}

impl SyncPolicy for UserAgentPolicy {
    fn process_sync(&self, mut request: Request, next: NextSync) -> Result<Response> {
        self.apply(&mut request, next.context())?;
        next.run(request)
    }
}
