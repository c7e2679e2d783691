//! Pipeline configuration.
//!
//! `PipelineOptions` describes the standard policy set in a serializable form
//! so clients can load it alongside the rest of their settings.

use crate::errors::{PipelineError, Result};
use crate::pipeline::PipelineBuilder;
use crate::policies::{
    AddHeadersFromContextPolicy, AddHeadersPolicy, DatePolicy, HttpLoggingPolicy, LoggingOptions,
    RedirectPolicy, RequestIdPolicy, UserAgentOptions, UserAgentPolicy, CLIENT_REQUEST_ID_HEADER,
    DEFAULT_MAX_REDIRECTS,
};
use crate::retry::{RetryOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for the standard policy set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Retry configuration.
    pub retry: RetryOptions,
    /// HTTP logging configuration.
    pub logging: LoggingOptions,
    /// User agent configuration; `None` leaves the header alone.
    pub user_agent: Option<UserAgentOptions>,
    /// Headers set on every request.
    pub headers: BTreeMap<String, String>,
    /// Redirects followed per call; `0` disables redirect following.
    pub max_redirects: usize,
    /// Header carrying the client request id.
    pub request_id_header: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            logging: LoggingOptions::default(),
            user_agent: Some(UserAgentOptions::default()),
            headers: BTreeMap::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_id_header: CLIENT_REQUEST_ID_HEADER.to_string(),
        }
    }
}

impl PipelineOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if the JSON does not describe
    /// pipeline options.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(format!("invalid pipeline options: {e}")))
    }

    /// Sets the retry options.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the logging options.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingOptions) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the user agent options.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<UserAgentOptions>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Adds a header set on every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the redirect limit.
    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

impl PipelineBuilder {
    /// Appends the standard policy set described by `options`.
    ///
    /// Order: user agent, request id, static headers, context headers, retry,
    /// redirect, date, logging. Everything after retry runs once per attempt.
    /// Steps that are switched off (no user agent, no static headers,
    /// `max_redirects == 0`, logging disabled) are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` or `InvalidHeader` for option values no policy
    /// can honour.
    pub fn with_options(mut self, options: &PipelineOptions) -> Result<Self> {
        if let Some(user_agent) = &options.user_agent {
            self = self.policy(UserAgentPolicy::new(user_agent)?);
        }
        self = self.policy(RequestIdPolicy::with_header_name(&options.request_id_header)?);
        if !options.headers.is_empty() {
            self = self.policy(AddHeadersPolicy::from_pairs(&options.headers)?);
        }
        self = self
            .policy(AddHeadersFromContextPolicy::new())
            .policy(RetryPolicy::from_options(&options.retry)?);
        if options.max_redirects > 0 {
            self = self.policy(RedirectPolicy::new(options.max_redirects));
        }
        self = self.policy(DatePolicy::new());
        if options.logging.enabled {
            self = self.policy(HttpLoggingPolicy::new(&options.logging));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::Request;
    use crate::testing::{assert_header, MockTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_default_policy_order() {
        let pipeline = PipelineBuilder::new()
            .with_options(&PipelineOptions::default())
            .unwrap()
            .transport(MockTransport::ok())
            .build()
            .unwrap();

        let names: Vec<&str> = pipeline.policies().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "UserAgentPolicy",
                "RequestIdPolicy",
                "AddHeadersFromContextPolicy",
                "RetryPolicy",
                "RedirectPolicy",
                "DatePolicy",
                "HttpLoggingPolicy",
            ]
        );
    }

    #[test]
    fn test_optional_steps_skipped() {
        let mut logging = LoggingOptions::default();
        logging.enabled = false;
        let options = PipelineOptions::new()
            .with_user_agent(None)
            .with_max_redirects(0)
            .with_logging(logging)
            .with_header("x-tenant", "contoso");

        let pipeline = PipelineBuilder::new()
            .with_options(&options)
            .unwrap()
            .transport(MockTransport::ok())
            .build()
            .unwrap();

        let names: Vec<&str> = pipeline.policies().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "RequestIdPolicy",
                "AddHeadersPolicy",
                "AddHeadersFromContextPolicy",
                "RetryPolicy",
                "DatePolicy",
            ]
        );
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = PipelineOptions::new().with_retry(RetryOptions::new().with_max_attempts(0));
        assert!(matches!(
            PipelineBuilder::new().with_options(&options),
            Err(PipelineError::Configuration(_))
        ));

        let options = PipelineOptions::new().with_header("bad header", "x");
        assert!(matches!(
            PipelineBuilder::new().with_options(&options),
            Err(PipelineError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            PipelineOptions::from_json(r#"{"max_redirects": "many"}"#),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_deserialize_from_json() {
        let options = PipelineOptions::from_json(
            r#"{
                "retry": {"max_attempts": 2, "mode": "fixed", "base_delay_ms": 1, "max_delay_ms": 1},
                "headers": {"x-tenant": "contoso"},
                "max_redirects": 0
            }"#,
        )
        .unwrap();
        assert_eq!(options.retry.max_attempts, 2);
        assert_eq!(options.max_redirects, 0);
        assert_eq!(options.request_id_header, CLIENT_REQUEST_ID_HEADER);
        assert!(options.logging.enabled);

        let transport = Arc::new(MockTransport::ok());
        let pipeline = PipelineBuilder::new()
            .with_options(&options)
            .unwrap()
            .transport_arc(transport.clone())
            .build()
            .unwrap();
        pipeline
            .send_sync(Request::get("https://example.com").unwrap(), Context::new())
            .unwrap();

        let recorded = transport.last_request().unwrap();
        assert_header(&recorded, "x-tenant", "contoso");
        assert!(recorded.header(crate::policies::DATE_HEADER).is_some());
        assert!(recorded.header(CLIENT_REQUEST_ID_HEADER).is_some());
        assert!(recorded.header("user-agent").unwrap().contains("azsdk-rust-"));
    }
}
