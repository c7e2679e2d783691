//! Outgoing requests.

use super::{header_pair, Body};
use crate::errors::{PipelineError, Result};
use http::{HeaderMap, Method, Uri};

/// An outgoing HTTP request.
///
/// Policies receive the request by value, adjust it, and hand it on to the
/// next cursor. The URI may be relative (origin-form) until a host policy
/// fills in the scheme and authority.
#[derive(Debug)]
pub struct Request {
    /// The request method.
    pub method: Method,
    /// The target URI.
    pub uri: Uri,
    /// The request headers.
    pub headers: HeaderMap,
    /// The request payload.
    pub body: Body,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// Creates a request by parsing a URI string.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URI does not parse.
    pub fn parse(method: Method, uri: &str) -> Result<Self> {
        let uri = Uri::try_from(uri)
            .map_err(|e| PipelineError::Configuration(format!("invalid uri '{uri}': {e}")))?;
        Ok(Self::new(method, uri))
    }

    /// Creates a GET request.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URI does not parse.
    pub fn get(uri: &str) -> Result<Self> {
        Self::parse(Method::GET, uri)
    }

    /// Creates a POST request.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URI does not parse.
    pub fn post(uri: &str) -> Result<Self> {
        Self::parse(Method::POST, uri)
    }

    /// Sets a header, replacing existing values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if the name or value is not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a header in place, replacing existing values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if the name or value is not valid HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Returns a header value as text, if present and visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Copies the request for another attempt.
    ///
    /// Returns `None` when the body is a single-consumption stream.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        Some(Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
        })
    }
}
