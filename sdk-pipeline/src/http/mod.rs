//! Request and response types that flow through the pipeline.

mod body;
mod request;
mod response;

pub use body::Body;
pub use request::Request;
pub use response::Response;

pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::errors::{PipelineError, Result};

/// Parses a header name/value pair, mapping failures to `InvalidHeader`.
pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| PipelineError::InvalidHeader(format!("{name}: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| PipelineError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((name, value))
}
