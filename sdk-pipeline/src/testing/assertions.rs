//! Test assertions for pipeline calls.

use super::{RecordedRequest, TRAIL_HEADER};
use crate::http::Response;
use http::StatusCode;

/// Asserts that the response has the expected status.
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status, expected,
        "Expected status {}, got {} (body: {})",
        expected,
        response.status,
        response.text()
    );
}

/// Asserts that the recorded request carries `name: expected`.
pub fn assert_header(request: &RecordedRequest, name: &str, expected: &str) {
    let actual = request.header(name);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be {:?}, got {:?}",
        name,
        expected,
        actual
    );
}

/// Asserts that recording policies touched the request in `expected` order.
pub fn assert_trail(request: &RecordedRequest, expected: &[&str]) {
    let trail: Vec<&str> = request
        .header(TRAIL_HEADER)
        .map(|t| t.split(',').collect())
        .unwrap_or_default();
    assert_eq!(
        trail, expected,
        "Expected policy trail {:?}, got {:?}",
        expected, trail
    );
}
