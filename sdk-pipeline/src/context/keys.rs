//! Well-known context keys.
//!
//! The key space is open: any crate may attach its own entries. These are the
//! keys the built-in policies look for.

/// `http::HeaderMap` merged into the request by `AddHeadersFromContextPolicy`.
pub const HEADERS: &str = "pipeline.headers";

/// `CancellationToken` observed by `Pipeline::send` and the retry policy.
pub const CANCELLATION: &str = "pipeline.cancellation";

/// `std::time::Duration` deadline applied to an asynchronous call.
pub const TIMEOUT: &str = "pipeline.timeout";

/// `String` client request id used by `RequestIdPolicy` instead of a fresh UUID.
pub const CLIENT_REQUEST_ID: &str = "pipeline.client_request_id";

/// `String` appended to the user agent by `UserAgentPolicy`.
pub const USER_AGENT_SUFFIX: &str = "pipeline.user_agent_suffix";
