//! Testing utilities for pipelines.
//!
//! This module provides:
//! - A scriptable mock transport that records what reaches it
//! - Policies that count or record their invocations
//! - Assertions for requests seen by the transport

mod assertions;
mod mocks;

pub use assertions::{assert_header, assert_status, assert_trail};
pub use mocks::{
    CountingPolicy, MockOutcome, MockTransport, RecordedRequest, RecordingPolicy, SharedLog,
    TRAIL_HEADER,
};
