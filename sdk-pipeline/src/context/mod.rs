//! Per-call context propagation.
//!
//! This module provides:
//! - `Context`, a persistent linked key-value bag attached to every call
//! - Well-known keys read by the built-in policies
//! - `CancellationToken` for cooperative cancellation of in-flight calls

mod bag;
mod cancellation;
pub mod keys;

pub use bag::Context;
pub use cancellation::CancellationToken;
