//! Pipeline assembly and execution.
//!
//! This module provides:
//! - `PipelineBuilder` for declaring the policy chain and transport
//! - `Pipeline` with the `send` and `send_sync` entry points
//! - `CallState` and the `Next`/`NextSync` cursors that walk the chain
//! - The blocking/offloading bridge between the two execution modes

pub(crate) mod bridge;
mod builder;
mod call_state;
mod http_pipeline;
mod next;

pub use builder::PipelineBuilder;
pub use call_state::{CallState, Step};
pub use http_pipeline::Pipeline;
pub use next::{Next, NextSync};

pub(crate) use http_pipeline::Chain;
