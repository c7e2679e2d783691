//! # SDK Pipeline
//!
//! The HTTP pipeline core of a cloud service SDK.
//!
//! Every request a client sends flows through an ordered chain of policies
//! terminated by a transport. The same immutable chain serves both execution
//! models:
//!
//! - **Asynchronous**: `Pipeline::send` returns a future; backoff and I/O
//!   suspend without holding a thread
//! - **Blocking**: `Pipeline::send_sync` runs every policy and the transport
//!   on the calling thread
//! - **Bridging**: a policy that implements only one path is driven through
//!   the other automatically
//! - **Retry**: bounded retries that re-run the rest of the chain per attempt
//! - **Context propagation**: a persistent per-call key-value bag read by
//!   policies by convention
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdk_pipeline::prelude::*;
//!
//! let pipeline = Pipeline::builder()
//!     .with_options(&PipelineOptions::default())?
//!     .transport(my_transport)
//!     .build()?;
//!
//! let request = Request::get("https://account.example.net/items")?;
//! let response = pipeline.send(request, Context::new()).await?;
//! let response = pipeline.send_sync(Request::get("https://account.example.net/items")?, Context::new())?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod policies;
pub mod policy;
pub mod retry;
pub mod testing;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineOptions;
    pub use crate::context::{CancellationToken, Context};
    pub use crate::errors::{PipelineError, Result, TransportErrorKind};
    pub use crate::http::{Body, Request, Response};
    pub use crate::pipeline::{Next, NextSync, Pipeline, PipelineBuilder};
    pub use crate::policies::{
        AddHeadersFromContextPolicy, AddHeadersPolicy, BearerTokenPolicy, DatePolicy,
        HttpLoggingPolicy, KeyCredentialPolicy, RedirectPolicy, RequestIdPolicy, Secret,
        TokenCredential, UserAgentPolicy,
    };
    pub use crate::policy::{AsyncPolicy, PipelinePolicy, Policy, SyncPolicy};
    pub use crate::retry::{ExponentialBackoff, FixedDelay, RetryOptions, RetryPolicy};
    pub use crate::transport::HttpClient;
}
