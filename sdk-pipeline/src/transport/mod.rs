//! The terminal transport capability.
//!
//! The transport performs the actual network I/O and is invoked only after
//! the last policy delegates. Failures it returns travel back up the chain
//! like any policy failure.

#[cfg(feature = "reqwest")]
mod reqwest_client;

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;

use crate::context::Context;
use crate::errors::Result;
use crate::http::{Request, Response};
use crate::pipeline::bridge;
use async_trait::async_trait;
use std::fmt::Debug;

/// An HTTP client that terminates a pipeline.
#[async_trait]
pub trait HttpClient: Send + Sync + Debug {
    /// Sends the request and waits for the response.
    async fn send(&self, request: Request, context: &Context) -> Result<Response>;

    /// Sends the request on the calling thread.
    ///
    /// The default blocks on `send`. Clients with a native blocking path
    /// should override this and `has_native_sync`.
    fn send_sync(&self, request: Request, context: &Context) -> Result<Response> {
        bridge::block_on(self.send(request, context))?
    }

    /// Returns true if `send_sync` is implemented natively.
    fn has_native_sync(&self) -> bool {
        false
    }
}
