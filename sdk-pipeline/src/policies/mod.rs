//! Built-in policies.
//!
//! Every policy here except `BearerTokenPolicy` implements both execution
//! paths natively.

mod credential;
mod date;
mod headers;
mod logging;
mod redirect;
mod request_id;
mod rewrite;
mod user_agent;

pub use credential::{AccessToken, BearerTokenPolicy, KeyCredentialPolicy, Secret, TokenCredential};
pub use date::{Clock, DateFormat, DatePolicy, DATE_HEADER};
pub use headers::{AddHeadersFromContextPolicy, AddHeadersPolicy};
pub use logging::{HttpLoggingPolicy, LogLevel, LoggingOptions};
pub use redirect::{RedirectPolicy, DEFAULT_MAX_REDIRECTS};
pub use request_id::{RequestIdPolicy, CLIENT_REQUEST_ID_HEADER};
pub use rewrite::{HostPolicy, ProtocolPolicy, RewriteMode};
pub use user_agent::{UserAgentOptions, UserAgentPolicy};
