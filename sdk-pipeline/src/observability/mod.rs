//! Tracing subscriber setup.
//!
//! The crate itself only emits `tracing` events; applications decide where
//! they go. `init_tracing` is a convenience for binaries and tests that have
//! no subscriber of their own.

use crate::errors::{PipelineError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Returns `false` if a global
/// subscriber was already installed, in which case nothing changes.
///
/// # Errors
///
/// Returns `PipelineError::Configuration` if `filter` is not a valid filter
/// directive.
pub fn init_tracing(filter: &str, json: bool) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| PipelineError::Configuration(format!("invalid log filter '{filter}': {e}")))?,
    };

    let layer = if json {
        tracing_subscriber::fmt::layer().json().with_target(true).with_filter(filter).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).with_filter(filter).boxed()
    };

    Ok(tracing_subscriber::registry().with(layer).try_init().is_ok())
}
