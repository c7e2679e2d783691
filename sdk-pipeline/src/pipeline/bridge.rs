//! Bridging between the asynchronous and synchronous execution modes.

use super::NextSync;
use crate::errors::{PipelineError, Result};
use crate::http::{Request, Response};
use crate::policy::SyncPolicy;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

static BRIDGE_RUNTIME: OnceLock<std::result::Result<Runtime, String>> = OnceLock::new();

/// Returns the private runtime used when no multi-thread runtime is at hand.
fn bridge_runtime() -> Result<&'static Runtime> {
    let runtime = BRIDGE_RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pipeline-bridge")
            .enable_all()
            .build()
            .map_err(|e| e.to_string())
    });
    runtime
        .as_ref()
        .map_err(|e| PipelineError::Bridge(format!("failed to start bridge runtime: {e}")))
}

/// Drives a future to completion from synchronous code.
///
/// On a multi-thread runtime worker the future runs in place via
/// `block_in_place`. Inside a current-thread runtime it runs on a helper
/// thread so the caller's scheduler is never re-entered. Outside any runtime
/// the private bridge runtime drives it.
pub(crate) fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => {
            let runtime = bridge_runtime()?;
            let output = std::thread::scope(|scope| {
                scope
                    .spawn(|| runtime.block_on(future))
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            });
            Ok(output)
        }
        Err(_) => Ok(bridge_runtime()?.block_on(future)),
    }
}

/// Runs a synchronous policy on the blocking pool.
pub(crate) async fn offload(
    policy: Arc<dyn SyncPolicy>,
    request: Request,
    next: NextSync,
) -> Result<Response> {
    let handle = Handle::try_current().map_err(|_| {
        PipelineError::Bridge(format!(
            "policy '{}' is synchronous and needs a tokio runtime to be offloaded",
            policy.name()
        ))
    })?;

    match handle
        .spawn_blocking(move || policy.process_sync(request, next))
        .await
    {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(PipelineError::Bridge(format!("blocking policy task failed: {e}"))),
    }
}
