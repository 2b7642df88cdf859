//! Runtime helper for hosting an async loop on a dedicated thread.

use std::future::Future;
use std::thread;
use tokio::runtime::Builder;
use tracing::{debug, error};

use crate::error::RegistryListenerError;
use crate::observability::events;

const COMPONENT: &str = "worker_runtime";

/// Spawns `thread_name` running `run_loop` to completion on its own current-thread runtime.
///
/// The runtime is built before the thread starts so that failures surface to the caller.
pub(crate) fn spawn_runtime_thread<F, Fut>(
    thread_name: &str,
    run_loop: F,
) -> Result<thread::JoinHandle<()>, RegistryListenerError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()>,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            error!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                thread_name,
                err = %err,
                "unable to build runtime"
            );
            RegistryListenerError::Runtime(err)
        })?;

    let handle = thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || runtime.block_on(run_loop()))
        .map_err(|err| {
            error!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                thread_name,
                err = %err,
                "unable to spawn runtime thread"
            );
            RegistryListenerError::Runtime(err)
        })?;

    debug!(
        event = events::RUNTIME_SPAWN_OK,
        component = COMPONENT,
        thread_name,
        "runtime thread started"
    );
    Ok(handle)
}
