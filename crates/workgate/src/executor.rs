//! Submission of wrappers to tokio's blocking pool
//!
//! Wrappers block while waiting for admission, so they must never run on
//! an async worker thread. These helpers hand them to the runtime's
//! blocking pool instead.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::worker::{WorkerExecutionError, WorkerWrapper};

/// Run `wrapper` on the current runtime's blocking pool
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn spawn_blocking<T>(
    wrapper: Arc<WorkerWrapper<T>>,
) -> JoinHandle<Result<(), WorkerExecutionError>>
where
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || wrapper.execute())
}

/// Run `wrapper` on the blocking pool of the runtime behind `handle`
pub fn spawn_blocking_on<T>(
    handle: &Handle,
    wrapper: Arc<WorkerWrapper<T>>,
) -> JoinHandle<Result<(), WorkerExecutionError>>
where
    T: Send + 'static,
{
    handle.spawn_blocking(move || wrapper.execute())
}
