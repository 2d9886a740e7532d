//! Worker trait definition

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::block::BlockManager;

/// Error raised in the act of running a worker
///
/// This is the dispatch-failure channel: the worker could not run at all.
/// Business-level failures are reported through [`Worker::has_errors`] and
/// [`Worker::cause`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct WorkerExecutionError {
    /// Error message
    pub message: String,
}

impl WorkerExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for WorkerExecutionError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Business-level cause of a failed worker
///
/// Rendered as `"<kind>: <message>"`, which becomes the failure message
/// observed through the worker's future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCause {
    /// Kind of failure, typically an error type name
    pub kind: String,

    /// Human readable detail
    pub message: String,
}

impl WorkerCause {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture an error, using its type name as the kind
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }
}

impl std::fmt::Display for WorkerCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A unit of caller-supplied work
///
/// Workers are handed to a [`WorkerWrapper`](super::WorkerWrapper), which
/// runs [`execute`](Worker::execute) at most once, classifies the outcome,
/// and always finishes with exactly one call to [`cleanup`](Worker::cleanup).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use workgate::block::{BlockManager, BlockManagerMaxCount};
/// use workgate::worker::{Worker, WorkerCause, WorkerExecutionError};
///
/// struct FetchMail {
///     manager: Arc<BlockManagerMaxCount>,
///     fetched: Option<usize>,
/// }
///
/// impl Worker<usize> for FetchMail {
///     fn execute(&mut self) -> Result<bool, WorkerExecutionError> {
///         self.fetched = Some(3);
///         Ok(true)
///     }
///
///     fn cause(&self) -> Option<WorkerCause> {
///         None
///     }
///
///     fn has_errors(&self) -> bool {
///         false
///     }
///
///     fn data(&mut self) -> usize {
///         self.fetched.unwrap_or_default()
///     }
///
///     fn block_manager(&self) -> Arc<dyn BlockManager> {
///         self.manager.clone()
///     }
///
///     fn block_state(&self) -> Option<String> {
///         Some("imap".to_string())
///     }
///
///     fn cleanup(&mut self) {
///         self.fetched = None;
///     }
/// }
/// ```
pub trait Worker<T>: Send {
    /// Run the work
    ///
    /// The returned flag reports whether the worker considers itself done.
    /// An `Err` means the work could not be run at all.
    fn execute(&mut self) -> Result<bool, WorkerExecutionError>;

    /// Cause of a business failure, if any
    fn cause(&self) -> Option<WorkerCause>;

    /// Whether the completed work ended in a business failure
    fn has_errors(&self) -> bool;

    /// Result of successful work
    fn data(&mut self) -> T;

    /// Block manager gating this worker
    fn block_manager(&self) -> Arc<dyn BlockManager>;

    /// State this worker occupies while running
    ///
    /// `None` (the default) runs without admission control.
    fn block_state(&self) -> Option<String> {
        None
    }

    /// Release any resources held by the worker
    fn cleanup(&mut self);
}
