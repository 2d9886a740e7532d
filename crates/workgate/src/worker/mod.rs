//! Worker execution
//!
//! This module provides:
//! - [`Worker`] - Caller-implemented unit of work
//! - [`WorkerWrapper`] - Runs one worker under admission control
//! - [`WorkerFuture`] - Blocking handle over the worker's outcome
//! - [`WorkerStats`] - Cancel, error and success counters
//!
//! # Outcome Channels
//!
//! | Channel          | Trigger                          | Future                 | Counter              |
//! |------------------|----------------------------------|------------------------|----------------------|
//! | Dispatch failure | `Worker::execute` returns `Err`  | `FutureError::Execution` | `WorkerErrorCount`   |
//! | Business failure | `Worker::has_errors` is true     | `FutureError::Execution` | `WorkerErrorCount`   |
//! | Cancellation     | `cancel` before `execute`        | `FutureError::Cancelled` | `WorkerCancelCount`  |
//! | Success          | otherwise                        | `Ok(data)`             | `WorkerSuccessCount` |

mod definition;
mod future;
mod stats;
mod wrapper;

pub use definition::{Worker, WorkerCause, WorkerExecutionError};
pub use future::{FutureError, WorkerFuture};
pub use stats::{StatsSnapshot, WorkerStats};
pub use wrapper::{WorkerWrapper, WrapperState};
