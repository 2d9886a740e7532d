//! # Gated Worker Execution
//!
//! An in-process primitive that runs caller-supplied workers under
//! admission control, exposes each outcome through a blocking future, and
//! counts cancellations, errors and successes.
//!
//! ## Features
//!
//! - **Admission control**: Bound how many workers occupy a named state at once
//! - **Race-free cancellation**: `cancel` and `execute` may race; exactly one wins
//! - **Exactly-once cleanup**: Every worker is cleaned up once, on every path
//! - **Outcome counters**: `WorkerCancelCount=..;WorkerErrorCount=..;WorkerSuccessCount=..`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Caller / external executor                   │
//! │        (tokio blocking pool, thread pool, plain thread)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ execute() / cancel()
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkerWrapper                           │
//! │  (state machine, outcome classification, cleanup guard)     │
//! └─────────────────────────────────────────────────────────────┘
//!          │ acquire/release           │ resolve        │ record
//!          ▼                           ▼                ▼
//! ┌──────────────────┐     ┌────────────────┐  ┌───────────────┐
//! │  BlockManager    │     │  WorkerFuture  │  │  WorkerStats  │
//! └──────────────────┘     └────────────────┘  └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use workgate::prelude::*;
//!
//! let manager = Arc::new(BlockManagerMaxCount::new([StateLimit::new("imap", 4)])?);
//! let wrapper = Arc::new(WorkerWrapper::new(FetchMail::new(manager.clone())));
//!
//! let handle = workgate::executor::spawn_blocking(wrapper.clone());
//! handle.await??;
//!
//! match wrapper.future().get() {
//!     Ok(messages) => println!("fetched {messages}"),
//!     Err(FutureError::Cancelled) => println!("cancelled"),
//!     Err(e) => println!("failed: {e}"),
//! }
//! println!("{}", wrapper.stats().stats_as_string());
//! ```

pub mod block;
pub mod executor;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::block::{
        AdmissionBackoff, AdmissionPermit, BlockManager, BlockManagerConfig, BlockManagerError,
        BlockManagerMaxCount, StateLimit,
    };
    pub use crate::worker::{
        FutureError, StatsSnapshot, Worker, WorkerCause, WorkerExecutionError, WorkerFuture,
        WorkerStats, WorkerWrapper, WrapperState,
    };
}

// Re-export key types at crate root
pub use block::{
    BlockManager, BlockManagerConfig, BlockManagerError, BlockManagerMaxCount, StateLimit,
};
pub use worker::{
    FutureError, Worker, WorkerCause, WorkerExecutionError, WorkerFuture, WorkerStats,
    WorkerWrapper, WrapperState,
};
