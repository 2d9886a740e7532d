//! Admission control for workers
//!
//! This module provides:
//! - [`BlockManager`] - Admission control over named states
//! - [`BlockManagerMaxCount`] - Fixed maximum per state, release-woken waiters
//! - [`AdmissionPermit`] - RAII guard returning a slot when dropped
//! - [`BlockManagerConfig`] - Serializable state limits
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ WorkerWrapper│  │ WorkerWrapper│  │ WorkerWrapper│
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        │ acquire/release │                 │
//!        ▼                 ▼                 ▼
//! ┌─────────────────────────────────────────────────────┐
//! │           Arc<dyn BlockManager> (shared)             │
//! │   "imap" 2/4      "smtp" 1/1      "http" 0/8         │
//! └─────────────────────────────────────────────────────┘
//! ```

mod backoff;
mod config;
mod manager;
mod max_count;

pub use backoff::AdmissionBackoff;
pub use config::{BlockManagerConfig, StateLimit};
pub use manager::{AdmissionPermit, BlockManager, BlockManagerError};
pub use max_count::BlockManagerMaxCount;
