//! Worker lifecycle orchestration
//!
//! A [`WorkerWrapper`] drives one worker from `New` to exactly one terminal
//! state, gating it on its block manager and publishing the outcome to a
//! [`WorkerFuture`] and [`WorkerStats`].
//!
//! # State Machine
//!
//! ```text
//!            cancel()
//! ┌─────┐ ─────────────────────────────────► ┌───────────┐
//! │ New │                                    │ Cancelled │
//! └─────┘ ──────┐                            └───────────┘
//!               │ execute()
//!               ▼
//!         ┌─────────┐  has_errors / Err  ┌────────┐
//!         │ Running │ ─────────────────► │ Failed │
//!         └─────────┘                    └────────┘
//!               │
//!               └──────────────────────► ┌───────────┐
//!                                        │ Succeeded │
//!                                        └───────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::definition::{Worker, WorkerExecutionError};
use super::future::WorkerFuture;
use super::stats::WorkerStats;
use crate::block::AdmissionPermit;

/// Lifecycle state of a [`WorkerWrapper`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WrapperState {
    /// Created, not yet running or cancelled
    New = 0,
    /// Worker is executing
    Running = 1,
    /// Cancelled before it ran
    Cancelled = 2,
    /// Worker finished without errors
    Succeeded = 3,
    /// Worker failed to run or reported errors
    Failed = 4,
}

impl WrapperState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::New,
            1 => Self::Running,
            2 => Self::Cancelled,
            3 => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for WrapperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Runs one worker under admission control and records its outcome
///
/// The wrapper creates no threads. Share it via `Arc` and call
/// [`execute`](Self::execute) from whatever executor should run the work;
/// [`cancel`](Self::cancel) may be called concurrently from anywhere.
///
/// # Example
///
/// ```ignore
/// use workgate::worker::WorkerWrapper;
///
/// let wrapper = Arc::new(WorkerWrapper::new(FetchMail::new(manager)));
/// let future = wrapper.future();
///
/// executor.spawn({
///     let wrapper = wrapper.clone();
///     move || wrapper.execute()
/// });
///
/// let messages = future.get()?;
/// ```
pub struct WorkerWrapper<T> {
    id: Uuid,
    state: AtomicU8,
    worker: Mutex<Box<dyn Worker<T>>>,
    cleaned_up: AtomicBool,
    future: WorkerFuture<T>,
    stats: Arc<WorkerStats>,
}

impl<T> WorkerWrapper<T> {
    /// Wrap a worker with fresh stats
    pub fn new(worker: impl Worker<T> + 'static) -> Self {
        Self::with_stats(worker, Arc::new(WorkerStats::new()))
    }

    /// Wrap a worker, recording outcomes into shared stats
    pub fn with_stats(worker: impl Worker<T> + 'static, stats: Arc<WorkerStats>) -> Self {
        Self::from_boxed(Box::new(worker), stats)
    }

    /// Wrap an already boxed worker
    pub fn from_boxed(worker: Box<dyn Worker<T>>, stats: Arc<WorkerStats>) -> Self {
        Self {
            id: Uuid::now_v7(),
            state: AtomicU8::new(WrapperState::New as u8),
            worker: Mutex::new(worker),
            cleaned_up: AtomicBool::new(false),
            future: WorkerFuture::new(),
            stats,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WrapperState {
        WrapperState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Handle over this wrapper's outcome; every call returns the same future
    pub fn future(&self) -> WorkerFuture<T> {
        self.future.clone()
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Cancel the worker if it has not started
    ///
    /// Returns `true` only when this call moved the wrapper from `New` to
    /// `Cancelled`. Running or finished workers are left alone;
    /// `may_interrupt` never preempts work already in progress.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        match self.transition(WrapperState::New, WrapperState::Cancelled) {
            Ok(()) => {
                self.stats.record_cancel();
                self.future.cancel();
                debug!(wrapper_id = %self.id, may_interrupt, "worker cancelled");
                true
            }
            Err(current) => {
                debug!(
                    wrapper_id = %self.id,
                    may_interrupt,
                    state = %current,
                    "cancel ignored, worker already past new"
                );
                false
            }
        }
    }

    fn transition(&self, from: WrapperState, to: WrapperState) -> Result<(), WrapperState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(WrapperState::from_u8)
    }

    fn finish(&self, to: WrapperState) {
        self.state.store(to as u8, Ordering::Release);
    }

    /// Run the worker to a terminal state
    ///
    /// Blocks while the worker's state is at capacity on its block manager.
    /// A dispatch failure from the worker is recorded on the future and then
    /// returned. The worker's `cleanup` runs exactly once across every path,
    /// including a panic inside the worker. Calling this again after the
    /// wrapper is finished does nothing.
    #[instrument(skip(self), fields(wrapper_id = %self.id))]
    pub fn execute(&self) -> Result<(), WorkerExecutionError> {
        let worker = self.worker.lock();
        if self.cleaned_up.load(Ordering::Acquire) {
            debug!(state = %self.state(), "worker already finished");
            return Ok(());
        }
        let mut run = Run {
            wrapper: self,
            worker,
        };

        if let Err(current) = self.transition(WrapperState::New, WrapperState::Running) {
            debug!(state = %current, "skipping worker execution");
            return Ok(());
        }

        let permit = run.worker.block_state().map(|state| {
            let manager = run.worker.block_manager();
            AdmissionPermit::acquire(manager, state)
        });

        let result = run.worker.execute();

        if let Some(permit) = permit {
            let state = permit.state().to_string();
            if let Err(e) = permit.release() {
                warn!(state = %state, error = %e, "admission release failed");
            }
        }

        match result {
            Err(e) => {
                warn!(error = %e, "worker execution failed");
                self.finish(WrapperState::Failed);
                self.stats.record_error();
                self.future.fail(format!("WorkerExecutionError: {}", e));
                Err(e)
            }
            Ok(done) if run.worker.has_errors() => {
                let message = run
                    .worker
                    .cause()
                    .map(|cause| cause.to_string())
                    .unwrap_or_else(|| "WorkerError: worker reported errors".to_string());
                debug!(done, cause = %message, "worker finished with errors");
                self.finish(WrapperState::Failed);
                self.stats.record_error();
                self.future.fail(message);
                Ok(())
            }
            Ok(done) => {
                let data = run.worker.data();
                debug!(done, "worker succeeded");
                self.finish(WrapperState::Succeeded);
                self.stats.record_success();
                self.future.succeed(data);
                Ok(())
            }
        }
    }
}

impl<T> Drop for WorkerWrapper<T> {
    fn drop(&mut self) {
        if !self.cleaned_up.swap(true, Ordering::AcqRel) {
            debug!(
                wrapper_id = %self.id,
                state = %self.state(),
                "cleaning up worker that never executed"
            );
            self.worker.get_mut().cleanup();
        }
    }
}

impl<T> std::fmt::Debug for WorkerWrapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerWrapper")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Holds the worker for one `execute` call and cleans it up on every exit
struct Run<'a, T> {
    wrapper: &'a WorkerWrapper<T>,
    worker: MutexGuard<'a, Box<dyn Worker<T>>>,
}

impl<T> Drop for Run<'_, T> {
    fn drop(&mut self) {
        let wrapper = self.wrapper;
        if std::thread::panicking()
            && wrapper
                .transition(WrapperState::Running, WrapperState::Failed)
                .is_ok()
        {
            warn!(wrapper_id = %wrapper.id, "worker panicked");
            wrapper.stats.record_error();
            wrapper.future.fail("WorkerPanic: worker panicked during execution");
        }

        if !wrapper.cleaned_up.swap(true, Ordering::AcqRel) {
            self.worker.cleanup();
        }
    }
}
