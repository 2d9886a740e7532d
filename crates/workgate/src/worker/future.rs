//! Blocking handle over a worker's outcome

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Errors observed when reading a [`WorkerFuture`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FutureError {
    /// The worker was cancelled before it ran
    #[error("worker was cancelled")]
    Cancelled,

    /// The worker failed; carries the formatted cause
    #[error("{0}")]
    Execution(String),

    /// The wait bound elapsed before the worker finished
    #[error("timed out after {0:?} waiting for worker outcome")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
enum Outcome<T> {
    Cancelled,
    Failed(String),
    Succeeded(T),
}

#[derive(Debug)]
struct Shared<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    resolved: Condvar,
}

/// Future over a single worker outcome
///
/// Clones share the same underlying state. The outcome is set exactly once;
/// later resolution attempts are ignored. Reads block the calling thread.
#[derive(Debug)]
pub struct WorkerFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkerFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> WorkerFuture<T> {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: Mutex::new(None),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Whether both handles refer to the same future
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Whether the outcome is known
    pub fn is_done(&self) -> bool {
        self.shared.outcome.lock().is_some()
    }

    /// Whether the outcome is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.shared.outcome.lock(), Some(Outcome::Cancelled))
    }

    pub(crate) fn cancel(&self) -> bool {
        self.resolve(Outcome::Cancelled)
    }

    pub(crate) fn fail(&self, message: impl Into<String>) -> bool {
        self.resolve(Outcome::Failed(message.into()))
    }

    pub(crate) fn succeed(&self, value: T) -> bool {
        self.resolve(Outcome::Succeeded(value))
    }

    fn resolve(&self, outcome: Outcome<T>) -> bool {
        let mut slot = self.shared.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        drop(slot);
        self.shared.resolved.notify_all();
        true
    }
}

impl<T: Clone> WorkerFuture<T> {
    /// Block until the worker reaches a terminal state
    pub fn get(&self) -> Result<T, FutureError> {
        let mut slot = self.shared.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Self::read(outcome);
            }
            self.shared.resolved.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`
    ///
    /// Timing out leaves the worker untouched; it may still complete later.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, FutureError> {
        let mut slot = self.shared.outcome.lock();
        if let Some(outcome) = slot.as_ref() {
            return Self::read(outcome);
        }

        // A bound past the clock's range is no bound at all
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            drop(slot);
            return self.get();
        };

        loop {
            if self
                .shared
                .resolved
                .wait_until(&mut slot, deadline)
                .timed_out()
            {
                return match slot.as_ref() {
                    Some(outcome) => Self::read(outcome),
                    None => Err(FutureError::Timeout(timeout)),
                };
            }
            if let Some(outcome) = slot.as_ref() {
                return Self::read(outcome);
            }
        }
    }

    /// Non-blocking read; `None` while unresolved
    pub fn try_get(&self) -> Option<Result<T, FutureError>> {
        self.shared.outcome.lock().as_ref().map(Self::read)
    }

    fn read(outcome: &Outcome<T>) -> Result<T, FutureError> {
        match outcome {
            Outcome::Cancelled => Err(FutureError::Cancelled),
            Outcome::Failed(message) => Err(FutureError::Execution(message.clone())),
            Outcome::Succeeded(value) => Ok(value.clone()),
        }
    }
}
