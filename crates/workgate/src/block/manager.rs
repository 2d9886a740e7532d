//! Block manager trait and admission permits

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::backoff::AdmissionBackoff;

/// Block manager errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockManagerError {
    /// A release was attempted on a state with no outstanding admissions
    #[error("release of state '{0}' with no outstanding admissions")]
    ReleaseUnderflow(String),

    /// Invalid configuration
    #[error("invalid block manager configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("failed to parse block manager configuration: {0}")]
    Parse(String),
}

/// Admission control over named states
///
/// A block manager bounds how many workers may be outstanding in a state
/// at once. One instance is typically shared (via `Arc`) by every worker
/// that competes for the same resources.
///
/// `try_acquire` must be a single atomic check-and-increment: a denial is
/// only ever reported when the state really is at capacity.
pub trait BlockManager: Send + Sync {
    /// Admit one unit into `state` if it has capacity
    fn try_acquire(&self, state: &str) -> bool;

    /// Return one unit of `state`
    ///
    /// Releasing a state with no outstanding admissions is a programming
    /// error and is reported as [`BlockManagerError::ReleaseUnderflow`].
    fn release(&self, state: &str) -> Result<(), BlockManagerError>;

    /// Current outstanding count for every tracked state
    fn snapshot(&self) -> HashMap<String, usize>;

    /// Backoff used by the default [`BlockManager::acquire`]
    fn backoff(&self) -> AdmissionBackoff {
        AdmissionBackoff::default()
    }

    /// Block the calling thread until `state` admits one unit
    ///
    /// The default polls `try_acquire`, sleeping per [`BlockManager::backoff`]
    /// between denials. A schedule that fails
    /// [`AdmissionBackoff::validate`] is replaced by the default one.
    /// Implementations that can park waiters until a release should
    /// override this.
    fn acquire(&self, state: &str) {
        let mut backoff = self.backoff();
        if let Err(e) = backoff.validate() {
            warn!(state, error = %e, "invalid admission backoff, using default");
            backoff = AdmissionBackoff::default();
        }
        let mut attempt = 0u32;
        while !self.try_acquire(state) {
            attempt = attempt.saturating_add(1);
            let delay = backoff.delay_for_attempt(attempt);
            debug!(state, attempt, ?delay, "admission denied, backing off");
            std::thread::sleep(delay);
        }
    }
}

/// RAII guard for one admitted unit. Releases the state when dropped.
pub struct AdmissionPermit {
    manager: Arc<dyn BlockManager>,
    state: String,
    released: bool,
}

impl AdmissionPermit {
    /// Block until `state` admits one unit on `manager`
    pub fn acquire(manager: Arc<dyn BlockManager>, state: impl Into<String>) -> Self {
        let state = state.into();
        manager.acquire(&state);
        Self {
            manager,
            state,
            released: false,
        }
    }

    /// Admit one unit without blocking, or `None` if `state` is at capacity
    pub fn try_acquire(manager: Arc<dyn BlockManager>, state: impl Into<String>) -> Option<Self> {
        let state = state.into();
        if !manager.try_acquire(&state) {
            return None;
        }
        Some(Self {
            manager,
            state,
            released: false,
        })
    }

    /// The state this permit was admitted into
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Release now and surface any accounting error
    pub fn release(mut self) -> Result<(), BlockManagerError> {
        self.released = true;
        self.manager.release(&self.state)
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("state", &self.state)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.manager.release(&self.state) {
            error!(state = %self.state, error = %e, "failed to release admission permit");
        }
    }
}
