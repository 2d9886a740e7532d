//! Max-count block manager
//!
//! Bounds each configured state to a fixed number of concurrently admitted
//! workers. Waiters park on a condition variable and are woken by releases.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use super::config::{BlockManagerConfig, StateLimit};
use super::manager::{BlockManager, BlockManagerError};

#[derive(Debug, Clone, Copy)]
struct StateCount {
    current: usize,
    max: usize,
}

/// Block manager with a fixed maximum per state
///
/// Only states present in the configuration are bounded. A worker whose
/// state is unknown to the manager is always admitted and never counted.
///
/// Invariant: for every configured state `0 <= current <= max`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use workgate::block::{BlockManager, BlockManagerMaxCount, StateLimit};
///
/// let manager = Arc::new(BlockManagerMaxCount::new([StateLimit::new("imap", 1)])?);
///
/// assert!(manager.try_acquire("imap"));
/// assert!(!manager.try_acquire("imap"));
/// manager.release("imap").unwrap();
/// assert!(manager.try_acquire("imap"));
/// # Ok::<(), workgate::block::BlockManagerError>(())
/// ```
pub struct BlockManagerMaxCount {
    states: Mutex<HashMap<String, StateCount>>,
    released: Condvar,
}

impl BlockManagerMaxCount {
    /// Create a manager bounding each of the given states
    ///
    /// Limits are validated like a [`BlockManagerConfig`]: names must be
    /// non-empty and unique, and every maximum must be at least one.
    pub fn new(limits: impl IntoIterator<Item = StateLimit>) -> Result<Self, BlockManagerError> {
        Self::from_config(BlockManagerConfig {
            states: limits.into_iter().collect(),
        })
    }

    /// Create a manager that bounds nothing
    pub fn unbounded() -> Self {
        Self::with_states(HashMap::new())
    }

    /// Create a manager from a validated configuration
    pub fn from_config(config: BlockManagerConfig) -> Result<Self, BlockManagerError> {
        config.validate()?;
        let states = config
            .states
            .into_iter()
            .map(|limit| {
                (
                    limit.name,
                    StateCount {
                        current: 0,
                        max: limit.max_count,
                    },
                )
            })
            .collect();
        Ok(Self::with_states(states))
    }

    fn with_states(states: HashMap<String, StateCount>) -> Self {
        Self {
            states: Mutex::new(states),
            released: Condvar::new(),
        }
    }

    /// Configured maximum for `state`, or `None` if it is unbounded
    pub fn max_count(&self, state: &str) -> Option<usize> {
        self.states.lock().get(state).map(|count| count.max)
    }

    /// Free slots in `state`, or `None` if it is unbounded
    pub fn available(&self, state: &str) -> Option<usize> {
        self.states
            .lock()
            .get(state)
            .map(|count| count.max.saturating_sub(count.current))
    }

    /// Wait at most `timeout` for `state` to admit one unit
    ///
    /// Returns `false` if the bound elapsed without admission.
    pub fn try_acquire_for(&self, state: &str, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire(state);
            return true;
        };

        let mut states = self.states.lock();
        loop {
            if Self::admit(&mut states, state) {
                return true;
            }
            if self.released.wait_until(&mut states, deadline).timed_out() {
                // A release may have landed right at the deadline
                return Self::admit(&mut states, state);
            }
        }
    }

    fn admit(states: &mut HashMap<String, StateCount>, state: &str) -> bool {
        match states.get_mut(state) {
            Some(count) if count.current < count.max => {
                count.current += 1;
                trace!(state, current = count.current, max = count.max, "admitted");
                true
            }
            Some(_) => false,
            None => true,
        }
    }
}

impl Default for BlockManagerMaxCount {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Debug for BlockManagerMaxCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockManagerMaxCount")
            .field("states", &*self.states.lock())
            .finish()
    }
}

impl BlockManager for BlockManagerMaxCount {
    fn try_acquire(&self, state: &str) -> bool {
        Self::admit(&mut self.states.lock(), state)
    }

    fn release(&self, state: &str) -> Result<(), BlockManagerError> {
        let mut states = self.states.lock();
        let Some(count) = states.get_mut(state) else {
            return Ok(());
        };

        if count.current == 0 {
            error!(state, "release with no outstanding admissions");
            return Err(BlockManagerError::ReleaseUnderflow(state.to_string()));
        }

        count.current -= 1;
        trace!(state, current = count.current, max = count.max, "released");
        drop(states);

        // Waiters may be parked on different states, so wake them all
        self.released.notify_all();
        Ok(())
    }

    fn snapshot(&self) -> HashMap<String, usize> {
        self.states
            .lock()
            .iter()
            .map(|(name, count)| (name.clone(), count.current))
            .collect()
    }

    fn acquire(&self, state: &str) {
        let mut states = self.states.lock();
        let mut waited = false;
        while !Self::admit(&mut states, state) {
            if !waited {
                debug!(state, "state at capacity, waiting for release");
                waited = true;
            }
            self.released.wait(&mut states);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_admits_up_to_max() {
        let manager = BlockManagerMaxCount::new([StateLimit::new("a", 2)]).unwrap();

        assert!(manager.try_acquire("a"));
        assert!(manager.try_acquire("a"));
        assert!(!manager.try_acquire("a"));
        assert_eq!(manager.snapshot()["a"], 2);
        assert_eq!(manager.available("a"), Some(0));
    }

    #[test]
    fn test_denial_has_no_side_effect() {
        let manager = BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap();
        assert!(manager.try_acquire("a"));

        for _ in 0..5 {
            assert!(!manager.try_acquire("a"));
        }
        assert_eq!(manager.snapshot()["a"], 1);

        manager.release("a").unwrap();
        assert_eq!(manager.snapshot()["a"], 0);
    }

    #[test]
    fn test_release_underflow_is_reported() {
        let manager = BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap();

        assert_eq!(
            manager.release("a"),
            Err(BlockManagerError::ReleaseUnderflow("a".to_string()))
        );
        assert_eq!(manager.snapshot()["a"], 0);
    }

    #[test]
    fn test_unknown_state_is_unbounded() {
        let manager = BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap();

        for _ in 0..10 {
            assert!(manager.try_acquire("other"));
        }
        assert!(manager.release("other").is_ok());
        assert!(!manager.snapshot().contains_key("other"));
        assert_eq!(manager.max_count("other"), None);
        assert_eq!(manager.available("other"), None);
    }

    #[test]
    fn test_zero_max_is_rejected() {
        assert!(matches!(
            BlockManagerMaxCount::new([StateLimit::new("closed", 0)]),
            Err(BlockManagerError::InvalidConfig(_))
        ));

        let config = BlockManagerConfig::new()
            .with_state(StateLimit::new("open", 2))
            .with_state(StateLimit::new("closed", 0));
        assert!(BlockManagerMaxCount::from_config(config).is_err());
    }

    #[test]
    fn test_duplicate_limits_are_rejected() {
        let limits = [StateLimit::new("a", 1), StateLimit::new("a", 2)];
        assert!(BlockManagerMaxCount::new(limits).is_err());
    }

    #[test]
    fn test_states_are_independent() {
        let manager =
            BlockManagerMaxCount::new([StateLimit::new("a", 1), StateLimit::new("b", 1)]).unwrap();

        assert!(manager.try_acquire("a"));
        assert!(manager.try_acquire("b"));
        assert!(!manager.try_acquire("a"));
        assert!(!manager.try_acquire("b"));
    }

    #[test]
    fn test_from_config() {
        let config = BlockManagerConfig::new()
            .with_state(StateLimit::new("a", 3))
            .with_state(StateLimit::new("b", 1));
        let manager = BlockManagerMaxCount::from_config(config).unwrap();

        assert_eq!(manager.max_count("a"), Some(3));
        assert_eq!(manager.max_count("b"), Some(1));
        assert_eq!(manager.available("a"), Some(3));
    }

    #[test]
    fn test_from_invalid_config() {
        let config = BlockManagerConfig::new()
            .with_state(StateLimit::new("a", 1))
            .with_state(StateLimit::new("a", 1));
        assert!(BlockManagerMaxCount::from_config(config).is_err());
    }

    #[test]
    fn test_try_acquire_for_times_out() {
        let manager = BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap();
        assert!(manager.try_acquire("a"));

        let start = Instant::now();
        assert!(!manager.try_acquire_for("a", Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(manager.snapshot()["a"], 1);
    }

    #[test]
    fn test_unrepresentable_bound_admits_free_state() {
        let manager = BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap();

        assert!(manager.try_acquire_for("a", Duration::MAX));
        assert_eq!(manager.snapshot()["a"], 1);
    }

    #[test]
    fn test_unrepresentable_bound_waits_for_release() {
        let manager = Arc::new(BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap());
        assert!(manager.try_acquire("a"));

        let waiter = {
            let manager = manager.clone();
            std::thread::spawn(move || manager.try_acquire_for("a", Duration::MAX))
        };

        std::thread::sleep(Duration::from_millis(20));
        manager.release("a").unwrap();

        assert!(waiter.join().unwrap());
        assert_eq!(manager.snapshot()["a"], 1);
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let manager = Arc::new(BlockManagerMaxCount::new([StateLimit::new("a", 1)]).unwrap());
        assert!(manager.try_acquire("a"));

        let admitted = Arc::new(AtomicUsize::new(0));
        let waiter = {
            let manager = manager.clone();
            let admitted = admitted.clone();
            std::thread::spawn(move || {
                manager.acquire("a");
                admitted.store(1, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(admitted.load(Ordering::SeqCst), 0);

        manager.release("a").unwrap();
        waiter.join().unwrap();

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(manager.snapshot()["a"], 1);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_max() {
        const MAX: usize = 3;
        let manager = Arc::new(BlockManagerMaxCount::new([StateLimit::new("a", MAX)]).unwrap());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        manager.acquire("a");
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        manager.release("a").unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= MAX);
        assert_eq!(manager.snapshot()["a"], 0);
    }
}
