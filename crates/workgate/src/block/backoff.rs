//! Backoff between admission attempts

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::manager::BlockManagerError;

/// Delay schedule used while a caller waits for an admission slot
///
/// Block managers that cannot park waiters on a condition variable fall
/// back to polling `try_acquire` with this schedule.
///
/// # Example
///
/// ```
/// use workgate::block::AdmissionBackoff;
/// use std::time::Duration;
///
/// let backoff = AdmissionBackoff::exponential()
///     .with_initial_interval(Duration::from_millis(1))
///     .with_max_interval(Duration::from_millis(50));
///
/// assert!(backoff.delay_for_attempt(1) <= Duration::from_millis(2));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmissionBackoff {
    /// Delay after the first denied attempt
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,

    /// Upper bound on any single delay
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Growth factor between consecutive delays
    pub backoff_coefficient: f64,

    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for AdmissionBackoff {
    fn default() -> Self {
        Self::exponential()
    }
}

impl AdmissionBackoff {
    /// Exponential backoff: 1ms doubling up to 100ms, 10% jitter
    pub fn exponential() -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(100),
            backoff_coefficient: 2.0,
            jitter: 0.1,
        }
    }

    /// Constant delay between attempts
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            backoff_coefficient: 1.0,
            jitter: 0.0,
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient.max(1.0);
        self
    }

    /// Set the jitter factor (0.0-1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay to sleep after the given denied attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = base.min(self.max_interval.as_secs_f64());

        let jitter_range = capped * self.jitter;
        let jittered = if jitter_range > 0.0 && jitter_range.is_finite() {
            let offset = rand::thread_rng().gen_range(-jitter_range..jitter_range);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        // Deserialized fields skip the builders' clamping
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(self.max_interval)
    }

    /// Validate a schedule that did not come through the builders
    pub fn validate(&self) -> Result<(), BlockManagerError> {
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(BlockManagerError::InvalidConfig(format!(
                "backoff_coefficient must be finite and >= 1.0, got {}",
                self.backoff_coefficient
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(BlockManagerError::InvalidConfig(format!(
                "jitter must be within 0.0-1.0, got {}",
                self.jitter
            )));
        }
        if self.initial_interval > self.max_interval {
            return Err(BlockManagerError::InvalidConfig(
                "initial_interval must not exceed max_interval".into(),
            ));
        }
        Ok(())
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let backoff = AdmissionBackoff::exponential().with_jitter(0.0);

        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(4));
    }

    #[test]
    fn test_max_interval_cap() {
        let backoff = AdmissionBackoff::exponential()
            .with_max_interval(Duration::from_millis(5))
            .with_jitter(0.0);

        assert_eq!(backoff.delay_for_attempt(30), Duration::from_millis(5));
        assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_millis(5));
    }

    #[test]
    fn test_fixed_interval() {
        let backoff = AdmissionBackoff::fixed(Duration::from_millis(4));

        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(4));
        assert_eq!(backoff.delay_for_attempt(7), Duration::from_millis(4));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let backoff = AdmissionBackoff::fixed(Duration::from_millis(10)).with_jitter(0.5);

        for attempt in 1..50 {
            let delay = backoff.delay_for_attempt(attempt);
            assert!(delay >= Duration::from_millis(4));
            assert!(delay <= Duration::from_millis(16));
        }
    }

    #[test]
    fn test_zero_interval_with_jitter() {
        let backoff = AdmissionBackoff::fixed(Duration::ZERO).with_jitter(0.5);
        assert_eq!(backoff.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn test_builders_produce_valid_schedules() {
        assert!(AdmissionBackoff::exponential().validate().is_ok());
        assert!(AdmissionBackoff::fixed(Duration::from_millis(3))
            .with_backoff_coefficient(-2.0)
            .with_jitter(7.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_invalid_deserialized_schedule() {
        let json = r#"{
            "initial_interval": 5,
            "max_interval": 50,
            "backoff_coefficient": -2.0,
            "jitter": 0.0
        }"#;
        let backoff: AdmissionBackoff = serde_json::from_str(json).unwrap();

        assert!(matches!(
            backoff.validate(),
            Err(BlockManagerError::InvalidConfig(_))
        ));
        for attempt in 1..6 {
            assert!(backoff.delay_for_attempt(attempt) <= Duration::from_millis(50));
        }
    }

    #[test]
    fn test_out_of_range_fields_never_panic() {
        let schedules = [
            AdmissionBackoff {
                backoff_coefficient: f64::NAN,
                ..AdmissionBackoff::exponential()
            },
            AdmissionBackoff {
                jitter: f64::INFINITY,
                ..AdmissionBackoff::exponential()
            },
            AdmissionBackoff {
                jitter: -3.0,
                ..AdmissionBackoff::exponential()
            },
            AdmissionBackoff {
                initial_interval: Duration::from_millis(20),
                max_interval: Duration::from_millis(2),
                ..AdmissionBackoff::exponential()
            },
        ];

        for backoff in schedules {
            assert!(backoff.validate().is_err());
            for attempt in [1, 2, 9, u32::MAX] {
                backoff.delay_for_attempt(attempt);
            }
        }
    }

    #[test]
    fn test_serialization() {
        let backoff = AdmissionBackoff::exponential();
        let json = serde_json::to_string(&backoff).unwrap();
        let parsed: AdmissionBackoff = serde_json::from_str(&json).unwrap();
        assert_eq!(backoff, parsed);
    }
}
