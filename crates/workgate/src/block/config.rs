//! Block manager configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::manager::BlockManagerError;

/// Capacity of one named state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateLimit {
    /// State key workers declare via `Worker::block_state`
    pub name: String,

    /// Maximum concurrently admitted workers, at least one
    pub max_count: usize,
}

impl StateLimit {
    pub fn new(name: impl Into<String>, max_count: usize) -> Self {
        Self {
            name: name.into(),
            max_count,
        }
    }
}

/// Configuration for [`BlockManagerMaxCount`](super::BlockManagerMaxCount)
///
/// # Example
///
/// ```
/// use workgate::block::{BlockManagerConfig, StateLimit};
///
/// let config = BlockManagerConfig::from_json_str(
///     r#"{"states": [{"name": "imap", "max_count": 4}]}"#,
/// )
/// .unwrap()
/// .with_state(StateLimit::new("smtp", 2));
///
/// assert_eq!(config.states.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockManagerConfig {
    /// Bounded states. States not listed here are unbounded.
    #[serde(default)]
    pub states: Vec<StateLimit>,
}

impl BlockManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bounded state
    pub fn with_state(mut self, limit: StateLimit) -> Self {
        self.states.push(limit);
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, BlockManagerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BlockManagerError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), BlockManagerError> {
        let mut seen = HashSet::new();
        for limit in &self.states {
            if limit.name.is_empty() {
                return Err(BlockManagerError::InvalidConfig(
                    "state name must not be empty".into(),
                ));
            }
            if !seen.insert(limit.name.as_str()) {
                return Err(BlockManagerError::InvalidConfig(format!(
                    "duplicate state '{}'",
                    limit.name
                )));
            }
            // A state nothing can enter would park its workers forever
            if limit.max_count == 0 {
                return Err(BlockManagerError::InvalidConfig(format!(
                    "state '{}' must admit at least one worker",
                    limit.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BlockManagerConfig::default();
        assert!(config.states.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config =
            BlockManagerConfig::from_json_str(r#"{"states": [{"name": "a", "max_count": 3}]}"#)
                .unwrap();
        assert_eq!(config.states, vec![StateLimit::new("a", 3)]);
        assert_eq!(
            BlockManagerConfig::from_json_str("{}").unwrap(),
            BlockManagerConfig::default()
        );
    }

    #[test]
    fn test_zero_max_count_rejected() {
        let config = BlockManagerConfig::new().with_state(StateLimit::new("closed", 0));
        assert!(matches!(
            config.validate(),
            Err(BlockManagerError::InvalidConfig(_))
        ));

        let parsed = BlockManagerConfig::from_json_str(
            r#"{"states": [{"name": "open", "max_count": 1}, {"name": "closed", "max_count": 0}]}"#,
        );
        assert!(matches!(parsed, Err(BlockManagerError::InvalidConfig(_))));
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let config = BlockManagerConfig::new()
            .with_state(StateLimit::new("a", 1))
            .with_state(StateLimit::new("a", 2));

        assert!(matches!(
            config.validate(),
            Err(BlockManagerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = BlockManagerConfig::new().with_state(StateLimit::new("", 1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            BlockManagerConfig::from_json_str("{not json"),
            Err(BlockManagerError::Parse(_))
        ));
    }
}
