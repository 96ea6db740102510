//! Mining configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MINING_BATCH_SIZE, DEFAULT_MINING_TIME_LIMIT_MS};
use crate::error::ConfigError;

/// Bounds on a single mining run.
///
/// Missing fields take their defaults when deserialized, so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningLimits {
    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: u64,
    /// Highest nonce to try (inclusive).
    pub nonce_limit: u32,
    /// Nonces hashed between two reads of the clock.
    pub batch_size: u32,
}

impl Default for MiningLimits {
    fn default() -> Self {
        MiningLimits {
            time_limit_ms: DEFAULT_MINING_TIME_LIMIT_MS,
            nonce_limit: u32::MAX,
            batch_size: DEFAULT_MINING_BATCH_SIZE,
        }
    }
}

impl MiningLimits {
    /// Parse limits from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_nonce_limit(mut self, nonce_limit: u32) -> Self {
        self.nonce_limit = nonce_limit;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    /// Batch size, never zero.
    pub fn effective_batch_size(&self) -> u32 {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = MiningLimits::default();
        assert_eq!(limits.time_limit(), Duration::from_secs(600));
        assert_eq!(limits.nonce_limit, u32::MAX);
        assert_eq!(limits.effective_batch_size(), DEFAULT_MINING_BATCH_SIZE);
    }

    #[test]
    fn test_from_json_partial() {
        let limits = MiningLimits::from_json(r#"{ "nonce_limit": 1000 }"#).unwrap();
        assert_eq!(limits.nonce_limit, 1000);
        assert_eq!(limits.time_limit_ms, DEFAULT_MINING_TIME_LIMIT_MS);

        assert_eq!(MiningLimits::from_json("{}").unwrap(), MiningLimits::default());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = MiningLimits::from_json(r#"{ "nonce_limit": -1 }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid mining configuration"));
    }

    #[test]
    fn test_builders() {
        let limits = MiningLimits::default()
            .with_time_limit(Duration::from_millis(250))
            .with_nonce_limit(10)
            .with_batch_size(0);

        assert_eq!(limits.time_limit_ms, 250);
        assert_eq!(limits.nonce_limit, 10);
        assert_eq!(limits.effective_batch_size(), 1);
    }
}
