//! Configuration validation

use super::types::Config;
use crate::{Error, Result};

const BUSY_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=60_000;

impl Config {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any values are out of range or invalid
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "namespace cannot be empty".to_string(),
            ));
        }

        if self.namespace.contains(':') {
            return Err(Error::InvalidConfig(format!(
                "namespace '{}' cannot contain ':'",
                self.namespace
            )));
        }

        if self.store.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "store.max_connections must be at least 1".to_string(),
            ));
        }

        if !BUSY_TIMEOUT_RANGE_MS.contains(&self.store.busy_timeout_ms) {
            return Err(Error::InvalidConfig(
                "store.busy_timeout_ms must be 1-60000".to_string(),
            ));
        }

        if self.store.path.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "store.path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
