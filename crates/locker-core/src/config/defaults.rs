//! Default configuration values

use super::types::{Config, LogConfig, StoreBackend, StoreConfig};

pub(super) const DEFAULT_NAMESPACE: &str = "locker";
pub(super) const DEFAULT_DB_PATH: &str = ".locker/locker.db";
pub(super) const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
pub(super) const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub(super) const DEFAULT_LOG_LEVEL: &str = "info";

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            store: StoreConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: DEFAULT_DB_PATH.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
