//! Configuration merging logic
//!
//! Later configs override earlier ones (defaults → global → project → env → CLI).
//! A field still at its default value in `other` does not override `self`.

use super::{
    defaults::{
        DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DB_PATH, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONNECTIONS,
        DEFAULT_NAMESPACE,
    },
    types::{Config, LogConfig, StoreBackend, StoreConfig},
};

impl Config {
    /// Merge another config into this one (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        Self {
            namespace: if other.namespace == DEFAULT_NAMESPACE {
                self.namespace
            } else {
                other.namespace
            },
            store: self.store.merge(other.store),
            log: self.log.merge(other.log),
        }
    }
}

impl StoreConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            backend: if other.backend == StoreBackend::default() {
                self.backend
            } else {
                other.backend
            },
            path: if other.path == DEFAULT_DB_PATH {
                self.path
            } else {
                other.path
            },
            busy_timeout_ms: if other.busy_timeout_ms == DEFAULT_BUSY_TIMEOUT_MS {
                self.busy_timeout_ms
            } else {
                other.busy_timeout_ms
            },
            max_connections: if other.max_connections == DEFAULT_MAX_CONNECTIONS {
                self.max_connections
            } else {
                other.max_connections
            },
        }
    }
}

impl LogConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            level: if other.level == DEFAULT_LOG_LEVEL {
                self.level
            } else {
                other.level
            },
        }
    }
}
