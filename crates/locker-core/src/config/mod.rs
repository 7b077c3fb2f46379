//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/locker/config.toml
//! 3. Project config: .locker/config.toml
//! 4. Environment variables: LOCKER_*
//! 5. CLI flags (`--db`, `--namespace`)
//!
//! # Example Config
//!
//! ```toml
//! namespace = "ops"
//!
//! [store]
//! backend = "sqlite"
//! path = "/var/lib/locker/locker.db"
//! busy_timeout_ms = 2000
//!
//! [log]
//! level = "debug"
//! ```

mod backend;
mod defaults;
mod load;
mod merge;
mod types;
mod validate;

#[cfg(test)]
mod tests_loading;
#[cfg(test)]
mod tests_validation;

pub use backend::open_store;
pub use load::{global_config_path, load_config, load_toml_file, project_config_path};
pub use types::{Config, LogConfig, StoreBackend, StoreConfig};
