//! Configuration loading from files and environment

use std::path::{Path, PathBuf};

use super::types::Config;
use crate::{Error, Result};

/// Load configuration from all sources with hierarchy
///
/// # Errors
///
/// Returns error if:
/// - Config file is malformed TOML
/// - An environment override cannot be parsed
/// - Config values fail validation
pub fn load_config() -> Result<Config> {
    let config = Config::default();

    let config = match global_config_path() {
        Some(global_path) if global_path.exists() => config.merge(load_toml_file(&global_path)?),
        _ => config,
    };

    let project_path = project_config_path()?;
    let config = if project_path.exists() {
        config.merge(load_toml_file(&project_path)?)
    } else {
        config
    };

    let config = config.apply_env_vars()?;
    config.validate()?;
    Ok(config)
}

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "locker")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// Get path to project config file
///
/// # Errors
///
/// Returns error if current directory cannot be determined
pub fn project_config_path() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|dir| dir.join(".locker/config.toml"))
        .map_err(|e| Error::Io(format!("Failed to get current directory: {e}")))
}

/// Load a TOML file into a partial Config
///
/// # Errors
///
/// Returns error if the path is a directory, cannot be read, or is not valid TOML
pub fn load_toml_file(path: &Path) -> Result<Config> {
    if path.is_dir() {
        return Err(Error::Io(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("Failed to read config file {}: {e}", path.display())))?;

    toml::from_str(&content).map_err(|e| {
        Error::Parse(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

impl Config {
    /// Apply `LOCKER_*` environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    pub fn apply_env_vars(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var("LOCKER_NAMESPACE") {
            self.namespace = value;
        }

        if let Ok(value) = std::env::var("LOCKER_STORE_BACKEND") {
            self.store.backend = value.parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid LOCKER_STORE_BACKEND value '{value}': {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("LOCKER_STORE_PATH") {
            if value.is_empty() {
                return Err(Error::InvalidConfig(
                    "LOCKER_STORE_PATH cannot be empty - unset the variable or provide a path"
                        .to_string(),
                ));
            }
            self.store.path = value;
        }

        if let Ok(value) = std::env::var("LOCKER_BUSY_TIMEOUT_MS") {
            self.store.busy_timeout_ms = value.parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid LOCKER_BUSY_TIMEOUT_MS value: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("LOCKER_LOG_LEVEL") {
            self.log.level = value;
        }

        Ok(self)
    }
}
