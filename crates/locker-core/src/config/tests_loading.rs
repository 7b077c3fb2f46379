//! Loading-focused tests for configuration
//!
//! Environment-variable tests are `#[serial]`: the process environment is shared.

use std::io::Write;

use serial_test::serial;

use super::{load_toml_file, project_config_path, Config, StoreBackend};
use crate::{Error, Result};

const ENV_VARS: [&str; 5] = [
    "LOCKER_NAMESPACE",
    "LOCKER_STORE_BACKEND",
    "LOCKER_STORE_PATH",
    "LOCKER_BUSY_TIMEOUT_MS",
    "LOCKER_LOG_LEVEL",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> Result<(tempfile::TempDir, std::path::PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok((dir, path))
}

#[test]
fn test_load_partial_toml_file() -> Result<()> {
    let (_dir, path) = write_config("namespace = \"ops\"\n\n[store]\nbackend = \"memory\"\n")?;

    let config = load_toml_file(&path)?;
    assert_eq!(config.namespace, "ops");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.store.busy_timeout_ms, 5000);
    Ok(())
}

#[test]
fn test_malformed_toml_returns_parse_error() -> Result<()> {
    let (_dir, path) = write_config("namespace = \n invalid toml [[[")?;

    let result = load_toml_file(&path);
    assert!(matches!(result, Err(Error::Parse(_))));
    Ok(())
}

#[test]
fn test_directory_path_is_io_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = load_toml_file(dir.path());
    assert!(matches!(result, Err(Error::Io(_))));
    Ok(())
}

#[test]
fn test_project_config_path_is_under_dot_locker() -> Result<()> {
    let path = project_config_path()?;
    assert!(path.ends_with(".locker/config.toml"));
    Ok(())
}

#[test]
#[serial]
fn test_env_overrides() -> Result<()> {
    clear_env();
    std::env::set_var("LOCKER_NAMESPACE", "from-env");
    std::env::set_var("LOCKER_STORE_BACKEND", "Memory");
    std::env::set_var("LOCKER_BUSY_TIMEOUT_MS", "250");
    std::env::set_var("LOCKER_LOG_LEVEL", "debug");

    let result = Config::default().apply_env_vars();
    clear_env();

    let config = result?;
    assert_eq!(config.namespace, "from-env");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.store.busy_timeout_ms, 250);
    assert_eq!(config.log.level, "debug");
    Ok(())
}

#[test]
#[serial]
fn test_invalid_env_backend_rejected() {
    clear_env();
    std::env::set_var("LOCKER_STORE_BACKEND", "redis");
    let result = Config::default().apply_env_vars();
    clear_env();

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
#[serial]
fn test_invalid_env_timeout_rejected() {
    clear_env();
    std::env::set_var("LOCKER_BUSY_TIMEOUT_MS", "soon");
    let result = Config::default().apply_env_vars();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_empty_env_store_path_rejected() {
    clear_env();
    std::env::set_var("LOCKER_STORE_PATH", "");
    let result = Config::default().apply_env_vars();
    clear_env();

    assert!(result.is_err());
}
