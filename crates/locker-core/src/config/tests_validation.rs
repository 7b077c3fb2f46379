//! Validation-focused tests for configuration

use super::{Config, StoreConfig};
use crate::Error;

fn with_store(store: StoreConfig) -> Config {
    Config {
        store,
        ..Config::default()
    }
}

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_empty_namespace_rejected() {
    let config = Config {
        namespace: "  ".to_string(),
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_namespace_with_separator_rejected() {
    let config = Config {
        namespace: "a:b".to_string(),
        ..Config::default()
    };
    let result = config.validate();
    assert!(matches!(result, Err(Error::InvalidConfig(msg)) if msg.contains("':'")));
}

#[test]
fn test_zero_connections_rejected() {
    let config = with_store(StoreConfig {
        max_connections: 0,
        ..StoreConfig::default()
    });
    assert!(config.validate().is_err());
}

#[test]
fn test_busy_timeout_bounds() {
    let too_low = with_store(StoreConfig {
        busy_timeout_ms: 0,
        ..StoreConfig::default()
    });
    let too_high = with_store(StoreConfig {
        busy_timeout_ms: 60_001,
        ..StoreConfig::default()
    });
    let edge = with_store(StoreConfig {
        busy_timeout_ms: 60_000,
        ..StoreConfig::default()
    });

    assert!(too_low.validate().is_err());
    assert!(too_high.validate().is_err());
    assert!(edge.validate().is_ok());
}
