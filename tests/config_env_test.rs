//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Note that Config::from_env() also loads
//! from .env file via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use mcp_supplyflow::config::{Config, LogFormat};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    let result = Config::from_env();
    assert!(result.is_ok(), "Config::from_env() should always succeed");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);

    // Restore defaults
    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_invalid_log_format_falls_back_to_pretty() {
    env::set_var("LOG_FORMAT", "yaml");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_custom_costs() {
    env::set_var("TRANSFER_COST_PER_KM", "12");
    env::set_var("TRANSFER_HANDLING_PER_UNIT", "7");
    env::set_var("ROUTE_HANDLING_PER_UNIT", "3");

    let config = Config::from_env().unwrap();
    assert_eq!(config.costs.transfer_cost_per_km, 12);
    assert_eq!(config.costs.transfer_handling_per_unit, 7);
    assert_eq!(config.costs.route_handling_per_unit, 3);

    env::remove_var("TRANSFER_COST_PER_KM");
    env::remove_var("TRANSFER_HANDLING_PER_UNIT");
    env::remove_var("ROUTE_HANDLING_PER_UNIT");
}

#[test]
#[serial]
fn test_config_from_env_invalid_max_connections_falls_back() {
    env::set_var("DATABASE_MAX_CONNECTIONS", "not-a-number");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.max_connections, 5);

    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_defaults_without_overrides() {
    env::remove_var("DATABASE_PATH");
    env::remove_var("LOG_LEVEL");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.database.path.to_str().unwrap(),
        "./data/supplyflow.db"
    );
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.costs.transfer_cost_per_km, 10);
}
