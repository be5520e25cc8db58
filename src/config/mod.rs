use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Freight tariff rates.
    pub costs: CostConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Maximum pool connections.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level filter (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

/// Tariff rates used by the inventory and routing stages.
///
/// Defaults match the network's standing freight contracts; override per
/// deployment via `TRANSFER_COST_PER_KM`, `TRANSFER_HANDLING_PER_UNIT`,
/// and `ROUTE_HANDLING_PER_UNIT`.
#[derive(Debug, Clone)]
pub struct CostConfig {
    /// Inter-warehouse transfer cost per kilometre (rupees).
    pub transfer_cost_per_km: i64,
    /// Per-unit handling charge on inter-warehouse transfers (rupees).
    pub transfer_handling_per_unit: i64,
    /// Per-unit handling charge on planned delivery routes (rupees).
    pub route_handling_per_unit: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/supplyflow.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let costs = CostConfig {
            transfer_cost_per_km: env::var("TRANSFER_COST_PER_KM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            transfer_handling_per_unit: env::var("TRANSFER_HANDLING_PER_UNIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            route_handling_per_unit: env::var("ROUTE_HANDLING_PER_UNIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        };

        Ok(Config {
            database,
            logging,
            costs,
        })
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            transfer_cost_per_km: 10,
            transfer_handling_per_unit: 5,
            route_handling_per_unit: 2,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/supplyflow.db"),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            costs: CostConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_config_defaults() {
        let costs = CostConfig::default();
        assert_eq!(costs.transfer_cost_per_km, 10);
        assert_eq!(costs.transfer_handling_per_unit, 5);
        assert_eq!(costs.route_handling_per_unit, 2);
    }

    #[test]
    fn test_config_default_database_path() {
        let config = Config::default();
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "./data/supplyflow.db"
        );
        assert_eq!(config.database.max_connections, 5);
    }
}
