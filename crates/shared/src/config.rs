//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger behaviour.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Currency used when a wallet request omits one.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Create a missing monthly period as OPEN on first posting.
    #[serde(default = "default_true")]
    pub auto_create_periods: bool,
    /// Seed the default chart of accounts the first time a tenant posts.
    #[serde(default = "default_true")]
    pub seed_chart_on_first_use: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            auto_create_periods: true,
            seed_chart_on_first_use: true,
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("COFFER").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("config-test-none")),
                ("COFFER__DATABASE__URL", Some("postgres://localhost/coffer_test")),
                ("COFFER__SERVER__PORT", Some("9090")),
                ("COFFER__LEDGER__DEFAULT_CURRENCY", Some("NGN")),
                ("COFFER__LOGGING__JSON", Some("true")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/coffer_test");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.ledger.default_currency, "NGN");
                assert!(config.logging.json);
            },
        );
    }

    #[test]
    fn test_defaults_apply() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("config-test-none")),
                ("COFFER__DATABASE__URL", Some("postgres://localhost/coffer_test")),
                ("COFFER__SERVER__PORT", None),
                ("COFFER__LEDGER__DEFAULT_CURRENCY", None),
                ("COFFER__LOGGING__JSON", None),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.database.min_connections, 1);
                assert!(config.ledger.auto_create_periods);
                assert!(config.ledger.seed_chart_on_first_use);
            },
        );
    }
}
