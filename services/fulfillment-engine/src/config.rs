use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
    pub resolver: ResolverConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub default_network: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_ms: u64,
    pub ssl_mode: SslMode,
    pub ssl_root_cert: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn verifies_server(&self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyFull)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RpcConfig {
    pub timeout_ms: u64,
}

/// Where to find a network's JSON-RPC endpoint: either directly, or through a
/// fabric configuration document that lists it.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct NetworkConfig {
    pub rpc_url: Option<String>,
    pub config_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    Rpc,
    Fixture,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    pub mode: ResolverMode,
    pub fixture_prefix: String,
    pub fixture_contract_address: Option<String>,
    pub fixture_offer_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Config {
    /// Builder preloaded with every default; sources are layered on top.
    pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 2023)?
            .set_default("server.default_network", "main")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 16)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_ms", 5000)?
            .set_default("database.ssl_mode", "disable")?
            .set_default("database.run_migrations", false)?
            .set_default("rpc.timeout_ms", 10000)?
            .set_default("resolver.mode", "rpc")?
            .set_default("resolver.fixture_prefix", "tx-test-")?
            .set_default("resolver.fixture_offer_id", "0")?
            .set_default("auth.jwt_secret", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = Self::builder_with_defaults()?;

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(true));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("FULFILLMENT_ENGINE")
                .separator("__")
                .list_separator(","),
        );

        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(port) = env::var("FULFILLMENT_ENGINE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("Database max_connections must be at least 1".to_string());
        }

        if self.database.min_connections > self.database.max_connections {
            return Err("Database min_connections cannot exceed max_connections".to_string());
        }

        if self.database.acquire_timeout_ms == 0 {
            return Err("Database acquire_timeout_ms must be positive".to_string());
        }

        if self.database.ssl_mode.verifies_server() && self.database.ssl_root_cert.is_none() {
            return Err(format!(
                "Database ssl_mode {:?} requires ssl_root_cert",
                self.database.ssl_mode
            ));
        }

        if self.database.ssl_cert.is_some() != self.database.ssl_key.is_some() {
            return Err("Database ssl_cert and ssl_key must be set together".to_string());
        }

        if self.rpc.timeout_ms == 0 {
            return Err("RPC timeout_ms must be positive".to_string());
        }

        for (name, network) in &self.networks {
            match (&network.rpc_url, &network.config_url) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(format!(
                        "Network {} needs exactly one of rpc_url or config_url",
                        name
                    ))
                }
            }
        }

        match self.resolver.mode {
            ResolverMode::Rpc => {
                if self.networks.is_empty() {
                    return Err("At least one network is required in rpc resolver mode".to_string());
                }
                if !self.networks.contains_key(&self.server.default_network) {
                    return Err(format!(
                        "Default network {} is not configured",
                        self.server.default_network
                    ));
                }
            }
            ResolverMode::Fixture => {
                if self.resolver.fixture_prefix.is_empty() {
                    return Err("Fixture resolver requires a fixture_prefix".to_string());
                }
                if self
                    .resolver
                    .fixture_contract_address
                    .as_deref()
                    .map_or(true, str::is_empty)
                {
                    return Err(
                        "Fixture resolver requires a fixture_contract_address".to_string()
                    );
                }
            }
        }

        if self.auth.jwt_secret.is_empty() {
            return Err("JWT secret is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> ConfigBuilder<DefaultState> {
        Config::builder_with_defaults()
            .unwrap()
            .set_override("database.url", "postgres://localhost/fulfillmentservice")
            .unwrap()
            .set_override("networks.main.rpc_url", "http://localhost:8545")
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap()
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Config {
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = build(base_builder());
        assert_eq!(config.server.port, 2023);
        assert_eq!(config.database.ssl_mode, SslMode::Disable);
        assert_eq!(config.resolver.mode, ResolverMode::Rpc);
        assert_eq!(config.resolver.fixture_prefix, "tx-test-");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_database_url() {
        let config = build(
            base_builder()
                .set_override("database.url", "")
                .unwrap(),
        );
        assert_eq!(config.validate().unwrap_err(), "Database URL is required");
    }

    #[test]
    fn test_verify_full_requires_root_cert() {
        let config = build(
            base_builder()
                .set_override("database.ssl_mode", "verify-full")
                .unwrap(),
        );
        assert!(config.validate().is_err());

        let config = build(
            base_builder()
                .set_override("database.ssl_mode", "verify-full")
                .unwrap()
                .set_override("database.ssl_root_cert", "/etc/ssl/root.crt")
                .unwrap(),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_ssl_mode_fails_to_load() {
        let result: Result<Config, ConfigError> = base_builder()
            .set_override("database.ssl_mode", "sometimes")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize();
        assert!(result.is_err());
    }

    #[test]
    fn test_network_needs_one_endpoint_source() {
        let config = build(
            base_builder()
                .set_override("networks.main.config_url", "https://main.example/config")
                .unwrap(),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixture_mode_requires_contract() {
        let config = build(
            base_builder()
                .set_override("resolver.mode", "fixture")
                .unwrap(),
        );
        assert!(config.validate().is_err());

        let config = build(
            base_builder()
                .set_override("resolver.mode", "fixture")
                .unwrap()
                .set_override("resolver.fixture_contract_address", "0xABC")
                .unwrap(),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_network_must_exist_in_rpc_mode() {
        let config = build(
            base_builder()
                .set_override("server.default_network", "demov3")
                .unwrap(),
        );
        assert!(config.validate().is_err());
    }
}
