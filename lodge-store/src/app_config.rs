use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use lodge_catalog::HotelLocation;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub holds: HoldsConfig,
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the service runs on the in-memory store.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldsConfig {
    pub default_ttl_minutes: i64,
    pub cleanup_interval_seconds: u64,
    #[serde(default = "default_guard_retries")]
    pub max_guard_retries: u32,
}

fn default_guard_retries() -> u32 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    pub timeout_minutes: i64,
    pub warning_minutes: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PricingConfig {
    /// Hotel id to city, e.g. `king-david = "jerusalem"`.
    #[serde(default)]
    pub hotel_locations: HashMap<String, HotelLocation>,
    pub default_tax_rate: Option<f64>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `LODGE__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("LODGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_memory_backends() {
        let config = parse(
            r#"
            [server]
            port = 3000

            [holds]
            default_ttl_minutes = 15
            cleanup_interval_seconds = 60

            [sessions]
            timeout_minutes = 30
            warning_minutes = 5
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.url.is_none());
        assert_eq!(config.holds.max_guard_retries, 3);
        assert!(config.pricing.hotel_locations.is_empty());
    }

    #[test]
    fn test_hotel_locations_parse_as_cities() {
        let config = parse(
            r#"
            [server]
            port = 3000

            [holds]
            default_ttl_minutes = 10
            cleanup_interval_seconds = 30

            [sessions]
            timeout_minutes = 30
            warning_minutes = 5

            [pricing]
            default_tax_rate = 0.18

            [pricing.hotel_locations]
            king-david = "jerusalem"
            manger-square = "bethlehem"
            "#,
        );

        assert_eq!(config.pricing.hotel_locations.get("king-david"), Some(&HotelLocation::Jerusalem));
        assert_eq!(config.pricing.hotel_locations.get("manger-square"), Some(&HotelLocation::Bethlehem));
        assert_eq!(config.pricing.default_tax_rate, Some(0.18));
    }
}
