//! Configuration management for the Olive Mill platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with MILL_ prefix

use std::collections::HashMap;

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use shared::models::BottlingFormat;
use shared::validation::validate_bottling_format;
use shared::yields::YieldConfig;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Mill operating parameters
    #[serde(default)]
    pub mill: MillConfig,

    /// Offline retry queue
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Keep records in process memory instead of PostgreSQL
    pub in_memory: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MillConfig {
    /// Yield used when neither lab analysis nor a variety default exists
    pub fallback_yield_percent: Decimal,

    /// Default yield percentage per olive variety
    #[serde(default)]
    pub variety_yields: HashMap<String, Decimal>,

    /// Auxiliary materials at or below this many units are reported
    pub low_stock_threshold: i64,

    /// Month the olive campaign starts, used in document numbers
    pub campaign_start_month: u32,

    #[serde(default = "default_bottling_formats")]
    pub bottling_formats: Vec<BottlingFormat>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Seconds between flushes of the offline retry queue
    pub retry_interval_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("MILL_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.in_memory", false)?
            .set_default("mill.fallback_yield_percent", "21.5")?
            .set_default("mill.low_stock_threshold", 50)?
            .set_default("mill.campaign_start_month", 10)?
            .set_default("sync.retry_interval_secs", 30)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (MILL_ prefix)
            .add_source(
                Environment::with_prefix("MILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=12).contains(&self.mill.campaign_start_month) {
            return Err(ConfigError::Message(
                "mill.campaign_start_month must be between 1 and 12".to_string(),
            ));
        }
        if self.mill.fallback_yield_percent <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "mill.fallback_yield_percent must be positive".to_string(),
            ));
        }
        for (i, format) in self.mill.bottling_formats.iter().enumerate() {
            validate_bottling_format(format)
                .map_err(|e| ConfigError::Message(format!("mill.bottling_formats: {}", e)))?;
            if self.mill.bottling_formats[..i].iter().any(|f| f.id == format.id) {
                return Err(ConfigError::Message(format!(
                    "mill.bottling_formats: duplicate format id {}",
                    format.id
                )));
            }
        }
        if !self.database.in_memory && self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url is required unless database.in_memory is set".to_string(),
            ));
        }
        Ok(())
    }
}

impl MillConfig {
    pub fn yield_config(&self) -> YieldConfig {
        let mut config = YieldConfig::new(self.fallback_yield_percent);
        for (variety, percent) in &self.variety_yields {
            config.set_variety(variety, *percent);
        }
        config
    }

    pub fn enabled_formats(&self) -> Vec<BottlingFormat> {
        self.bottling_formats
            .iter()
            .filter(|f| f.enabled)
            .cloned()
            .collect()
    }
}

impl Default for MillConfig {
    fn default() -> Self {
        Self {
            fallback_yield_percent: Decimal::new(215, 1),
            variety_yields: HashMap::new(),
            low_stock_threshold: 50,
            campaign_start_month: 10,
            bottling_formats: default_bottling_formats(),
        }
    }
}

fn default_bottling_formats() -> Vec<BottlingFormat> {
    [("0.5l", "Glass 0.5 L", 5, 1), ("1l", "PET 1 L", 1, 0), ("5l", "PET 5 L", 5, 0)]
        .into_iter()
        .map(|(id, name, liters, scale)| BottlingFormat {
            id: id.to_string(),
            name: name.to_string(),
            liters: Decimal::new(liters, scale),
            enabled: true,
        })
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mill: MillConfig) -> Config {
        Config {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 1,
                in_memory: true,
            },
            mill,
            sync: SyncConfig {
                retry_interval_secs: 30,
            },
        }
    }

    #[test]
    fn test_default_mill_config_is_valid() {
        assert!(config(MillConfig::default()).validate().is_ok());
    }

    #[test]
    fn test_bottling_formats_are_validated() {
        let mut mill = MillConfig::default();
        mill.bottling_formats[1].liters = Decimal::ZERO;
        assert!(config(mill).validate().is_err());

        let mut mill = MillConfig::default();
        mill.bottling_formats[2].id = "1l".to_string();
        assert!(config(mill).validate().is_err());
    }

    #[test]
    fn test_campaign_month_range() {
        let mill = MillConfig {
            campaign_start_month: 13,
            ..MillConfig::default()
        };
        assert!(config(mill).validate().is_err());
    }
}
