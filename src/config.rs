//! Configuration management for chainstore

use crate::error::StoreError;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "./data/chainstore.db".to_string()
}

/// Loads `config.toml` from the working directory, substituting defaults
/// when the file is absent.
pub fn load_config() -> Result<Config, StoreError> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        Config {
            database: DatabaseConfig::default(),
        }
    } else {
        toml::from_str(&config_str)
            .map_err(|e| StoreError::ConfigError(format!("Failed to parse config.toml: {}", e)))?
    };

    if config.database.path.is_empty() {
        return Err(StoreError::ConfigError(
            "database.path must be set in config.toml".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_parses() {
        let config: Config = toml::from_str("[database]\npath = \"/tmp/chain.db\"").unwrap();
        assert_eq!(config.database.path, "/tmp/chain.db");
    }

    #[test]
    fn test_missing_section_gets_default_path() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.path, default_db_path());
    }
}
