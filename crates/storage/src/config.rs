//! Store configuration
//!
//! Where the key-value store lives and how layer metadata keys are formed.

use serde::{Deserialize, Serialize};

/// Default store host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default store port
pub const DEFAULT_PORT: u16 = 6379;
/// Default prefix for metadata keys
pub const DEFAULT_METADATA_PREFIX: &str = "metadata_";

/// Key-value store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store host name or address
    pub host: String,
    /// Store port
    pub port: u16,
    /// Logical database index; each index is a separate keyspace
    pub database: u32,
    /// Prefix prepended to a layer name to form its metadata key
    pub metadata_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: 0,
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
        }
    }
}

impl StoreConfig {
    /// Set host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set database index
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    /// Set metadata key prefix
    pub fn with_metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metadata_prefix = prefix.into();
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.metadata_prefix.is_empty() {
            return Err(ConfigError::EmptyMetadataPrefix);
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Host is empty
    #[error("Store host is empty")]
    EmptyHost,

    /// Port is not usable
    #[error("Invalid store port: {0}")]
    InvalidPort(u16),

    /// Metadata prefix is empty
    #[error("Metadata key prefix is empty")]
    EmptyMetadataPrefix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.database, 0);
        assert_eq!(config.metadata_prefix, "metadata_");
        assert_eq!(config.address(), "127.0.0.1:6379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::default()
            .with_host("cache.internal")
            .with_port(7000)
            .with_database(3)
            .with_metadata_prefix("meta:");

        assert_eq!(config.address(), "cache.internal:7000");
        assert_eq!(config.database, 3);
        assert_eq!(config.metadata_prefix, "meta:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_host() {
        let config = StoreConfig::default().with_host("  ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyHost));
    }

    #[test]
    fn test_validate_port_zero() {
        let config = StoreConfig::default().with_port(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPort(0)));
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = StoreConfig::default().with_metadata_prefix("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyMetadataPrefix));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"port": 6380, "database": 2}"#).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6380);
        assert_eq!(config.database, 2);
        assert_eq!(config.metadata_prefix, "metadata_");
    }
}
