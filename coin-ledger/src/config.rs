//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Bounded retries for version-conflict races on apply
    pub max_apply_retries: u32,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/coin-ledger"),
            service_name: "coin-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            max_apply_retries: 3,
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("COIN_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(retries) = std::env::var("COIN_LEDGER_MAX_APPLY_RETRIES") {
            config.max_apply_retries = retries
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid retry count: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "coin-ledger");
        assert_eq!(config.max_apply_retries, 3);
        assert!(!config.rocksdb.enable_statistics);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            data_dir = "/tmp/ledger"
            service_name = "coin-ledger"
            service_version = "0.1.0"
            max_apply_retries = 5

            [rocksdb]
            write_buffer_size_mb = 32
            max_write_buffer_number = 2
            max_background_jobs = 2
            enable_statistics = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.max_apply_retries, 5);
        assert_eq!(config.rocksdb.write_buffer_size_mb, 32);
    }
}
