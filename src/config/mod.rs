//! Configuration management for the directory service
//!
//! This module handles loading and validating configuration from environment
//! variables, files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address and port to listen on
    pub bind_address: SocketAddr,

    /// Maximum accepted catalog document size in bytes
    pub max_body_bytes: usize,

    /// Log each request through the HTTP trace layer
    pub enable_request_logging: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the on-disk layout (`catalogs/` and `index/` live below it)
    pub data_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bind_address = std::env::var("RELNODES_BIND")
            .ok()
            .and_then(|v| v.parse::<SocketAddr>().ok())
            .unwrap_or_else(default_bind_address);

        let max_body_bytes = std::env::var("RELNODES_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let enable_request_logging = std::env::var("RELNODES_REQUEST_LOGGING")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let data_dir = std::env::var("RELNODES_DATA_DIR")
            .unwrap_or_else(|_| String::from("data"))
            .into();

        let log_level = std::env::var("RELNODES_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("RELNODES_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            server: ServerConfig {
                bind_address,
                max_body_bytes,
                enable_request_logging,
            },
            storage: StorageConfig { data_dir },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than 0");
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir must not be empty");
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("unknown log format: {other}"),
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: default_bind_address(),
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                enable_request_logging: true,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

/// Default catalog size cap, generous for compiled catalogs.
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8141))
}
