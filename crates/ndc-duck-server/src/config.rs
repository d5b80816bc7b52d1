//! Configuration for the ndc-duck server
//!
//! Loads configuration from:
//! 1. config.yaml - server address, database, logging
//! 2. environment (and `.env`) - overrides any YAML value
//!
//! A missing config file is not an error; defaults apply.

use ndc_duck_exec::DEFAULT_MAX_CONNECTIONS;
use ndc_duck_ir::DuckDbConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse schema file: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnvVar { name: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file, or `:memory:`
    pub path: String,

    pub max_connections: usize,

    /// JSON schema object; the catalog is introspected when unset
    pub schema_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            schema_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

fn parse_env<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value,
    })
}

impl Config {
    /// Load YAML from `path` (defaults if absent), then apply env overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("NDC_DUCK_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("NDC_DUCK_PORT") {
            self.server.port = parse_env("NDC_DUCK_PORT", port)?;
        }

        if let Ok(url) = std::env::var("DUCKDB_URL") {
            self.database.path = url;
        }
        if let Ok(max) = std::env::var("DUCKDB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("DUCKDB_MAX_CONNECTIONS", max)?;
        }
        if let Ok(path) = std::env::var("NDC_DUCK_SCHEMA_PATH") {
            self.database.schema_path = Some(path);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }

    /// Listen address
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Read a schema object (`collection_names`, `collection_aliases`, `object_types`)
pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<DuckDbConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
