//! Configuration Module
//!
//! This module defines all configuration structures for the validator.
//! Configuration is loaded from TOML files and parsed using serde.

use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [validator]
/// enrollment_id = "validator-0"
/// enrollment_secret = "9gvZQRwhUq9q"
///
/// [store]
/// url = "sqlite://validator.db"
///
/// [security]
/// verify_certificate_chains = true
///
/// [api]
/// host = "127.0.0.1"
/// port = 7051
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub validator: ValidatorConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity the binary registers with on first start
#[derive(Clone, Deserialize)]
pub struct ValidatorConfig {
    pub enrollment_id: String,
    pub enrollment_secret: String,
}

impl std::fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("enrollment_id", &self.enrollment_id)
            .field("enrollment_secret", &"<redacted>")
            .finish()
    }
}

/// Credential store configuration
///
/// # Fields
/// - `url`: sqlx SQLite URL (e.g., "sqlite://validator.db")
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url: String,
}

/// Certificate checks applied by the validator
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Require transaction certificates and directory certificates to be
    /// issued by one of the trusted roots
    #[serde(default = "default_true")]
    pub verify_certificate_chains: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            verify_certificate_chains: true,
        }
    }
}

/// Local JSON-RPC endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7051
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
